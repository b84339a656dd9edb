pub mod client;

pub use client::SpotifyProvider;
