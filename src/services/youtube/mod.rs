pub mod client;

pub use client::YoutubeProvider;
