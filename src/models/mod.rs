mod artist;
mod playlist;
mod song;

pub use artist::Artist;
pub use playlist::Playlist;
pub use song::Song;
