use crate::models::Song;

/// A named, ordered list of songs owned or followed on one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playlist {
    id: String,
    name: String,
    songs: Vec<Song>,
}

impl Playlist {
    pub fn new(id: impl Into<String>, name: impl Into<String>, songs: Vec<Song>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            songs,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Songs in playlist order.
    pub fn songs(&self) -> &[Song] {
        &self.songs
    }
}
