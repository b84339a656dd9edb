use std::fmt;

/// A track as seen by one provider.
///
/// The id only means something to the provider that produced it. Songs from
/// different providers are matched by searching the destination catalog for
/// the title and artist, never by comparing ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Song {
    id: String,
    title: String,
    artist: String,
    album: Option<String>,
}

impl Song {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        artist: impl Into<String>,
        album: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: artist.into(),
            album,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn artist(&self) -> &str {
        &self.artist
    }

    pub fn album(&self) -> Option<&str> {
        self.album.as_deref()
    }

    /// Free-text query used when looking this song up in another catalog.
    pub fn search_query(&self) -> String {
        format!("{} {}", self.title, self.artist)
    }
}

impl fmt::Display for Song {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} by {}", self.title, self.artist)
    }
}
