use color_eyre::eyre::Result;

use crate::models::{Artist, Playlist, Song};
use crate::ports::provider::ProviderClient;

/// Id given to playlists that were only pretended to be created.
pub const READ_ONLY_PLAYLIST_ID: &str = "read_only_playlist";

/// Provider decorator that forwards every read and swallows every write.
///
/// Searches and fetches behave exactly like the wrapped provider, so a dry run
/// logs the same matches and misses a real run would.
pub struct ReadOnlyProvider<P> {
    inner: P,
}

impl<P: ProviderClient> ReadOnlyProvider<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }
}

#[async_trait::async_trait]
impl<P: ProviderClient> ProviderClient for ReadOnlyProvider<P> {
    fn provider_name(&self) -> &'static str {
        self.inner.provider_name()
    }

    async fn find_song(&self, song: &Song) -> Result<Option<Song>> {
        self.inner.find_song(song).await
    }

    async fn get_user_playlists(&self) -> Result<Vec<Playlist>> {
        self.inner.get_user_playlists().await
    }

    async fn get_followed_playlists(&self) -> Result<Vec<Playlist>> {
        self.inner.get_followed_playlists().await
    }

    async fn create_playlist(&self, name: &str, songs: &[Song]) -> Result<Playlist> {
        tracing::info!(
            "Read-only mode: not creating {} playlist {} with {} songs",
            self.provider_name(),
            name,
            songs.len()
        );
        Ok(Playlist::new(READ_ONLY_PLAYLIST_ID, name, songs.to_vec()))
    }

    async fn user_playlist_exists(&self, name: &str) -> Result<bool> {
        self.inner.user_playlist_exists(name).await
    }

    async fn delete_playlist(&self, playlist_id: &str) -> Result<()> {
        tracing::info!(
            "Read-only mode: not deleting {} playlist {}",
            self.provider_name(),
            playlist_id
        );
        Ok(())
    }

    async fn get_followed_artists(&self) -> Result<Vec<Artist>> {
        self.inner.get_followed_artists().await
    }

    async fn find_artist(&self, artist: &Artist) -> Result<Option<Artist>> {
        self.inner.find_artist(artist).await
    }

    async fn follow_artist(&self, artist: &Artist) -> Result<()> {
        tracing::info!(
            "Read-only mode: not following {} on {}",
            artist.name(),
            self.provider_name()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::InMemoryProvider;

    #[tokio::test]
    async fn test_create_playlist_leaves_destination_untouched() {
        let inner = InMemoryProvider::new("Dest");
        let provider = ReadOnlyProvider::new(inner.clone());
        let songs = vec![
            Song::new("a", "Wonderwall", "Oasis", None),
            Song::new("b", "Song 2", "Blur", None),
        ];

        let playlist = provider.create_playlist("Britpop", &songs).await.unwrap();

        assert_eq!(playlist.id(), READ_ONLY_PLAYLIST_ID);
        assert_eq!(playlist.name(), "Britpop");
        assert_eq!(playlist.songs(), songs.as_slice());
        assert!(inner.get_user_playlists().await.unwrap().is_empty());
        assert!(!provider.user_playlist_exists("Britpop").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_and_follow_are_suppressed() {
        let inner = InMemoryProvider::new("Dest")
            .with_user_playlist(Playlist::new("p1", "Mine", vec![]))
            .with_catalog_artist(Artist::new("ar1", "Oasis"));
        let provider = ReadOnlyProvider::new(inner.clone());

        provider.delete_playlist("p1").await.unwrap();
        provider
            .follow_artist(&Artist::new("ar1", "Oasis"))
            .await
            .unwrap();

        assert_eq!(inner.get_user_playlists().await.unwrap().len(), 1);
        assert!(inner.get_followed_artists().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reads_are_forwarded() {
        let inner = InMemoryProvider::new("Dest")
            .with_catalog_song(Song::new("x1", "Wonderwall", "Oasis", None));
        let provider = ReadOnlyProvider::new(inner);

        let found = provider
            .find_song(&Song::new("src", "Wonderwall", "Oasis", None))
            .await
            .unwrap();

        assert_eq!(found.map(|s| s.id().to_string()), Some("x1".to_string()));
        assert_eq!(provider.provider_name(), "Dest");
    }
}
