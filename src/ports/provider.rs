use color_eyre::eyre::Result;

use crate::models::{Artist, Playlist, Song};

/// Port trait wrapping the capabilities every music provider offers to the sync engine.
///
/// Implementations live in `services::spotify::client` and `services::youtube::client`
/// (production), `ports::read_only` (decorator) or test fakes.
///
/// Lookups that find nothing return `Ok(None)`. An `Err` always means the provider
/// could not be reached or refused the request.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ProviderClient: Send + Sync {
    /// Short, stable name used in synced playlist names and in logs.
    fn provider_name(&self) -> &'static str;

    async fn find_song(&self, song: &Song) -> Result<Option<Song>>;

    /// Playlists owned by the authenticated user, with their songs resolved.
    async fn get_user_playlists(&self) -> Result<Vec<Playlist>>;

    /// Playlists saved in the user's library but owned by someone else.
    async fn get_followed_playlists(&self) -> Result<Vec<Playlist>>;

    /// Creates a playlist holding `songs` in order. Never checks for duplicates.
    async fn create_playlist(&self, name: &str, songs: &[Song]) -> Result<Playlist>;

    /// Exact name match against the playlists owned by the authenticated user.
    async fn user_playlist_exists(&self, name: &str) -> Result<bool>;

    async fn delete_playlist(&self, playlist_id: &str) -> Result<()>;

    async fn get_followed_artists(&self) -> Result<Vec<Artist>>;

    async fn find_artist(&self, artist: &Artist) -> Result<Option<Artist>>;

    async fn follow_artist(&self, artist: &Artist) -> Result<()>;
}

#[async_trait::async_trait]
impl<P: ProviderClient + ?Sized> ProviderClient for Box<P> {
    fn provider_name(&self) -> &'static str {
        (**self).provider_name()
    }

    async fn find_song(&self, song: &Song) -> Result<Option<Song>> {
        (**self).find_song(song).await
    }

    async fn get_user_playlists(&self) -> Result<Vec<Playlist>> {
        (**self).get_user_playlists().await
    }

    async fn get_followed_playlists(&self) -> Result<Vec<Playlist>> {
        (**self).get_followed_playlists().await
    }

    async fn create_playlist(&self, name: &str, songs: &[Song]) -> Result<Playlist> {
        (**self).create_playlist(name, songs).await
    }

    async fn user_playlist_exists(&self, name: &str) -> Result<bool> {
        (**self).user_playlist_exists(name).await
    }

    async fn delete_playlist(&self, playlist_id: &str) -> Result<()> {
        (**self).delete_playlist(playlist_id).await
    }

    async fn get_followed_artists(&self) -> Result<Vec<Artist>> {
        (**self).get_followed_artists().await
    }

    async fn find_artist(&self, artist: &Artist) -> Result<Option<Artist>> {
        (**self).find_artist(artist).await
    }

    async fn follow_artist(&self, artist: &Artist) -> Result<()> {
        (**self).follow_artist(artist).await
    }
}
