use std::sync::{Arc, Mutex, MutexGuard};

use color_eyre::eyre::{Result, eyre};

use crate::models::{Artist, Playlist, Song};
use crate::ports::ProviderClient;

/// Provider backed by in-memory collections.
///
/// Clones share the same state, so a test can hand one clone to the code under
/// test and inspect the other afterwards. Songs and artists are found by
/// case-insensitive title/artist (or name) equality against the catalog.
#[derive(Clone)]
pub struct InMemoryProvider {
    name: &'static str,
    state: Arc<Mutex<State>>,
}

#[derive(Default)]
struct State {
    catalog: Vec<Song>,
    catalog_artists: Vec<Artist>,
    user_playlists: Vec<Playlist>,
    followed_playlists: Vec<Playlist>,
    followed_artists: Vec<Artist>,
    next_id: usize,
    created: usize,
}

impl InMemoryProvider {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn with_catalog_song(self, song: Song) -> Self {
        self.state().catalog.push(song);
        self
    }

    pub fn with_catalog_artist(self, artist: Artist) -> Self {
        self.state().catalog_artists.push(artist);
        self
    }

    pub fn with_user_playlist(self, playlist: Playlist) -> Self {
        self.state().user_playlists.push(playlist);
        self
    }

    pub fn with_followed_playlist(self, playlist: Playlist) -> Self {
        self.state().followed_playlists.push(playlist);
        self
    }

    pub fn with_followed_artist(self, artist: Artist) -> Self {
        self.state().followed_artists.push(artist);
        self
    }

    /// Number of `create_playlist` calls that reached this provider.
    pub fn created_count(&self) -> usize {
        self.state().created
    }

    pub fn user_playlist_names(&self) -> Vec<String> {
        self.state()
            .user_playlists
            .iter()
            .map(|p| p.name().to_string())
            .collect()
    }

    pub fn user_playlist(&self, name: &str) -> Option<Playlist> {
        self.state()
            .user_playlists
            .iter()
            .find(|p| p.name() == name)
            .cloned()
    }
}

#[async_trait::async_trait]
impl ProviderClient for InMemoryProvider {
    fn provider_name(&self) -> &'static str {
        self.name
    }

    async fn find_song(&self, song: &Song) -> Result<Option<Song>> {
        Ok(self
            .state()
            .catalog
            .iter()
            .find(|candidate| {
                candidate.title().eq_ignore_ascii_case(song.title())
                    && candidate.artist().eq_ignore_ascii_case(song.artist())
            })
            .cloned())
    }

    async fn get_user_playlists(&self) -> Result<Vec<Playlist>> {
        Ok(self.state().user_playlists.clone())
    }

    async fn get_followed_playlists(&self) -> Result<Vec<Playlist>> {
        Ok(self.state().followed_playlists.clone())
    }

    async fn create_playlist(&self, name: &str, songs: &[Song]) -> Result<Playlist> {
        let mut state = self.state();
        state.next_id += 1;
        state.created += 1;
        let playlist = Playlist::new(
            format!("{}-{}", self.name.to_lowercase(), state.next_id),
            name,
            songs.to_vec(),
        );
        state.user_playlists.push(playlist.clone());
        Ok(playlist)
    }

    async fn user_playlist_exists(&self, name: &str) -> Result<bool> {
        Ok(self.state().user_playlists.iter().any(|p| p.name() == name))
    }

    async fn delete_playlist(&self, playlist_id: &str) -> Result<()> {
        let mut state = self.state();
        let index = state
            .user_playlists
            .iter()
            .position(|p| p.id() == playlist_id)
            .ok_or_else(|| eyre!("No playlist with id {}", playlist_id))?;
        state.user_playlists.remove(index);
        Ok(())
    }

    async fn get_followed_artists(&self) -> Result<Vec<Artist>> {
        Ok(self.state().followed_artists.clone())
    }

    async fn find_artist(&self, artist: &Artist) -> Result<Option<Artist>> {
        Ok(self
            .state()
            .catalog_artists
            .iter()
            .find(|candidate| candidate.name().eq_ignore_ascii_case(artist.name()))
            .cloned())
    }

    async fn follow_artist(&self, artist: &Artist) -> Result<()> {
        let mut state = self.state();
        if !state.followed_artists.iter().any(|a| a.id() == artist.id()) {
            state.followed_artists.push(artist.clone());
        }
        Ok(())
    }
}
