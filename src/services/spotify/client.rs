use color_eyre::eyre::{Result, WrapErr};
use futures::TryStreamExt;
use tokio::sync::OnceCell;

use crate::models::{Artist, Playlist, Song};
use crate::ports::ProviderClient;
use crate::spotify_rs::auth::{SpotifyApiCredentials, SpotifySession};
use crate::spotify_rs::client::SpotifyClient;
use crate::spotify_rs::types::{SpotifyArtist, SpotifyPlaylist, SpotifyTrack};

const PLAYLIST_DESCRIPTION: &str = "Created by musync";

/// Converts a Spotify track into a song. Local files and tracks without an id
/// cannot be added to other playlists and are dropped.
pub fn song_from_track(track: SpotifyTrack) -> Option<Song> {
    let id = track.id?;
    let artist = track
        .artists
        .into_iter()
        .next()
        .map(|artist| artist.name)
        .unwrap_or_default();
    Some(Song::new(id, track.name, artist, track.album.map(|album| album.name)))
}

pub fn artist_from_spotify(artist: SpotifyArtist) -> Option<Artist> {
    Some(Artist::new(artist.id?, artist.name))
}

fn is_owned_by(playlist: &SpotifyPlaylist, user_id: &str) -> bool {
    playlist.owner.id == user_id
}

/// Library playlists owned by `user_id` when `owned`, or owned by others otherwise.
fn playlists_by_ownership(
    playlists: Vec<SpotifyPlaylist>,
    user_id: &str,
    owned: bool,
) -> Vec<SpotifyPlaylist> {
    playlists
        .into_iter()
        .filter(|playlist| is_owned_by(playlist, user_id) == owned)
        .collect()
}

/// First search result that can be added to a playlist.
fn first_song(tracks: Vec<SpotifyTrack>) -> Option<Song> {
    tracks.into_iter().find_map(song_from_track)
}

fn track_uri(song: &Song) -> String {
    format!("spotify:track:{}", song.id())
}

/// Spotify adapter over the Web API.
pub struct SpotifyProvider {
    api: SpotifyClient,
    user_id: OnceCell<String>,
}

impl SpotifyProvider {
    pub fn new(api: SpotifyClient) -> Self {
        Self {
            api,
            user_id: OnceCell::new(),
        }
    }

    /// Authenticates and builds the adapter.
    pub async fn connect(credentials: SpotifyApiCredentials) -> Result<Self> {
        let http = reqwest::Client::new();
        let session = SpotifySession::connect(http.clone(), credentials)
            .await
            .wrap_err("Failed to authenticate with Spotify")?;
        Ok(Self::new(SpotifyClient::new(http, session)))
    }

    /// Id of the authenticated user, fetched once.
    async fn user_id(&self) -> Result<&str> {
        self.user_id
            .get_or_try_init(|| async {
                let user = self
                    .api
                    .get_current_user()
                    .await
                    .wrap_err("Failed to fetch Spotify user profile")?;
                tracing::debug!("Spotify user id: {}", user.id);
                Ok::<_, color_eyre::Report>(user.id)
            })
            .await
            .map(String::as_str)
    }

    async fn library_playlists(&self) -> Result<Vec<SpotifyPlaylist>> {
        self.api
            .current_user_playlists()
            .try_collect()
            .await
            .wrap_err("Failed to fetch Spotify playlists")
    }

    async fn playlist_songs(&self, playlist_id: &str) -> Result<Vec<Song>> {
        let tracks: Vec<SpotifyTrack> = self
            .api
            .playlist_tracks(playlist_id)
            .try_collect()
            .await
            .wrap_err_with(|| {
                format!("Failed to fetch tracks of Spotify playlist {}", playlist_id)
            })?;
        Ok(tracks.into_iter().filter_map(song_from_track).collect())
    }

    async fn playlists(&self, owned: bool) -> Result<Vec<Playlist>> {
        let user_id = self.user_id().await?.to_string();
        let mut playlists = Vec::new();

        for playlist in playlists_by_ownership(self.library_playlists().await?, &user_id, owned) {
            tracing::debug!("Fetching songs of Spotify playlist {}", playlist.name);
            let songs = self.playlist_songs(&playlist.id).await?;
            playlists.push(Playlist::new(playlist.id, playlist.name, songs));
        }

        Ok(playlists)
    }
}

#[async_trait::async_trait]
impl ProviderClient for SpotifyProvider {
    fn provider_name(&self) -> &'static str {
        "Spotify"
    }

    async fn find_song(&self, song: &Song) -> Result<Option<Song>> {
        let tracks = self
            .api
            .search_tracks(&song.search_query(), 1)
            .await
            .wrap_err_with(|| format!("Failed to search Spotify for {}", song))?;
        Ok(first_song(tracks))
    }

    async fn get_user_playlists(&self) -> Result<Vec<Playlist>> {
        self.playlists(true).await
    }

    async fn get_followed_playlists(&self) -> Result<Vec<Playlist>> {
        self.playlists(false).await
    }

    async fn create_playlist(&self, name: &str, songs: &[Song]) -> Result<Playlist> {
        let user_id = self.user_id().await?;
        let created = self
            .api
            .create_playlist(user_id, name, PLAYLIST_DESCRIPTION)
            .await?;

        let uris: Vec<_> = songs.iter().map(track_uri).collect();
        self.api
            .add_tracks(&created.id, &uris)
            .await
            .wrap_err_with(|| format!("Failed to add songs to Spotify playlist {}", name))?;

        Ok(Playlist::new(created.id, name, songs.to_vec()))
    }

    async fn user_playlist_exists(&self, name: &str) -> Result<bool> {
        let user_id = self.user_id().await?.to_string();
        Ok(self
            .library_playlists()
            .await?
            .iter()
            .any(|playlist| is_owned_by(playlist, &user_id) && playlist.name == name))
    }

    async fn delete_playlist(&self, playlist_id: &str) -> Result<()> {
        self.api.unfollow_playlist(playlist_id).await
    }

    async fn get_followed_artists(&self) -> Result<Vec<Artist>> {
        let artists: Vec<SpotifyArtist> = self
            .api
            .followed_artists()
            .try_collect()
            .await
            .wrap_err("Failed to fetch followed Spotify artists")?;
        Ok(artists.into_iter().filter_map(artist_from_spotify).collect())
    }

    async fn find_artist(&self, artist: &Artist) -> Result<Option<Artist>> {
        let artists = self
            .api
            .search_artists(artist.name(), 1)
            .await
            .wrap_err_with(|| format!("Failed to search Spotify for artist {}", artist.name()))?;
        Ok(artists.into_iter().find_map(artist_from_spotify))
    }

    async fn follow_artist(&self, artist: &Artist) -> Result<()> {
        self.api.follow_artists(&[artist.id().to_string()]).await
    }
}
