use color_eyre::eyre::{OptionExt, Result, WrapErr};
use futures::TryStreamExt;
use serde_json::Value;
use tokio::sync::OnceCell;

use crate::models::{Artist, Playlist, Song};
use crate::ports::ProviderClient;
use crate::ytmusic_rs::auth::BrowserAuth;
use crate::ytmusic_rs::client::{LIBRARY_ARTISTS, LIBRARY_PLAYLISTS, SearchFilter, YtMusicClient};
use crate::ytmusic_rs::parse::{self, LibraryPlaylist};

const PLAYLIST_DESCRIPTION: &str = "Created by musync";

fn is_owned_by(playlist: &LibraryPlaylist, channel_id: &str) -> bool {
    playlist.author_ids.iter().any(|id| id == channel_id)
}

/// YouTube Music adapter over the InnerTube API.
pub struct YoutubeProvider {
    api: YtMusicClient,
    channel_id: OnceCell<String>,
}

impl YoutubeProvider {
    pub fn new(api: YtMusicClient) -> Self {
        Self {
            api,
            channel_id: OnceCell::new(),
        }
    }

    /// Builds the adapter for a loaded browser session.
    pub fn with_auth(auth: BrowserAuth) -> Self {
        Self::new(YtMusicClient::new(reqwest::Client::new(), auth))
    }

    /// Channel id of the signed-in user, fetched once.
    async fn channel_id(&self) -> Result<&str> {
        self.channel_id
            .get_or_try_init(|| async {
                let menu = self
                    .api
                    .account_menu()
                    .await
                    .wrap_err("Failed to fetch YouTube Music account")?;
                let channel_id = parse::user_channel_id(&menu)
                    .ok_or_eyre("YouTube Music account has no channel")?;
                tracing::debug!("YouTube Music channel id: {}", channel_id);
                Ok::<_, color_eyre::Report>(channel_id)
            })
            .await
            .map(String::as_str)
    }

    async fn library_playlists(&self) -> Result<Vec<LibraryPlaylist>> {
        let items: Vec<Value> = self
            .api
            .browse_items(LIBRARY_PLAYLISTS, parse::library_playlists_page)
            .try_collect()
            .await
            .wrap_err("Failed to fetch YouTube Music library playlists")?;
        Ok(items.iter().filter_map(parse::library_playlist).collect())
    }

    async fn playlist_songs(&self, playlist_id: &str) -> Result<Vec<Song>> {
        let browse_id = format!("VL{playlist_id}");
        let items: Vec<Value> = self
            .api
            .browse_items(&browse_id, parse::playlist_tracks_page)
            .try_collect()
            .await
            .wrap_err_with(|| {
                format!("Failed to fetch tracks of YouTube Music playlist {}", playlist_id)
            })?;
        Ok(items.iter().filter_map(parse::song_from_item).collect())
    }

    async fn playlists(&self, owned: bool) -> Result<Vec<Playlist>> {
        let channel_id = self.channel_id().await?.to_string();
        let mut playlists = Vec::new();

        for playlist in self.library_playlists().await? {
            if is_owned_by(&playlist, &channel_id) != owned {
                continue;
            }
            tracing::debug!("Fetching songs of YouTube Music playlist {}", playlist.title);
            let songs = self.playlist_songs(&playlist.id).await?;
            playlists.push(Playlist::new(playlist.id, playlist.title, songs));
        }

        Ok(playlists)
    }
}

#[async_trait::async_trait]
impl ProviderClient for YoutubeProvider {
    fn provider_name(&self) -> &'static str {
        "YouTube"
    }

    async fn find_song(&self, song: &Song) -> Result<Option<Song>> {
        let response = self
            .api
            .search(&song.search_query(), SearchFilter::Songs)
            .await
            .wrap_err_with(|| format!("Failed to search YouTube Music for {}", song))?;
        Ok(parse::first_song(&response))
    }

    async fn get_user_playlists(&self) -> Result<Vec<Playlist>> {
        self.playlists(true).await
    }

    async fn get_followed_playlists(&self) -> Result<Vec<Playlist>> {
        self.playlists(false).await
    }

    async fn create_playlist(&self, name: &str, songs: &[Song]) -> Result<Playlist> {
        let video_ids: Vec<String> = songs.iter().map(|song| song.id().to_string()).collect();
        let id = self
            .api
            .create_playlist(name, PLAYLIST_DESCRIPTION, &video_ids)
            .await
            .wrap_err_with(|| format!("Failed to create YouTube Music playlist {}", name))?;
        Ok(Playlist::new(id, name, songs.to_vec()))
    }

    async fn user_playlist_exists(&self, name: &str) -> Result<bool> {
        let channel_id = self.channel_id().await?.to_string();
        Ok(self
            .library_playlists()
            .await?
            .iter()
            .any(|playlist| is_owned_by(playlist, &channel_id) && playlist.title == name))
    }

    async fn delete_playlist(&self, playlist_id: &str) -> Result<()> {
        self.api
            .delete_playlist(playlist_id)
            .await
            .wrap_err_with(|| format!("Failed to delete YouTube Music playlist {}", playlist_id))
    }

    async fn get_followed_artists(&self) -> Result<Vec<Artist>> {
        let items: Vec<Value> = self
            .api
            .browse_items(LIBRARY_ARTISTS, parse::library_artists_page)
            .try_collect()
            .await
            .wrap_err("Failed to fetch followed YouTube Music artists")?;
        Ok(items.iter().filter_map(parse::artist_from_item).collect())
    }

    async fn find_artist(&self, artist: &Artist) -> Result<Option<Artist>> {
        let response = self
            .api
            .search(artist.name(), SearchFilter::Artists)
            .await
            .wrap_err_with(|| {
                format!("Failed to search YouTube Music for artist {}", artist.name())
            })?;
        Ok(parse::first_artist(&response))
    }

    async fn follow_artist(&self, artist: &Artist) -> Result<()> {
        self.api
            .subscribe(&[artist.id().to_string()])
            .await
            .wrap_err_with(|| format!("Failed to subscribe to {} on YouTube Music", artist.name()))
    }
}
