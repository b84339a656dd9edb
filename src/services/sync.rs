use color_eyre::eyre::{Result, WrapErr};

use crate::models::{Artist, Playlist, Song};
use crate::ports::ProviderClient;

/// Prefix carried by every playlist this tool creates.
pub const SYNCED_PLAYLIST_MARKER: &str = "[MUSYNC]";

/// Name given at the destination to a playlist synced from `source_provider`.
pub fn synced_playlist_name(source_provider: &str, playlist_name: &str) -> String {
    format!("{SYNCED_PLAYLIST_MARKER}[{source_provider}] {playlist_name}")
}

/// Whether a playlist was created by a previous sync.
///
/// Must agree with [`synced_playlist_name`], otherwise synced playlists are fed
/// back into later runs and multiply with every pass.
pub fn is_synced_playlist(name: &str) -> bool {
    name.starts_with(SYNCED_PLAYLIST_MARKER)
}

/// Outcome of looking up a playlist's songs at the destination.
#[derive(Debug, Default)]
pub struct SongMatches {
    /// Destination songs, in source order.
    pub matched: Vec<Song>,
    /// Source songs the destination had no result for.
    pub unmatched: Vec<Song>,
}

/// Looks every song up at the destination, keeping source order.
pub async fn match_songs(destination: &dyn ProviderClient, songs: &[Song]) -> Result<SongMatches> {
    let mut matches = SongMatches::default();

    for song in songs {
        match destination.find_song(song).await? {
            Some(found) => {
                tracing::debug!(
                    "Found {} on {} as {} (album: {})",
                    song,
                    destination.provider_name(),
                    found.id(),
                    found.album().unwrap_or("unknown")
                );
                matches.matched.push(found);
            }
            None => {
                tracing::warn!(
                    "Could not find {} by {} on {}",
                    song.title(),
                    song.artist(),
                    destination.provider_name()
                );
                matches.unmatched.push(song.clone());
            }
        }
    }

    Ok(matches)
}

/// Recreates `playlists` at the destination, skipping those already synced.
///
/// A playlist is created even when none of its songs could be matched. Returns
/// the created playlists in input order.
#[tracing::instrument(skip_all, fields(
    source = source.provider_name(),
    destination = destination.provider_name(),
))]
pub async fn sync_playlists(
    source: &dyn ProviderClient,
    destination: &dyn ProviderClient,
    playlists: &[Playlist],
) -> Result<Vec<Playlist>> {
    let mut created = Vec::new();

    for playlist in playlists {
        tracing::info!(
            "Syncing playlist: {} from {} to {}",
            playlist.name(),
            source.provider_name(),
            destination.provider_name()
        );

        let name = synced_playlist_name(source.provider_name(), playlist.name());

        if destination
            .user_playlist_exists(&name)
            .await
            .wrap_err_with(|| format!("Failed to check whether playlist {} exists", name))?
        {
            tracing::info!(
                "{} playlist {} already exists",
                destination.provider_name(),
                name
            );
            continue;
        }

        let matches = match_songs(destination, playlist.songs()).await?;

        let new_playlist = destination
            .create_playlist(&name, &matches.matched)
            .await
            .wrap_err_with(|| format!("Failed to create playlist {}", name))?;

        tracing::info!(
            "Created {} playlist: {} with {} songs ({} not found)",
            destination.provider_name(),
            new_playlist.name(),
            new_playlist.songs().len(),
            matches.unmatched.len()
        );

        created.push(new_playlist);
    }

    Ok(created)
}

fn without_synced_playlists(playlists: Vec<Playlist>) -> Vec<Playlist> {
    playlists
        .into_iter()
        .filter(|playlist| !is_synced_playlist(playlist.name()))
        .collect()
}

/// Syncs the playlists the user owns at the source.
#[tracing::instrument(skip_all, fields(
    source = source.provider_name(),
    destination = destination.provider_name(),
))]
pub async fn sync_users_playlists(
    source: &dyn ProviderClient,
    destination: &dyn ProviderClient,
) -> Result<Vec<Playlist>> {
    tracing::info!(
        "Fetching user's playlists from {} to sync to {}",
        source.provider_name(),
        destination.provider_name()
    );

    let playlists = source
        .get_user_playlists()
        .await
        .wrap_err_with(|| {
            format!(
                "Failed to fetch user playlists from {}",
                source.provider_name()
            )
        })?;
    let playlists = without_synced_playlists(playlists);

    tracing::info!("Found {} playlists to sync", playlists.len());

    sync_playlists(source, destination, &playlists).await
}

/// Syncs the playlists the user follows, but does not own, at the source.
#[tracing::instrument(skip_all, fields(
    source = source.provider_name(),
    destination = destination.provider_name(),
))]
pub async fn sync_followed_playlists(
    source: &dyn ProviderClient,
    destination: &dyn ProviderClient,
) -> Result<Vec<Playlist>> {
    tracing::info!(
        "Fetching user's followed playlists from {} to sync to {}",
        source.provider_name(),
        destination.provider_name()
    );

    let playlists = source.get_followed_playlists().await.wrap_err_with(|| {
        format!(
            "Failed to fetch followed playlists from {}",
            source.provider_name()
        )
    })?;
    let playlists = without_synced_playlists(playlists);

    tracing::info!("Found {} playlists to sync", playlists.len());

    sync_playlists(source, destination, &playlists).await
}

/// Follows at the destination every artist followed at the source.
///
/// Following is idempotent on the providers, so there is no existence check.
#[tracing::instrument(skip_all, fields(
    source = source.provider_name(),
    destination = destination.provider_name(),
))]
pub async fn sync_followed_artists(
    source: &dyn ProviderClient,
    destination: &dyn ProviderClient,
) -> Result<Vec<Artist>> {
    let artists = source.get_followed_artists().await.wrap_err_with(|| {
        format!(
            "Failed to fetch followed artists from {}",
            source.provider_name()
        )
    })?;

    tracing::info!("Found {} followed artists to sync", artists.len());

    let mut followed = Vec::new();
    for artist in &artists {
        let Some(found) = destination.find_artist(artist).await? else {
            tracing::warn!(
                "Could not find match for artist '{}' on {}",
                artist.name(),
                destination.provider_name()
            );
            continue;
        };

        tracing::debug!(
            "Syncing artist '{}' from {} to {}",
            artist.name(),
            source.provider_name(),
            destination.provider_name()
        );
        destination
            .follow_artist(&found)
            .await
            .wrap_err_with(|| format!("Failed to follow artist {}", found.name()))?;
        followed.push(found);
    }

    Ok(followed)
}

/// Deletes every playlist a previous sync created. Returns how many were deleted.
#[tracing::instrument(skip_all, fields(provider = client.provider_name()))]
pub async fn delete_synced_playlists(client: &dyn ProviderClient) -> Result<usize> {
    let playlists = client
        .get_user_playlists()
        .await
        .wrap_err_with(|| {
            format!(
                "Failed to fetch user playlists from {}",
                client.provider_name()
            )
        })?;

    let synced: Vec<_> = playlists
        .iter()
        .filter(|playlist| is_synced_playlist(playlist.name()))
        .collect();

    tracing::info!(
        "Found {} synced playlists to delete on {}",
        synced.len(),
        client.provider_name()
    );

    for playlist in &synced {
        client
            .delete_playlist(playlist.id())
            .await
            .wrap_err_with(|| format!("Failed to delete playlist {}", playlist.name()))?;
        tracing::info!(
            "Deleted {} playlist: {}",
            client.provider_name(),
            playlist.name()
        );
    }

    tracing::info!(
        "Deleted {} playlists from {}",
        synced.len(),
        client.provider_name()
    );

    Ok(synced.len())
}

#[cfg(test)]
mod tests {
    use color_eyre::eyre::eyre;

    use super::*;
    use crate::ports::provider::MockProviderClient;
    use crate::test_utils::InMemoryProvider;

    fn song(id: &str, title: &str, artist: &str) -> Song {
        Song::new(id, title, artist, None)
    }

    /// Source/destination pair where the destination knows the given songs.
    fn providers_with_catalog(
        catalog: &[(&str, &str, &str)],
    ) -> (InMemoryProvider, InMemoryProvider) {
        let source = InMemoryProvider::new("Source");
        let mut destination = InMemoryProvider::new("Dest");
        for (id, title, artist) in catalog {
            destination = destination.with_catalog_song(song(id, title, artist));
        }
        (source, destination)
    }

    #[test]
    fn test_synced_name_is_recognized_as_synced() {
        let name = synced_playlist_name("Spotify", "Road trip");
        assert_eq!(name, "[MUSYNC][Spotify] Road trip");
        assert!(is_synced_playlist(&name));
        assert!(!is_synced_playlist("Road trip"));
        assert!(!is_synced_playlist("Road trip [MUSYNC]"));
    }

    #[tokio::test]
    async fn test_sync_playlists_preserves_song_order() {
        let (source, destination) = providers_with_catalog(&[
            ("d3", "Three", "C"),
            ("d1", "One", "A"),
            ("d2", "Two", "B"),
        ]);
        let playlist = Playlist::new(
            "p1",
            "Mix",
            vec![song("s1", "One", "A"), song("s2", "Two", "B"), song("s3", "Three", "C")],
        );

        let created = sync_playlists(&source, &destination, &[playlist])
            .await
            .unwrap();

        assert_eq!(created.len(), 1);
        let ids: Vec<_> = created[0].songs().iter().map(|s| s.id()).collect();
        assert_eq!(ids, vec!["d1", "d2", "d3"]);
        assert_eq!(created[0].name(), "[MUSYNC][Source] Mix");
    }

    // `unmatched` holds exactly the songs `match_songs` logs a warning for.
    #[tokio::test]
    async fn test_unmatched_songs_are_dropped() {
        let (_, destination) = providers_with_catalog(&[("d2", "Two", "B")]);
        let songs = vec![song("s1", "One", "A"), song("s2", "Two", "B")];

        let matches = match_songs(&destination, &songs).await.unwrap();

        assert_eq!(matches.matched, vec![song("d2", "Two", "B")]);
        assert_eq!(matches.unmatched, vec![song("s1", "One", "A")]);
    }

    #[tokio::test]
    async fn test_sync_playlists_creates_playlist_with_matched_songs_only() {
        let (source, destination) = providers_with_catalog(&[("d2", "Two", "B")]);
        let playlist = Playlist::new(
            "p1",
            "Mix",
            vec![song("s1", "One", "A"), song("s2", "Two", "B")],
        );

        sync_playlists(&source, &destination, &[playlist])
            .await
            .unwrap();

        let created = destination.user_playlist("[MUSYNC][Source] Mix").unwrap();
        assert_eq!(created.songs(), &[song("d2", "Two", "B")]);
    }

    #[tokio::test]
    async fn test_sync_playlists_creates_empty_playlist_when_nothing_matches() {
        let (source, destination) = providers_with_catalog(&[]);
        let playlist = Playlist::new("p1", "Obscure", vec![song("s1", "Unknown", "Nobody")]);

        let created = sync_playlists(&source, &destination, &[playlist])
            .await
            .unwrap();

        assert_eq!(created.len(), 1);
        assert!(created[0].songs().is_empty());
        assert_eq!(destination.created_count(), 1);
    }

    #[tokio::test]
    async fn test_sync_playlists_returns_created_in_input_order() {
        let (source, destination) = providers_with_catalog(&[]);
        let playlists = vec![
            Playlist::new("p1", "First", vec![]),
            Playlist::new("p2", "Second", vec![]),
            Playlist::new("p3", "Third", vec![]),
        ];

        let created = sync_playlists(&source, &destination, &playlists)
            .await
            .unwrap();

        let names: Vec<_> = created.iter().map(|p| p.name()).collect();
        assert_eq!(
            names,
            vec![
                "[MUSYNC][Source] First",
                "[MUSYNC][Source] Second",
                "[MUSYNC][Source] Third"
            ]
        );
    }

    #[tokio::test]
    async fn test_sync_playlists_skips_existing_without_searching() {
        let source = InMemoryProvider::new("Spotify");
        let mut destination = MockProviderClient::new();
        destination.expect_provider_name().return_const("YouTube");
        destination
            .expect_user_playlist_exists()
            .withf(|name| name == "[MUSYNC][Spotify] Mix")
            .times(1)
            .returning(|_| Ok(true));
        destination.expect_find_song().never();
        destination.expect_create_playlist().never();

        let playlist = Playlist::new("p1", "Mix", vec![song("s1", "One", "A")]);
        let created = sync_playlists(&source, &destination, &[playlist])
            .await
            .unwrap();

        assert!(created.is_empty());
    }

    #[tokio::test]
    async fn test_search_failure_aborts_before_creating() {
        let source = InMemoryProvider::new("Spotify");
        let mut destination = MockProviderClient::new();
        destination.expect_provider_name().return_const("YouTube");
        destination
            .expect_user_playlist_exists()
            .returning(|_| Ok(false));
        destination
            .expect_find_song()
            .returning(|_| Err(eyre!("connection reset")));
        destination.expect_create_playlist().never();

        let playlist = Playlist::new("p1", "Mix", vec![song("s1", "One", "A")]);
        let result = sync_playlists(&source, &destination, &[playlist]).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_sync_users_playlists_is_idempotent() {
        let (source, destination) = providers_with_catalog(&[("d1", "One", "A")]);
        let source =
            source.with_user_playlist(Playlist::new("p1", "Mix", vec![song("s1", "One", "A")]));

        let first = sync_users_playlists(&source, &destination).await.unwrap();
        let second = sync_users_playlists(&source, &destination).await.unwrap();

        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
        assert_eq!(destination.created_count(), 1);
        assert_eq!(
            destination.user_playlist_names(),
            vec!["[MUSYNC][Source] Mix".to_string()]
        );
    }

    #[tokio::test]
    async fn test_sync_users_playlists_excludes_synced_playlists() {
        let (source, destination) = providers_with_catalog(&[]);
        let source = source
            .with_user_playlist(Playlist::new("p1", "[MUSYNC] Foo", vec![]))
            .with_user_playlist(Playlist::new("p2", "[MUSYNC][YouTube] Bar", vec![]))
            .with_user_playlist(Playlist::new("p3", "Baz", vec![]));

        let created = sync_users_playlists(&source, &destination).await.unwrap();

        assert_eq!(created.len(), 1);
        assert_eq!(created[0].name(), "[MUSYNC][Source] Baz");
    }

    #[tokio::test]
    async fn test_sync_followed_playlists_uses_followed_collection() {
        let (source, destination) = providers_with_catalog(&[]);
        let source = source
            .with_user_playlist(Playlist::new("p1", "Owned", vec![]))
            .with_followed_playlist(Playlist::new("p2", "Followed", vec![]))
            .with_followed_playlist(Playlist::new("p3", "[MUSYNC][YouTube] Followed", vec![]));

        let created = sync_followed_playlists(&source, &destination).await.unwrap();

        let names: Vec<_> = created.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["[MUSYNC][Source] Followed"]);
    }

    #[tokio::test]
    async fn test_sync_followed_artists_follows_matches_and_skips_misses() {
        let source = InMemoryProvider::new("Source")
            .with_followed_artist(Artist::new("s-oasis", "Oasis"))
            .with_followed_artist(Artist::new("s-unknown", "Nobody Knows"));
        let destination =
            InMemoryProvider::new("Dest").with_catalog_artist(Artist::new("d-oasis", "oasis"));

        let followed = sync_followed_artists(&source, &destination).await.unwrap();

        assert_eq!(followed, vec![Artist::new("d-oasis", "oasis")]);
        assert_eq!(
            destination.get_followed_artists().await.unwrap(),
            vec![Artist::new("d-oasis", "oasis")]
        );
    }

    #[tokio::test]
    async fn test_sync_followed_artists_skips_follow_on_miss() {
        let source =
            InMemoryProvider::new("Source").with_followed_artist(Artist::new("s1", "Nobody"));
        let mut destination = MockProviderClient::new();
        destination.expect_provider_name().return_const("Dest");
        destination.expect_find_artist().times(1).returning(|_| Ok(None));
        destination.expect_follow_artist().never();

        let followed = sync_followed_artists(&source, &destination).await.unwrap();

        assert!(followed.is_empty());
    }

    #[tokio::test]
    async fn test_delete_synced_playlists_only_removes_marked() {
        let client = InMemoryProvider::new("Dest")
            .with_user_playlist(Playlist::new("p1", "[MUSYNC][Spotify] Mix", vec![]))
            .with_user_playlist(Playlist::new("p2", "Mine", vec![]))
            .with_user_playlist(Playlist::new("p3", "[MUSYNC][YouTube] Other", vec![]));

        let deleted = delete_synced_playlists(&client).await.unwrap();

        assert_eq!(deleted, 2);
        assert_eq!(client.user_playlist_names(), vec!["Mine".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_synced_playlists_with_nothing_to_delete() {
        let mut client = MockProviderClient::new();
        client.expect_provider_name().return_const("Dest");
        client
            .expect_get_user_playlists()
            .returning(|| Ok(vec![Playlist::new("p1", "Mine", vec![])]));
        client.expect_delete_playlist().never();

        assert_eq!(delete_synced_playlists(&client).await.unwrap(), 0);
    }
}
