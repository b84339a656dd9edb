use color_eyre::eyre::Result;

use crate::models::{Artist, Playlist};
use crate::ports::ProviderClient;
use crate::services::sync::{
    delete_synced_playlists, sync_followed_artists, sync_followed_playlists, sync_users_playlists,
};

/// Which collections a sync run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    pub user_playlists: bool,
    pub followed_playlists: bool,
    pub followed_artists: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            user_playlists: true,
            followed_playlists: true,
            followed_artists: true,
        }
    }
}

/// What one source to destination run changed.
#[derive(Debug)]
pub struct SyncReport {
    pub source: &'static str,
    pub destination: &'static str,
    pub created_playlists: Vec<Playlist>,
    pub followed_artists: Vec<Artist>,
}

/// Syncs the selected collections from `source` to `destination`.
pub async fn unisync(
    source: &dyn ProviderClient,
    destination: &dyn ProviderClient,
    options: &SyncOptions,
) -> Result<SyncReport> {
    let mut report = SyncReport {
        source: source.provider_name(),
        destination: destination.provider_name(),
        created_playlists: Vec::new(),
        followed_artists: Vec::new(),
    };

    if options.user_playlists {
        report
            .created_playlists
            .extend(sync_users_playlists(source, destination).await?);
    }

    if options.followed_playlists {
        report
            .created_playlists
            .extend(sync_followed_playlists(source, destination).await?);
    }

    if options.followed_artists {
        report.followed_artists = sync_followed_artists(source, destination).await?;
    }

    tracing::info!(
        "Finished syncing {} to {}: {} playlists created, {} artists followed",
        report.source,
        report.destination,
        report.created_playlists.len(),
        report.followed_artists.len()
    );

    Ok(report)
}

/// Every ordered pair of distinct indices below `count`, source first.
pub fn ordered_pairs(count: usize) -> Vec<(usize, usize)> {
    (0..count)
        .flat_map(|source| {
            (0..count)
                .filter(move |destination| *destination != source)
                .map(move |destination| (source, destination))
        })
        .collect()
}

/// Syncs in both directions between every pair of `clients`.
///
/// Pairs run one after the other; playlists created by an earlier pair carry
/// the sync marker and are ignored when their provider later acts as source.
pub async fn multisync(
    clients: &[Box<dyn ProviderClient>],
    options: &SyncOptions,
) -> Result<Vec<SyncReport>> {
    let mut reports = Vec::new();

    for (source, destination) in ordered_pairs(clients.len()) {
        let source = clients[source].as_ref();
        let destination = clients[destination].as_ref();
        tracing::info!(
            "Syncing {} to {}",
            source.provider_name(),
            destination.provider_name()
        );
        reports.push(unisync(source, destination, options).await?);
    }

    Ok(reports)
}

/// Removes every synced playlist from `client`.
pub async fn clear_playlists(client: &dyn ProviderClient) -> Result<usize> {
    delete_synced_playlists(client).await
}
