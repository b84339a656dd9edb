use std::num::NonZeroU32;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use color_eyre::Result;
use color_eyre::eyre::{OptionExt, WrapErr};
use futures::Stream;
use governor::{
    Quota, RateLimiter, clock::DefaultClock, state::InMemoryState, state::direct::NotKeyed,
};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::spotify_rs::auth::SpotifySession;
use crate::spotify_rs::types::{
    SpotifyArtist, SpotifyFollowedArtists, SpotifyPage, SpotifyPlaylist, SpotifyPlaylistItem,
    SpotifySearchResponse, SpotifyTrack, SpotifyUser,
};

const API_BASE_URL: &str = "https://api.spotify.com/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const REQUESTS_PER_SECOND: NonZeroU32 = NonZeroU32::new(10).unwrap();
/// Retries after the first attempt when Spotify answers 429.
const MAX_RETRIES: usize = 2;

/// Maximum number of items `POST /playlists/{id}/tracks` accepts at once.
const ADD_TRACKS_BATCH_SIZE: usize = 100;
/// Maximum number of ids `PUT /me/following` accepts at once.
const FOLLOW_BATCH_SIZE: usize = 50;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

#[derive(Debug, thiserror::Error)]
#[error("Rate limited by Spotify")]
struct RateLimited {
    retry_after: Option<Duration>,
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn is_rate_limited(err: &color_eyre::Report) -> bool {
    err.downcast_ref::<RateLimited>().is_some()
}

/// Tracks of a search response, in result order.
pub fn tracks_from_search(response: SpotifySearchResponse) -> Vec<SpotifyTrack> {
    response
        .tracks
        .map(|page| page.items.into_iter().flatten().collect())
        .unwrap_or_default()
}

/// Request bodies appending `uris` in order, at most [`ADD_TRACKS_BATCH_SIZE`] each.
fn add_tracks_bodies(uris: &[String]) -> Vec<serde_json::Value> {
    uris.chunks(ADD_TRACKS_BATCH_SIZE)
        .map(|batch| json!({ "uris": batch }))
        .collect()
}

/// Waits as long as `Retry-After` asks, once the backoff allows another attempt.
fn retry_delay(err: &color_eyre::Report, backoff: Option<Duration>) -> Option<Duration> {
    let requested = err
        .downcast_ref::<RateLimited>()
        .and_then(|limited| limited.retry_after);
    backoff.map(|backoff| requested.unwrap_or(backoff))
}

/// Spotify Web API client
pub struct SpotifyClient {
    http: reqwest::Client,
    session: SpotifySession,
    rate_limiter: DirectRateLimiter,
}

impl SpotifyClient {
    pub fn new(http: reqwest::Client, session: SpotifySession) -> Self {
        Self {
            http,
            session,
            rate_limiter: RateLimiter::direct(Quota::per_second(REQUESTS_PER_SECOND)),
        }
    }

    /// Sends the request once, turning a 429 into [`RateLimited`].
    async fn send_once(&self, request: RequestBuilder) -> Result<Response> {
        self.rate_limiter.until_ready().await;
        let token = self.session.access_token().await?;

        let response = request
            .bearer_auth(token)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .wrap_err("Failed to send Spotify request")?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(RateLimited {
                retry_after: retry_after(response.headers()),
            }
            .into());
        }

        response
            .error_for_status()
            .wrap_err("Spotify request failed")
    }

    /// Sends the request, waiting and retrying when Spotify answers 429.
    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let attempt = move || {
            let request = request.try_clone();
            async move {
                let request = request.ok_or_eyre("Spotify request cannot be retried")?;
                self.send_once(request).await
            }
        };

        attempt
            .retry(ExponentialBuilder::default().with_max_times(MAX_RETRIES))
            .when(is_rate_limited)
            .adjust(retry_delay)
            .notify(|_, wait| tracing::warn!("Rate limited by Spotify, retrying in {:?}", wait))
            .await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        tracing::debug!("GET {}", url);
        self.send(self.http.get(url))
            .await
            .wrap_err_with(|| format!("Spotify request to {} failed", url))?
            .json()
            .await
            .wrap_err_with(|| format!("Failed to parse Spotify response from {}", url))
    }

    async fn send_json(
        &self,
        method: Method,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<Response> {
        tracing::debug!("{} {}", method, url);
        self.send(self.http.request(method, url).json(body))
            .await
            .wrap_err_with(|| format!("Spotify request to {} failed", url))
    }

    /// Lazily walks a paginated collection by following `next` links.
    ///
    /// Nothing is requested until the stream is polled; calling this again
    /// starts over from the first page.
    fn paged<P, T>(
        &self,
        first_url: String,
        into_page: fn(P) -> SpotifyPage<T>,
    ) -> impl Stream<Item = Result<T>> + Send + '_
    where
        P: DeserializeOwned + Send + 'static,
        T: Send + 'static,
    {
        async_stream::try_stream! {
            let mut next_url = Some(first_url);
            while let Some(url) = next_url {
                let page = into_page(self.get_json::<P>(&url).await?);
                next_url = page.next;
                for item in page.items.into_iter().flatten() {
                    yield item;
                }
            }
        }
    }

    /// Get the current user's profile
    pub async fn get_current_user(&self) -> Result<SpotifyUser> {
        self.get_json(&format!("{API_BASE_URL}/me")).await
    }

    /// Searches tracks matching a free-text query.
    pub async fn search_tracks(&self, query: &str, limit: u32) -> Result<Vec<SpotifyTrack>> {
        let response: SpotifySearchResponse = self
            .get_json(&format!(
                "{API_BASE_URL}/search?type=track&limit={}&q={}",
                limit,
                urlencoding::encode(query)
            ))
            .await?;
        Ok(tracks_from_search(response))
    }

    /// Searches artists matching a free-text query.
    pub async fn search_artists(&self, query: &str, limit: u32) -> Result<Vec<SpotifyArtist>> {
        let response: SpotifySearchResponse = self
            .get_json(&format!(
                "{API_BASE_URL}/search?type=artist&limit={}&q={}",
                limit,
                urlencoding::encode(query)
            ))
            .await?;
        Ok(response
            .artists
            .map(|page| page.items.into_iter().flatten().collect())
            .unwrap_or_default())
    }

    /// Every playlist in the user's library, owned or followed.
    pub fn current_user_playlists(
        &self,
    ) -> impl Stream<Item = Result<SpotifyPlaylist>> + Send + '_ {
        self.paged(
            format!("{API_BASE_URL}/me/playlists?limit=50"),
            |page: SpotifyPage<SpotifyPlaylist>| page,
        )
    }

    /// Tracks of a playlist in playlist order, without removed entries.
    pub fn playlist_tracks(
        &self,
        playlist_id: &str,
    ) -> impl Stream<Item = Result<SpotifyTrack>> + Send + '_ {
        self.paged(
            format!("{API_BASE_URL}/playlists/{playlist_id}/tracks?limit=100"),
            |page: SpotifyPage<SpotifyPlaylistItem>| SpotifyPage {
                items: page
                    .items
                    .into_iter()
                    .map(|item| item.and_then(|item| item.track))
                    .collect(),
                next: page.next,
            },
        )
    }

    /// Artists the user follows. The listing is cursor based; `next` carries the cursor.
    pub fn followed_artists(&self) -> impl Stream<Item = Result<SpotifyArtist>> + Send + '_ {
        self.paged(
            format!("{API_BASE_URL}/me/following?type=artist&limit=50"),
            |response: SpotifyFollowedArtists| response.artists,
        )
    }

    pub async fn create_playlist(
        &self,
        user_id: &str,
        name: &str,
        description: &str,
    ) -> Result<SpotifyPlaylist> {
        self.send_json(
            Method::POST,
            &format!("{API_BASE_URL}/users/{}/playlists", urlencoding::encode(user_id)),
            &json!({ "name": name, "description": description, "public": false }),
        )
        .await?
        .json()
        .await
        .wrap_err("Failed to parse created Spotify playlist")
    }

    /// Appends tracks (as `spotify:track:` URIs) in order, in batches.
    pub async fn add_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<()> {
        for body in add_tracks_bodies(uris) {
            self.send_json(
                Method::POST,
                &format!("{API_BASE_URL}/playlists/{playlist_id}/tracks"),
                &body,
            )
            .await?;
        }
        Ok(())
    }

    /// Removes a playlist from the user's library. Spotify has no real delete.
    pub async fn unfollow_playlist(&self, playlist_id: &str) -> Result<()> {
        self.send_json(
            Method::DELETE,
            &format!("{API_BASE_URL}/playlists/{playlist_id}/followers"),
            &json!({}),
        )
        .await?;
        Ok(())
    }

    pub async fn follow_artists(&self, artist_ids: &[String]) -> Result<()> {
        for batch in artist_ids.chunks(FOLLOW_BATCH_SIZE) {
            self.send_json(
                Method::PUT,
                &format!("{API_BASE_URL}/me/following?type=artist"),
                &json!({ "ids": batch }),
            )
            .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use reqwest::header::HeaderValue;

    use super::*;

    fn rate_limited(retry_after: Option<u64>) -> color_eyre::Report {
        RateLimited {
            retry_after: retry_after.map(Duration::from_secs),
        }
        .into()
    }

    #[test]
    fn test_add_tracks_bodies_batches_in_order() {
        let uris: Vec<String> = (0..250).map(|i| format!("spotify:track:{i}")).collect();

        let bodies = add_tracks_bodies(&uris);

        let sizes: Vec<_> = bodies
            .iter()
            .map(|body| body["uris"].as_array().unwrap().len())
            .collect();
        assert_eq!(sizes, vec![100, 100, 50]);
        assert_eq!(bodies[0]["uris"][0], "spotify:track:0");
        assert_eq!(bodies[1]["uris"][0], "spotify:track:100");
        assert_eq!(bodies[2]["uris"][49], "spotify:track:249");
    }

    #[test]
    fn test_add_tracks_bodies_empty() {
        assert!(add_tracks_bodies(&[]).is_empty());
    }

    #[test]
    fn test_retry_after_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after(&headers), None);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(7)));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("soon"));
        assert_eq!(retry_after(&headers), None);
    }

    #[test]
    fn test_only_rate_limits_are_retried() {
        assert!(is_rate_limited(&rate_limited(None)));
        assert!(is_rate_limited(
            &rate_limited(Some(1)).wrap_err("Spotify request to /me failed")
        ));
        assert!(!is_rate_limited(&color_eyre::eyre::eyre!("Spotify request failed")));
    }

    #[test]
    fn test_retry_delay_prefers_retry_after() {
        let backoff = Some(Duration::from_secs(1));

        assert_eq!(
            retry_delay(&rate_limited(Some(5)), backoff),
            Some(Duration::from_secs(5))
        );
        assert_eq!(retry_delay(&rate_limited(None), backoff), backoff);
        assert_eq!(retry_delay(&rate_limited(Some(5)), None), None);
    }
}
