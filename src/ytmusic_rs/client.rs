use std::num::NonZeroU32;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use color_eyre::Result;
use color_eyre::eyre::{OptionExt, WrapErr};
use futures::Stream;
use governor::{
    Quota, RateLimiter, clock::DefaultClock, state::InMemoryState, state::direct::NotKeyed,
};
use serde_json::{Value, json};

use crate::ytmusic_rs::auth::BrowserAuth;
use crate::ytmusic_rs::parse::{self, Continuation, Page};

const API_BASE_URL: &str = "https://music.youtube.com/youtubei/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const REQUESTS_PER_SECOND: NonZeroU32 = NonZeroU32::new(5).unwrap();

pub const LIBRARY_PLAYLISTS: &str = "FEmusic_liked_playlists";
pub const LIBRARY_ARTISTS: &str = "FEmusic_library_corpus_artists";

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Result type filter of a search request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchFilter {
    Songs,
    Artists,
}

impl SearchFilter {
    fn params(self) -> &'static str {
        match self {
            SearchFilter::Songs => "EgWKAQIIAWoMEA4QChADEAQQCRAF",
            SearchFilter::Artists => "EgWKAQIgAWoMEA4QChADEAQQCRAF",
        }
    }
}

/// InnerTube `context` sent with every request.
pub fn request_context(date: chrono::NaiveDate) -> Value {
    json!({
        "client": {
            "clientName": "WEB_REMIX",
            "clientVersion": format!("1.{}.01.00", date.format("%Y%m%d")),
            "hl": "en"
        },
        "user": {}
    })
}

fn continuation_params(continuation: &Continuation) -> (String, Value) {
    match continuation {
        Continuation::Legacy(token) => {
            let token = urlencoding::encode(token);
            (
                format!("&ctoken={token}&continuation={token}&type=next"),
                json!({}),
            )
        }
        Continuation::Command(token) => (String::new(), json!({ "continuation": token })),
    }
}

/// YouTube Music InnerTube client authenticated with a browser session.
pub struct YtMusicClient {
    http: reqwest::Client,
    auth: BrowserAuth,
    rate_limiter: DirectRateLimiter,
}

impl YtMusicClient {
    pub fn new(http: reqwest::Client, auth: BrowserAuth) -> Self {
        Self {
            http,
            auth,
            rate_limiter: RateLimiter::direct(Quota::per_second(REQUESTS_PER_SECOND)),
        }
    }

    async fn send_request(
        &self,
        endpoint: &str,
        mut body: Value,
        additional_params: &str,
    ) -> Result<Value> {
        self.rate_limiter.until_ready().await;

        body["context"] = request_context(chrono::Utc::now().date_naive());
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .wrap_err("System clock is before the unix epoch")?
            .as_secs();
        let url = format!("{API_BASE_URL}/{endpoint}?alt=json{additional_params}");
        tracing::debug!("POST {}", url);

        self.http
            .post(&url)
            .headers(self.auth.headers(timestamp))
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await
            .wrap_err_with(|| format!("Failed to send YouTube Music request to {}", endpoint))?
            .error_for_status()
            .wrap_err_with(|| format!("YouTube Music request to {} failed", endpoint))?
            .json()
            .await
            .wrap_err_with(|| format!("Failed to parse YouTube Music response from {}", endpoint))
    }

    pub async fn search(&self, query: &str, filter: SearchFilter) -> Result<Value> {
        self.send_request(
            "search",
            json!({ "query": query, "params": filter.params() }),
            "",
        )
        .await
    }

    /// Lazily walks every page of a browse listing.
    ///
    /// `first_page` extracts the items of the initial response; later pages
    /// are fetched by continuation token. Calling this again starts over.
    pub fn browse_items<'a>(
        &'a self,
        browse_id: &'a str,
        first_page: fn(&Value) -> Page,
    ) -> impl Stream<Item = Result<Value>> + Send + 'a {
        async_stream::try_stream! {
            let response = self
                .send_request("browse", json!({ "browseId": browse_id }), "")
                .await?;
            let mut page = first_page(&response);
            loop {
                for item in page.items {
                    yield item;
                }
                let Some(continuation) = page.continuation else {
                    break;
                };
                let (params, body) = continuation_params(&continuation);
                let response = self.send_request("browse", body, &params).await?;
                page = parse::continuation_page(&response);
            }
        }
    }

    pub async fn account_menu(&self) -> Result<Value> {
        self.send_request("account/account_menu", json!({}), "").await
    }

    /// Creates a private playlist with the given videos and returns its id.
    pub async fn create_playlist(
        &self,
        title: &str,
        description: &str,
        video_ids: &[String],
    ) -> Result<String> {
        let mut body = json!({
            "title": title,
            "description": description,
            "privacyStatus": "PRIVATE",
        });
        if !video_ids.is_empty() {
            body["videoIds"] = json!(video_ids);
        }

        let response = self.send_request("playlist/create", body, "").await?;
        response
            .get("playlistId")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_eyre("YouTube Music did not return the created playlist id")
    }

    pub async fn delete_playlist(&self, playlist_id: &str) -> Result<()> {
        let playlist_id = playlist_id.strip_prefix("VL").unwrap_or(playlist_id);
        self.send_request("playlist/delete", json!({ "playlistId": playlist_id }), "")
            .await?;
        Ok(())
    }

    /// Subscribes to artist channels.
    pub async fn subscribe(&self, channel_ids: &[String]) -> Result<()> {
        self.send_request(
            "subscription/subscribe",
            json!({ "channelIds": channel_ids }),
            "",
        )
        .await?;
        Ok(())
    }
}
