use std::collections::HashMap;
use std::time::{Duration, Instant};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use color_eyre::Result;
use rand::Rng;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;
use url::Url;

use crate::spotify_rs::types::SpotifyTokenResponse;

const SPOTIFY_AUTH_URL: &str = "https://accounts.spotify.com/authorize";
const SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// Tokens closer than this to their expiry are refreshed before use.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

pub const SPOTIFY_SCOPES: [&str; 9] = [
    "user-follow-read",
    "user-follow-modify",
    "user-library-read",
    "user-library-modify",
    "user-read-private",
    "playlist-read-private",
    "playlist-modify-public",
    "playlist-modify-private",
    "playlist-read-collaborative",
];

/// Application credentials registered in the Spotify developer dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpotifyApiCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    /// Skips the interactive login when present.
    pub refresh_token: Option<String>,
}

impl SpotifyApiCredentials {
    fn basic_auth_header(&self) -> String {
        format!(
            "Basic {}",
            STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret))
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SpotifyAuthError {
    #[error("Invalid grant: {reason}")]
    InvalidGrant { reason: String },
    #[error("Failed to send http request: {0}")]
    FailedToSendRequest(reqwest::Error),
    #[error("Failed to parse response: {0}")]
    FailedToParseResponse(reqwest::Error),
    #[error("Invalid redirect URL: {0}")]
    InvalidRedirect(#[from] url::ParseError),
    #[error("Spotify denied the authorization: {0}")]
    AuthorizationDenied(String),
    #[error("Redirect URL has no authorization code")]
    MissingCode,
    #[error("Redirect URL state does not match the authorization request")]
    StateMismatch,
    #[error("Failed to read the redirect URL: {0}")]
    Input(#[from] std::io::Error),
}

/// Generate a random state parameter for CSRF protection
fn generate_state() -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();
    (0..16)
        .map(|_| CHARSET[rng.random_range(0..CHARSET.len())] as char)
        .collect()
}

/// URL the user opens to grant this application access.
pub fn authorize_url(
    credentials: &SpotifyApiCredentials,
    state: &str,
) -> Result<Url, SpotifyAuthError> {
    let mut url = Url::parse(SPOTIFY_AUTH_URL)?;
    url.query_pairs_mut()
        .append_pair("client_id", &credentials.client_id)
        .append_pair("response_type", "code")
        .append_pair("redirect_uri", &credentials.redirect_uri)
        .append_pair("state", state)
        .append_pair("scope", &SPOTIFY_SCOPES.join(" "));
    Ok(url)
}

/// Extracts the authorization code from the URL Spotify redirected the browser to.
pub fn code_from_redirect(
    redirect: &str,
    expected_state: &str,
) -> Result<String, SpotifyAuthError> {
    let url = Url::parse(redirect.trim())?;
    let params: HashMap<_, _> = url.query_pairs().into_owned().collect();

    if let Some(error) = params.get("error") {
        return Err(SpotifyAuthError::AuthorizationDenied(error.clone()));
    }
    if params.get("state").map(String::as_str) != Some(expected_state) {
        return Err(SpotifyAuthError::StateMismatch);
    }

    params
        .get("code")
        .cloned()
        .ok_or(SpotifyAuthError::MissingCode)
}

async fn request_token(
    http: &reqwest::Client,
    credentials: &SpotifyApiCredentials,
    params: &[(&str, &str)],
) -> Result<SpotifyTokenResponse, SpotifyAuthError> {
    // `form` serializes to x-www-form-urlencoded, as the token endpoint requires
    let response = http
        .post(SPOTIFY_TOKEN_URL)
        .form(params)
        .header("Authorization", credentials.basic_auth_header())
        .timeout(Duration::from_secs(10))
        .send()
        .await
        .map_err(SpotifyAuthError::FailedToSendRequest)?;

    if !response.status().is_success() {
        return Err(SpotifyAuthError::InvalidGrant {
            reason: response
                .text()
                .await
                .unwrap_or("Failed to get error text".to_string()),
        });
    }

    response
        .json()
        .await
        .map_err(SpotifyAuthError::FailedToParseResponse)
}

/// Exchange authorization code for access token
/// https://developer.spotify.com/documentation/web-api/tutorials/code-flow
pub async fn exchange_code_for_token(
    http: &reqwest::Client,
    credentials: &SpotifyApiCredentials,
    code: &str,
) -> Result<SpotifyTokenResponse, SpotifyAuthError> {
    request_token(
        http,
        credentials,
        &[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", &credentials.redirect_uri),
        ],
    )
    .await
}

/// Refresh an access token using a refresh token
pub async fn refresh_access_token(
    http: &reqwest::Client,
    credentials: &SpotifyApiCredentials,
    refresh_token: &str,
) -> Result<SpotifyTokenResponse, SpotifyAuthError> {
    request_token(
        http,
        credentials,
        &[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ],
    )
    .await
}

/// Walks the user through the authorization code flow on the terminal.
async fn authorize_interactively(
    http: &reqwest::Client,
    credentials: &SpotifyApiCredentials,
) -> Result<SpotifyTokenResponse, SpotifyAuthError> {
    let state = generate_state();
    let url = authorize_url(credentials, &state)?;

    eprintln!("Open this URL in your browser to authorize musync with Spotify:\n\n{url}\n");
    eprintln!("Then paste the URL you were redirected to:");

    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await?;

    let code = code_from_redirect(&line, &state)?;
    exchange_code_for_token(http, credentials, &code).await
}

struct SessionToken {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Instant,
}

impl SessionToken {
    fn from_response(response: SpotifyTokenResponse, previous_refresh: Option<String>) -> Self {
        Self {
            access_token: response.access_token,
            // Spotify does not always rotate the refresh token
            refresh_token: response.refresh_token.or(previous_refresh),
            expires_at: Instant::now() + Duration::from_secs(response.expires_in),
        }
    }

    fn is_expiring(&self) -> bool {
        Instant::now() + EXPIRY_MARGIN >= self.expires_at
    }
}

/// Authenticated Spotify session that refreshes its access token on demand.
pub struct SpotifySession {
    http: reqwest::Client,
    credentials: SpotifyApiCredentials,
    token: Mutex<SessionToken>,
}

impl SpotifySession {
    /// Authenticates with the configured refresh token, or interactively without one.
    pub async fn connect(
        http: reqwest::Client,
        credentials: SpotifyApiCredentials,
    ) -> Result<Self, SpotifyAuthError> {
        let response = match &credentials.refresh_token {
            Some(refresh_token) => {
                tracing::debug!("Authenticating with Spotify using the configured refresh token");
                refresh_access_token(&http, &credentials, refresh_token).await?
            }
            None => authorize_interactively(&http, &credentials).await?,
        };
        tracing::info!("Authenticated with Spotify");

        let token = SessionToken::from_response(response, credentials.refresh_token.clone());
        Ok(Self {
            http,
            credentials,
            token: Mutex::new(token),
        })
    }

    /// A valid access token, refreshed first if it is about to expire.
    pub async fn access_token(&self) -> Result<String, SpotifyAuthError> {
        let mut token = self.token.lock().await;

        if token.is_expiring()
            && let Some(refresh_token) = token.refresh_token.clone()
        {
            tracing::debug!("Spotify access token expiring, refreshing");
            let response =
                refresh_access_token(&self.http, &self.credentials, &refresh_token).await?;
            *token = SessionToken::from_response(response, Some(refresh_token));
        }

        Ok(token.access_token.clone())
    }
}
