use std::collections::HashMap;
use std::path::{Path, PathBuf};

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use sha1::{Digest, Sha1};

pub const YTM_ORIGIN: &str = "https://music.youtube.com";

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// Headers that must not be replayed from a captured browser request.
const SKIPPED_HEADERS: [&str; 4] = ["authorization", "content-length", "host", "accept-encoding"];

#[derive(Debug, thiserror::Error)]
pub enum BrowserAuthError {
    #[error("Failed to read browser auth file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Browser auth file {path} is not a JSON object of request headers: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Browser auth headers have no cookie")]
    MissingCookie,
    #[error("Browser auth cookie has no SAPISID, log in to music.youtube.com again")]
    MissingSapisid,
    #[error("Invalid browser auth header {name}")]
    InvalidHeader { name: String },
}

/// Credentials of a logged-in YouTube Music browser session.
///
/// The file is a JSON object of request headers copied from a browser request
/// to music.youtube.com. The `Authorization` header is recomputed for every
/// request from the `SAPISID` cookie.
#[derive(Debug, Clone)]
pub struct BrowserAuth {
    headers: HeaderMap,
    sapisid: String,
}

impl BrowserAuth {
    pub fn from_file(path: &Path) -> Result<Self, BrowserAuthError> {
        let contents = std::fs::read_to_string(path).map_err(|source| BrowserAuthError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let raw: HashMap<String, String> =
            serde_json::from_str(&contents).map_err(|source| BrowserAuthError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_headers(raw)
    }

    pub fn from_headers(raw: HashMap<String, String>) -> Result<Self, BrowserAuthError> {
        let mut headers = HeaderMap::new();
        for (name, value) in raw {
            let name = name.to_ascii_lowercase();
            if SKIPPED_HEADERS.contains(&name.as_str()) {
                continue;
            }
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| BrowserAuthError::InvalidHeader { name: name.clone() })?;
            let header_value = HeaderValue::from_str(value.trim())
                .map_err(|_| BrowserAuthError::InvalidHeader { name: name.clone() })?;
            headers.insert(header_name, header_value);
        }

        let cookie = headers
            .get("cookie")
            .and_then(|value| value.to_str().ok())
            .ok_or(BrowserAuthError::MissingCookie)?;
        let sapisid = sapisid_from_cookie(cookie)
            .ok_or(BrowserAuthError::MissingSapisid)?
            .to_string();

        headers
            .entry("x-origin")
            .or_insert(HeaderValue::from_static(YTM_ORIGIN));
        headers
            .entry("content-type")
            .or_insert(HeaderValue::from_static("application/json"));
        headers
            .entry("user-agent")
            .or_insert(HeaderValue::from_static(DEFAULT_USER_AGENT));

        Ok(Self { headers, sapisid })
    }

    /// Request headers, including an `Authorization` valid at `timestamp` (unix seconds).
    pub fn headers(&self, timestamp: u64) -> HeaderMap {
        let mut headers = self.headers.clone();
        if let Ok(value) = HeaderValue::from_str(&sapisid_hash(&self.sapisid, timestamp)) {
            headers.insert(AUTHORIZATION, value);
        }
        headers
    }
}

/// Reads the SAPISID cookie, preferring its `__Secure-3PAPISID` copy.
pub fn sapisid_from_cookie(cookie: &str) -> Option<&str> {
    let cookies: HashMap<&str, &str> = cookie
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .collect();
    cookies
        .get("__Secure-3PAPISID")
        .or_else(|| cookies.get("SAPISID"))
        .copied()
}

/// `SAPISIDHASH <ts>_<sha1("<ts> <sapisid> <origin>")>`
pub fn sapisid_hash(sapisid: &str, timestamp: u64) -> String {
    let digest = Sha1::digest(format!("{timestamp} {sapisid} {YTM_ORIGIN}").as_bytes());
    format!("SAPISIDHASH {timestamp}_{digest:x}")
}
