use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::spotify_rs::auth::SpotifyApiCredentials;

const DEFAULT_CONFIG: &str = r#"# musync configuration
#
# Every value can also be given through the environment (or a .env file),
# which takes precedence over this file.

[spotify]
# client_id = ""          # SPOTIFY_CLIENT_ID
# client_secret = ""      # SPOTIFY_CLIENT_SECRET
# redirect_uri = "http://127.0.0.1:8888/callback"  # SPOTIFY_REDIRECT_URI
# refresh_token = ""      # SPOTIFY_REFRESH_TOKEN, skips the interactive login

[youtube]
# Request headers of a logged-in music.youtube.com session, as a JSON object
# browser_auth_file = "~/.config/musync/browser.json"  # YOUTUBE_BROWSER_AUTH_FILEPATH
"#;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("No config directory found for this platform")]
    NoConfigDir,
    #[error("Missing {provider} configuration: {}", .keys.join(", "))]
    Missing {
        provider: &'static str,
        keys: Vec<&'static str>,
    },
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotifyConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
    pub refresh_token: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YoutubeConfig {
    pub browser_auth_file: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub spotify: SpotifyConfig,
    #[serde(default)]
    pub youtube: YoutubeConfig,
}

impl Config {
    /// Load config from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Default location of the config file
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|path| path.join("musync").join("config.toml"))
    }

    /// Loads the given file, or the default one when it exists, then applies
    /// environment overrides. An explicitly given file must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::config_path().filter(|path| path.is_file()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };
        Ok(config.with_env_overrides(|key| std::env::var(key).ok()))
    }

    /// Writes a commented template to the default location, keeping any existing file.
    pub fn create_default() -> Result<PathBuf, ConfigError> {
        let path = Self::config_path().ok_or(ConfigError::NoConfigDir)?;
        if path.exists() {
            tracing::info!("Config file already exists at {}", path.display());
            return Ok(path);
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(&path, DEFAULT_CONFIG).map_err(|source| ConfigError::Write {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    /// Overrides file values with non-empty values from `lookup`.
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let spotify = &mut self.spotify;
        for (key, field) in [
            ("SPOTIFY_CLIENT_ID", &mut spotify.client_id),
            ("SPOTIFY_CLIENT_SECRET", &mut spotify.client_secret),
            ("SPOTIFY_REDIRECT_URI", &mut spotify.redirect_uri),
            ("SPOTIFY_REFRESH_TOKEN", &mut spotify.refresh_token),
            ("YOUTUBE_BROWSER_AUTH_FILEPATH", &mut self.youtube.browser_auth_file),
        ] {
            if let Some(value) = var(key) {
                *field = Some(value);
            }
        }

        self
    }

    pub fn spotify_credentials(&self) -> Result<SpotifyApiCredentials, ConfigError> {
        let spotify = &self.spotify;
        let required = [
            ("client_id", &spotify.client_id),
            ("client_secret", &spotify.client_secret),
            ("redirect_uri", &spotify.redirect_uri),
        ];
        let missing: Vec<_> = required
            .iter()
            .filter(|(_, value)| value.is_none())
            .map(|(key, _)| *key)
            .collect();

        match (&spotify.client_id, &spotify.client_secret, &spotify.redirect_uri) {
            (Some(client_id), Some(client_secret), Some(redirect_uri)) => {
                Ok(SpotifyApiCredentials {
                    client_id: client_id.clone(),
                    client_secret: client_secret.clone(),
                    redirect_uri: redirect_uri.clone(),
                    refresh_token: spotify.refresh_token.clone(),
                })
            }
            _ => Err(ConfigError::Missing {
                provider: "Spotify",
                keys: missing,
            }),
        }
    }

    /// Browser auth headers file, with a leading `~/` expanded.
    pub fn youtube_auth_file(&self) -> Result<PathBuf, ConfigError> {
        self.youtube
            .browser_auth_file
            .as_deref()
            .map(expand_path)
            .ok_or(ConfigError::Missing {
                provider: "YouTube",
                keys: vec!["browser_auth_file"],
            })
    }
}

/// Expand ~ to home directory
fn expand_path(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(path)
}
