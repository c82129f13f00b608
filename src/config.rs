//! Configuration management for lofisync.
//!
//! This module handles loading configuration values from environment variables
//! and `.env` files into a typed [`Config`]. Every value is validated once at
//! startup so the sync loop never has to deal with missing or malformed
//! settings.
//!
//! The configuration system follows a hierarchical approach:
//! 1. Environment variables (highest priority)
//! 2. `.env` file in the local data directory
//! 3. Application defaults (where applicable)

use std::{env, net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use crate::{error::ConfigError, utils::NameTemplate};

pub const APP_DIR: &str = "lofisync";

/// Largest batch the playlist insert endpoint accepts.
pub const PROVIDER_MAX_CHUNK: usize = 100;

const DEFAULT_SERVER_ADDRESS: &str = "127.0.0.1:8888";
const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8888/callback";
const DEFAULT_SCOPE: &str = "playlist-read-private playlist-modify-public playlist-modify-private";
const DEFAULT_AUTH_URL: &str = "https://accounts.spotify.com/authorize";
const DEFAULT_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const DEFAULT_API_URL: &str = "https://api.spotify.com/v1";
const DEFAULT_NAME_TEMPLATE: &str = "Lofi Mix ({hours} hours)";

/// Where the refresh credential is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Keyring,
    File,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keyring" => Ok(StoreBackend::Keyring),
            "file" => Ok(StoreBackend::File),
            other => Err(format!("unknown backend '{other}', expected keyring or file")),
        }
    }
}

/// OAuth client registration and provider endpoints.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scope: String,
    pub auth_url: String,
    pub token_url: String,
    pub show_dialog: bool,
}

/// Bounded retry knobs shared by token acquisition and API calls.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub delay: Duration,
    pub max_rate_limit_wait: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_millis(5000),
            max_rate_limit_wait: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_addr: SocketAddr,
    pub oauth: OAuthConfig,
    pub api_url: String,
    pub source_playlist: String,
    pub destination_playlist: String,
    pub name_template: NameTemplate,
    pub interval: Duration,
    pub retry: RetryConfig,
    pub chunk_size: usize,
    pub auth_timeout: Duration,
    pub store: StoreBackend,
}

impl Config {
    /// Builds the configuration from the process environment.
    ///
    /// Call [`load_env`] first to merge the `.env` file from the data
    /// directory into the environment.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] naming the first variable that is missing
    /// or cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let chunk_size: usize = parsed("INSERT_CHUNK_SIZE", PROVIDER_MAX_CHUNK)?;
        if chunk_size == 0 {
            return Err(ConfigError::Invalid {
                key: "INSERT_CHUNK_SIZE",
                reason: "must be at least 1".to_string(),
            });
        }

        let max_attempts: u32 = parsed("MAX_RETRY_ATTEMPTS", 5)?;
        if max_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "MAX_RETRY_ATTEMPTS",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            server_addr: parsed_str("SERVER_ADDRESS", DEFAULT_SERVER_ADDRESS)?,
            oauth: OAuthConfig {
                client_id: required("SPOTIFY_API_AUTH_CLIENT_ID")?,
                client_secret: required("SPOTIFY_API_AUTH_CLIENT_SECRET")?,
                redirect_uri: optional("SPOTIFY_API_REDIRECT_URI", DEFAULT_REDIRECT_URI),
                scope: optional("SPOTIFY_API_AUTH_SCOPE", DEFAULT_SCOPE),
                auth_url: optional("SPOTIFY_API_AUTH_URL", DEFAULT_AUTH_URL),
                token_url: optional("SPOTIFY_API_TOKEN_URL", DEFAULT_TOKEN_URL),
                show_dialog: parsed("SPOTIFY_SHOW_DIALOG", false)?,
            },
            api_url: optional("SPOTIFY_API_URL", DEFAULT_API_URL)
                .trim_end_matches('/')
                .to_string(),
            source_playlist: required("SOURCE_PLAYLIST_ID")?,
            destination_playlist: required("DESTINATION_PLAYLIST_ID")?,
            name_template: parsed_str("PLAYLIST_NAME_TEMPLATE", DEFAULT_NAME_TEMPLATE)?,
            interval: Duration::from_secs(parsed("SYNC_INTERVAL_SECS", 7200)?),
            retry: RetryConfig {
                max_attempts,
                delay: Duration::from_millis(parsed("RETRY_DELAY_MS", 5000)?),
                max_rate_limit_wait: Duration::from_secs(parsed("MAX_RATE_LIMIT_WAIT_SECS", 120)?),
            },
            chunk_size: chunk_size.min(PROVIDER_MAX_CHUNK),
            auth_timeout: Duration::from_secs(parsed("AUTH_TIMEOUT_SECS", 300)?),
            store: parsed_str("CREDENTIAL_STORE", "keyring")?,
        })
    }
}

/// Loads environment variables from a `.env` file in the local data directory.
///
/// Creates the `lofisync` directory if it doesn't exist. A missing `.env`
/// file is fine; everything can come from the process environment.
///
/// The function looks for the `.env` file in:
/// - Linux: `~/.local/share/lofisync/.env`
/// - macOS: `~/Library/Application Support/lofisync/.env`
/// - Windows: `%LOCALAPPDATA%/lofisync/.env`
pub async fn load_env() -> Result<(), ConfigError> {
    let path = data_dir().join(".env");
    if let Some(parent) = path.parent() {
        async_fs::create_dir_all(parent)
            .await
            .map_err(|e| ConfigError::Io(e.to_string()))?;
    }

    if path.is_file() {
        dotenv::from_path(&path).map_err(|e| ConfigError::Invalid {
            key: "DOTENV",
            reason: e.to_string(),
        })?;
    }
    Ok(())
}

/// Platform data directory for everything lofisync writes.
pub fn data_dir() -> PathBuf {
    let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(APP_DIR);
    path
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    match env::var(key) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::Missing(key)),
    }
}

fn optional(key: &'static str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parsed<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(v) if !v.trim().is_empty() => v.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
        _ => Ok(default),
    }
}

fn parsed_str<T>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    optional(key, default)
        .parse()
        .map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        })
}
