//! Configuration management for the Spotify library backup.
//!
//! Configuration is read from environment variables, which may be provided by
//! `.env` files. The resulting [`Config`] value is handed explicitly to the
//! credential provider and the exporter; nothing reads the environment after
//! start-up.
//!
//! The configuration system follows a hierarchical approach:
//! 1. Environment variables (highest priority)
//! 2. `.env` file in the current working directory
//! 3. `.env` file in the local data directory
//! 4. Application defaults (where applicable)

use std::{env, path::PathBuf, time::Duration};

use thiserror::Error;

pub const DEFAULT_SCOPE: &str =
    "playlist-read-private playlist-read-collaborative user-library-read user-follow-read";
pub const DEFAULT_API_URL: &str = "https://api.spotify.com/v1";
pub const DEFAULT_AUTH_URL: &str = "https://accounts.spotify.com/authorize";
pub const DEFAULT_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub const DEFAULT_OUTPUT_DIR: &str = "done";
pub const DEFAULT_AUTH_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Loads environment variables from `.env` files.
///
/// Looks for a `.env` file in the working directory first and then in the
/// platform-specific local data directory under `spotify-backup/.env`.
/// Variables already present in the environment are never overridden, and a
/// missing file is not an error.
///
/// # Directory Structure
///
/// - Linux: `~/.local/share/spotify-backup/.env`
/// - macOS: `~/Library/Application Support/spotify-backup/.env`
/// - Windows: `%LOCALAPPDATA%/spotify-backup/.env`
///
/// # Errors
///
/// Returns an error string if the data directory cannot be created or an
/// existing `.env` file cannot be parsed.
pub async fn load_env() -> Result<(), String> {
    let path = data_dir().join(".env");
    if let Some(parent) = path.parent() {
        async_fs::create_dir_all(parent)
            .await
            .map_err(|e| e.to_string())?;
    }

    for candidate in [PathBuf::from(".env"), path] {
        if candidate.is_file() {
            dotenv::from_path(&candidate)
                .map_err(|e| format!("{}: {}", candidate.display(), e))?;
        }
    }
    Ok(())
}

/// Returns the application directory inside the local data directory.
pub fn data_dir() -> PathBuf {
    let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("spotify-backup");
    path
}

/// Runtime configuration of one backup run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Client id of the Spotify application. Required for every strategy.
    pub client_id: String,
    /// Client secret. Only needed to exchange codes or refresh tokens.
    pub client_secret: Option<String>,
    /// When present, selects the non-interactive credential strategy.
    pub refresh_token: Option<String>,
    /// Space-delimited scope, passed through verbatim.
    pub scope: String,
    pub api_url: String,
    pub auth_url: String,
    pub token_url: String,
    pub auth_timeout: Duration,
    pub output_dir: PathBuf,
    pub healthcheck_url: Option<String>,
}

impl Config {
    /// Builds the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// - `SPOTIFY_API_AUTH_CLIENT_ID` is missing
    /// - `SPOTIFY_API_REFRESH_TOKEN` is set without `SPOTIFY_API_AUTH_CLIENT_SECRET`
    /// - `SPOTIFY_AUTH_TIMEOUT_SECS` is not a number of seconds
    pub fn from_env() -> Result<Self, ConfigError> {
        let client_id = required("SPOTIFY_API_AUTH_CLIENT_ID")?;
        let client_secret = optional("SPOTIFY_API_AUTH_CLIENT_SECRET");
        let refresh_token = optional("SPOTIFY_API_REFRESH_TOKEN");

        if refresh_token.is_some() && client_secret.is_none() {
            return Err(ConfigError::Missing("SPOTIFY_API_AUTH_CLIENT_SECRET"));
        }

        let auth_timeout = match optional("SPOTIFY_AUTH_TIMEOUT_SECS") {
            Some(value) => value
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| ConfigError::Invalid {
                    name: "SPOTIFY_AUTH_TIMEOUT_SECS",
                    value,
                })?,
            None => Duration::from_secs(DEFAULT_AUTH_TIMEOUT_SECS),
        };

        Ok(Self {
            client_id,
            client_secret,
            refresh_token,
            scope: optional("SPOTIFY_API_AUTH_SCOPE").unwrap_or_else(|| DEFAULT_SCOPE.to_string()),
            api_url: optional("SPOTIFY_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            auth_url: optional("SPOTIFY_API_AUTH_URL")
                .unwrap_or_else(|| DEFAULT_AUTH_URL.to_string()),
            token_url: optional("SPOTIFY_API_TOKEN_URL")
                .unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string()),
            auth_timeout,
            output_dir: optional("BACKUP_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            healthcheck_url: optional("BACKUP_HEALTHCHECK_URL"),
        })
    }

    /// Configuration with the public Spotify endpoints and defaults.
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            refresh_token: None,
            scope: DEFAULT_SCOPE.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            auth_url: DEFAULT_AUTH_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            auth_timeout: Duration::from_secs(DEFAULT_AUTH_TIMEOUT_SECS),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            healthcheck_url: None,
        }
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    optional(name).ok_or(ConfigError::Missing(name))
}

// Empty values count as unset so a blank line in `.env` doesn't select a strategy.
fn optional(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
