use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// A single failed attempt at loading a page. Recovered by retrying.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("rate limited (HTTP 429)")]
    RateLimited { retry_after: Option<Duration> },
    #[error("malformed JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

impl FetchError {
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            FetchError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("couldn't load {url} after {attempts} attempts: {last}")]
    FetchExhausted {
        url: String,
        attempts: u32,
        #[source]
        last: FetchError,
    },
    #[error("unexpected response from {url}: {reason}")]
    UnexpectedResponse { url: String, reason: String },
    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("credential exchange failed: {0}")]
    CredentialExchangeFailed(String),
    #[error("authorization failed: {0}")]
    AuthorizationFailed(String),
}
