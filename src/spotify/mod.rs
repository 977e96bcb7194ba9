//! # Spotify Integration Module
//!
//! This module talks to the Spotify Web API and the Spotify accounts service.
//!
//! ## Core Pieces
//!
//! - [`auth`] - Credential provider: implicit-grant login through the local
//!   callback listener, refresh-token exchange, and the one-time
//!   authorization-code flow that produces a refresh token.
//! - [`SpotifyClient`] - Paginated fetch engine. Performs authenticated GETs,
//!   follows the `next` cursor of paging envelopes until it is exhausted and
//!   retries failed requests a bounded number of times.
//!
//! ## Retry Policy
//!
//! Every page request is attempted up to [`RetryPolicy::attempts`] times with a
//! fixed [`RetryPolicy::backoff`] between attempts (a `Retry-After` header on a
//! 429 response takes precedence). When the budget is consumed the request
//! fails with [`ApiError::FetchExhausted`]; callers treat that as fatal since a
//! partial export is worse than none.
//!
//! ## Execution Model
//!
//! Requests are issued strictly one after another. A traversal fetches page
//! `n + 1` only after page `n` was appended to the result set.

pub mod auth;
mod error;

use std::time::Duration;

use indicatif::ProgressBar;
use reqwest::{Client, StatusCode, Url, header::RETRY_AFTER};
use serde_json::Value;
use tokio::time::sleep;

pub use error::{ApiError, FetchError};

use crate::{
    info,
    types::{Credential, Page, UserProfile},
    warning,
};

const MAX_ERROR_BODY: usize = 512;
const MAX_RETRY_AFTER_SECS: u64 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_secs(2),
        }
    }
}

/// Receives traversal progress. Purely informational.
pub trait ProgressSink: Send + Sync {
    fn page_loaded(&self, loaded: usize, total: Option<u64>);
}

/// Discards progress reports.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn page_loaded(&self, _loaded: usize, _total: Option<u64>) {}
}

impl ProgressSink for ProgressBar {
    fn page_loaded(&self, loaded: usize, total: Option<u64>) {
        match total {
            Some(total) => self.set_message(format!("Loaded {}/{} items", loaded, total)),
            None => self.set_message(format!("Loaded {} items", loaded)),
        }
    }
}

/// Authenticated Web API client for a single run.
pub struct SpotifyClient {
    http: Client,
    credential: Credential,
    api_base: String,
    retry: RetryPolicy,
}

impl SpotifyClient {
    pub fn new(credential: Credential, api_url: &str) -> Result<Self, ApiError> {
        let api_base = api_url.trim_end_matches('/').to_string();
        Url::parse(&api_base).map_err(|e| ApiError::InvalidUrl {
            url: api_url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            http: Client::new(),
            credential,
            api_base,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Qualifies `resource` against the API base and appends `query`.
    ///
    /// Absolute URLs (such as the `next` cursor of a page) are used verbatim
    /// but must point below the API base, since the bearer token is attached
    /// to every request. Query parameters are added after any query string
    /// already present.
    pub fn resource_url(&self, resource: &str, query: &[(&str, &str)]) -> Result<Url, ApiError> {
        let raw = if resource.starts_with("https://") || resource.starts_with("http://") {
            if !self.is_api_url(resource) {
                return Err(ApiError::InvalidUrl {
                    url: resource.to_string(),
                    reason: format!("not below the API base {}", self.api_base),
                });
            }
            resource.to_string()
        } else {
            format!("{}/{}", self.api_base, resource.trim_start_matches('/'))
        };

        let mut url = Url::parse(&raw).map_err(|e| ApiError::InvalidUrl {
            url: raw.clone(),
            reason: e.to_string(),
        })?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// Loads a single JSON document, retrying failed attempts.
    pub async fn fetch(&self, resource: &str, query: &[(&str, &str)]) -> Result<Value, ApiError> {
        let url = self.resource_url(resource, query)?;
        let attempts = self.retry.attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.get_once(&url).await {
                Ok(json) => return Ok(json),
                Err(err) => {
                    warning!("Couldn't load URL: {} ({})", url, err);
                    if attempt >= attempts {
                        return Err(ApiError::FetchExhausted {
                            url: url.to_string(),
                            attempts,
                            last: err,
                        });
                    }

                    sleep(err.retry_after().unwrap_or(self.retry.backoff)).await;
                    info!("Trying again...");
                }
            }
        }
    }

    /// Walks a top-level paging envelope (`{items, next, total}`) to the end.
    pub async fn fetch_all(
        &self,
        seed: &str,
        query: &[(&str, &str)],
        progress: &dyn ProgressSink,
    ) -> Result<Vec<Value>, ApiError> {
        self.traverse(seed, query, None, progress).await
    }

    /// Like [`fetch_all`](Self::fetch_all) for responses that wrap the paging
    /// envelope in a single field, e.g. `{"artists": {items, next, total}}`.
    pub async fn fetch_all_nested(
        &self,
        seed: &str,
        query: &[(&str, &str)],
        field: &str,
        progress: &dyn ProgressSink,
    ) -> Result<Vec<Value>, ApiError> {
        self.traverse(seed, query, Some(field), progress).await
    }

    pub async fn current_user(&self) -> Result<UserProfile, ApiError> {
        let json = self.fetch("me", &[]).await?;
        serde_json::from_value(json).map_err(|e| ApiError::UnexpectedResponse {
            url: format!("{}/me", self.api_base),
            reason: e.to_string(),
        })
    }

    async fn traverse(
        &self,
        seed: &str,
        query: &[(&str, &str)],
        field: Option<&str>,
        progress: &dyn ProgressSink,
    ) -> Result<Vec<Value>, ApiError> {
        let first = self.fetch(seed, query).await?;
        let mut page = parse_page(first, field, seed)?;
        let mut items = std::mem::take(&mut page.items);

        while let Some(next) = page.next.take().filter(|n| !n.is_empty()) {
            let response = self.fetch(&next, &[]).await?;
            page = parse_page(response, field, &next)?;
            items.append(&mut page.items);
            progress.page_loaded(items.len(), page.total);
        }

        Ok(items)
    }

    fn is_api_url(&self, url: &str) -> bool {
        url.strip_prefix(self.api_base.as_str())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/') || rest.starts_with('?'))
    }

    async fn get_once(&self, url: &Url) -> Result<Value, FetchError> {
        let response = self
            .http
            .get(url.clone())
            .bearer_auth(self.credential.token())
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|secs| *secs <= MAX_RETRY_AFTER_SECS)
                .map(Duration::from_secs);
            return Err(FetchError::RateLimited { retry_after });
        }

        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let cut = (0..=MAX_ERROR_BODY)
                    .rev()
                    .find(|i| body.is_char_boundary(*i))
                    .unwrap_or(0);
                body.truncate(cut);
            }
            return Err(FetchError::Status { status, body });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

fn parse_page(response: Value, field: Option<&str>, url: &str) -> Result<Page, ApiError> {
    let envelope = match (field, response) {
        (None, response) => response,
        (Some(field), Value::Object(mut map)) if map.contains_key(field) => map
            .remove(field)
            .unwrap_or(Value::Null),
        (Some(field), _) => {
            return Err(ApiError::UnexpectedResponse {
                url: url.to_string(),
                reason: format!("missing `{}` envelope", field),
            });
        }
    };

    serde_json::from_value(envelope).map_err(|e| ApiError::UnexpectedResponse {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn client() -> SpotifyClient {
        SpotifyClient::new(Credential::new("token"), "https://api.spotify.com/v1/").unwrap()
    }

    #[test]
    fn relative_resource_is_joined_to_base() {
        let url = client().resource_url("me/tracks", &[("limit", "50")]).unwrap();
        assert_eq!(url.as_str(), "https://api.spotify.com/v1/me/tracks?limit=50");
    }

    #[test]
    fn leading_slash_is_ignored() {
        let url = client().resource_url("/me", &[]).unwrap();
        assert_eq!(url.as_str(), "https://api.spotify.com/v1/me");
    }

    #[test]
    fn absolute_url_is_used_verbatim() {
        let next = "https://api.spotify.com/v1/me/tracks?offset=50&limit=50";
        let url = client().resource_url(next, &[]).unwrap();
        assert_eq!(url.as_str(), next);
    }

    #[test]
    fn absolute_url_outside_api_base_is_rejected() {
        for url in [
            "https://evil.example.com/v1/me/tracks",
            "https://api.spotify.com/v10/me",
            "http://api.spotify.com/v1/me",
        ] {
            let err = client().resource_url(url, &[]).unwrap_err();
            assert!(matches!(err, ApiError::InvalidUrl { .. }), "{}", url);
        }
    }

    #[test]
    fn query_is_appended_to_existing_query() {
        let url = client()
            .resource_url("me/following?type=artist", &[("limit", "50")])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.spotify.com/v1/me/following?type=artist&limit=50"
        );
    }

    #[test]
    fn parse_page_unwraps_nested_envelope() {
        let response = json!({"artists": {"items": [1, 2], "next": null, "total": 2}});
        let page = parse_page(response, Some("artists"), "me/following").unwrap();
        assert_eq!(page.items, vec![json!(1), json!(2)]);
        assert!(page.next.is_none());
        assert_eq!(page.total, Some(2));
    }

    #[test]
    fn parse_page_rejects_missing_items() {
        let err = parse_page(json!({"next": null}), None, "me/albums").unwrap_err();
        assert!(matches!(err, ApiError::UnexpectedResponse { .. }));
    }

    #[test]
    fn parse_page_rejects_missing_envelope() {
        let err = parse_page(json!({"items": []}), Some("artists"), "me/following").unwrap_err();
        assert!(err.to_string().contains("artists"));
    }
}
