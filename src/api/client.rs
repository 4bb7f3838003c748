//! HTTP client for the directory API
//!
//! Issues the raw search and detail calls and classifies every response
//! into a [`CallOutcome`]. A 403 is ambiguous upstream: it covers both bad
//! credentials and spent quota, distinguished only by the error body's
//! reason/message wording.

use crate::api::types::{ApiErrorBody, ChannelDetail, SearchPage};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Classified outcome of one raw API call
#[derive(Debug)]
pub enum CallOutcome<T> {
    /// 2xx with a parseable body
    Success(T),

    /// Credential rejected; permanent for this run
    AuthError,

    /// Credential out of quota until its window resets
    QuotaExceeded,

    /// Network failure or 5xx; worth retrying with backoff
    Transient(String),

    /// The requested entity does not exist
    NotFound,
}

/// Builds the HTTP client used for all directory calls
pub fn build_http_client(timeout_secs: u64) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(concat!("creator-atlas/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Thin wrapper over the directory API endpoints
pub struct DirectoryClient {
    http: Client,
    base_url: String,
}

impl DirectoryClient {
    /// Creates a client for the given API base URL
    pub fn new(http: Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fetches one page of channel search results
    ///
    /// # Arguments
    ///
    /// * `token` - Credential token to bill the call to
    /// * `query` - Free-text search query (e.g. "Mumbai beauty")
    /// * `limit` - Maximum items for this page
    /// * `page` - Continuation token from the previous page, if any
    /// * `published_after` - Only return channels created after this instant
    pub async fn search_page(
        &self,
        token: &str,
        query: &str,
        limit: u32,
        page: Option<&str>,
        published_after: Option<&str>,
    ) -> CallOutcome<SearchPage> {
        let mut request = self
            .http
            .get(format!("{}/search", self.base_url))
            .query(&[("key", token), ("query", query)])
            .query(&[("limit", limit)]);

        if let Some(page) = page {
            request = request.query(&[("page", page)]);
        }
        if let Some(after) = published_after {
            request = request.query(&[("published_after", after)]);
        }

        self.classify(request.send().await).await
    }

    /// Fetches full detail for one channel
    pub async fn channel_detail(&self, token: &str, channel_id: &str) -> CallOutcome<ChannelDetail> {
        let request = self
            .http
            .get(format!("{}/channels/{}", self.base_url, channel_id))
            .query(&[("key", token)]);

        self.classify(request.send().await).await
    }

    /// Classifies a raw response into a CallOutcome
    async fn classify<T: DeserializeOwned>(
        &self,
        result: Result<reqwest::Response, reqwest::Error>,
    ) -> CallOutcome<T> {
        let response = match result {
            Ok(r) => r,
            // Timeouts, refused connections, and TLS failures are all
            // retryable from the caller's point of view
            Err(e) => return CallOutcome::Transient(e.to_string()),
        };

        let status = response.status();

        if status.is_success() {
            return match response.json::<T>().await {
                Ok(body) => CallOutcome::Success(body),
                Err(e) => CallOutcome::Transient(format!("Malformed response body: {}", e)),
            };
        }

        match status {
            StatusCode::UNAUTHORIZED => CallOutcome::AuthError,
            StatusCode::FORBIDDEN => {
                let body: ApiErrorBody = response.json().await.unwrap_or_default();
                if is_quota_error(&body) {
                    CallOutcome::QuotaExceeded
                } else {
                    CallOutcome::AuthError
                }
            }
            StatusCode::TOO_MANY_REQUESTS => CallOutcome::QuotaExceeded,
            StatusCode::NOT_FOUND => CallOutcome::NotFound,
            s if s.is_server_error() => CallOutcome::Transient(format!("HTTP {}", s.as_u16())),
            s => CallOutcome::Transient(format!("Unexpected HTTP {}", s.as_u16())),
        }
    }
}

/// True if a 403 body indicates quota exhaustion rather than a bad credential
fn is_quota_error(body: &ApiErrorBody) -> bool {
    let reason = body.error.reason.to_lowercase();
    let message = body.error.message.to_lowercase();
    reason.contains("quota")
        || reason.contains("limit")
        || message.contains("quota")
        || message.contains("limit exceeded")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::ApiErrorDetail;

    fn body(reason: &str, message: &str) -> ApiErrorBody {
        ApiErrorBody {
            error: ApiErrorDetail {
                reason: reason.to_string(),
                message: message.to_string(),
            },
        }
    }

    #[test]
    fn test_quota_reason_detected() {
        assert!(is_quota_error(&body("quotaExceeded", "")));
        assert!(is_quota_error(&body("dailyLimitExceeded", "")));
        assert!(is_quota_error(&body("", "Quota exceeded for this project")));
    }

    #[test]
    fn test_auth_reason_not_quota() {
        assert!(!is_quota_error(&body("forbidden", "API key not valid")));
        assert!(!is_quota_error(&ApiErrorBody::default()));
    }

    #[test]
    fn test_build_http_client() {
        assert!(build_http_client(30).is_ok());
    }
}
