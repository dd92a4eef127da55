//! Clients for the external search-results and keyword-database APIs.
//!
//! Both clients return [`ApiError`] instead of silently degrading, so the
//! pipeline can tell an exhausted quota apart from an empty result.

pub mod semrush;
pub mod serpapi;

pub use semrush::{KeywordClient, KeywordSettings};
pub use serpapi::{SearchClient, SearchSettings};

use crate::models::FetchFailure;
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// Maximum length of a response body quoted in an error message.
const MAX_ERROR_BODY: usize = 200;

/// Errors returned by the API clients.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("API quota exhausted: {0}")]
    QuotaExhausted(String),
    #[error("API returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("API error: {0}")]
    Api(String),
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl From<csv::Error> for ApiError {
    fn from(err: csv::Error) -> Self {
        ApiError::Decode(err.to_string())
    }
}

impl ApiError {
    /// Whether the API reported an exhausted quota or credit balance.
    pub fn is_quota_exhausted(&self) -> bool {
        matches!(self, ApiError::QuotaExhausted(_))
    }

    /// Maps the error onto the failure kind recorded in reports.
    pub fn failure_kind(&self) -> FetchFailure {
        match self {
            ApiError::Transport(_) => FetchFailure::TransportError,
            ApiError::QuotaExhausted(_) => FetchFailure::QuotaExhausted,
            ApiError::Status { .. } | ApiError::Api(_) | ApiError::Decode(_) => FetchFailure::Api,
        }
    }
}

/// Build the shared HTTP client used by an API client.
pub(crate) fn build_http_client(timeout_seconds: u64) -> Result<reqwest::Client, ApiError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .user_agent(concat!("kwresearch/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(ApiError::from)
}

/// Read the response body, mapping error statuses to [`ApiError`].
pub(crate) async fn read_success_body(response: reqwest::Response) -> Result<String, ApiError> {
    let status = response.status();
    let body = response.text().await?;

    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(ApiError::QuotaExhausted(truncate_body(&body)));
    }

    if !status.is_success() {
        return Err(ApiError::Status {
            status: status.as_u16(),
            body: truncate_body(&body),
        });
    }

    Ok(body)
}

pub(crate) fn truncate_body(body: &str) -> String {
    let body = body.trim();
    if body.chars().count() <= MAX_ERROR_BODY {
        body.to_string()
    } else {
        let cut: String = body.chars().take(MAX_ERROR_BODY).collect();
        format!("{}...", cut)
    }
}
