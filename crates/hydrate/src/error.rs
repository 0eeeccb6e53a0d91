//! Fetch and query failure types.

use hydrate_core::{HydrateCoreError, QueryKey};
use thiserror::Error;

/// Boxed error for caller-supplied fetch failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Why a single fetch invocation failed.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP error: {status} for {url}")]
    Http { status: u16, url: String },

    #[error("Request error: {0}")]
    Request(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Fetch timed out after {0}ms")]
    Timeout(u64),

    #[error("Fetch panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Other(#[from] BoxError),
}

impl FetchError {
    /// Failure with a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Request(e.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

impl From<HydrateCoreError> for FetchError {
    fn from(e: HydrateCoreError) -> Self {
        Self::Message(e.to_string())
    }
}

/// A query that did not make it into the snapshot because its fetch failed.
#[derive(Error, Debug)]
#[error("Failed to prefetch query {key}")]
pub struct QueryFailure {
    pub key: QueryKey,
    #[source]
    pub error: FetchError,
}

impl QueryFailure {
    pub fn new(key: QueryKey, error: FetchError) -> Self {
        Self { key, error }
    }

    /// Multi-line message with the key and the underlying error.
    pub fn detailed_message(&self) -> String {
        format!(
            "{self}\nQuery Key: {}\nOriginal Error: {}",
            self.key.hash(),
            self.error
        )
    }
}

pub type Result<T> = std::result::Result<T, FetchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_display() {
        let error = FetchError::Http {
            status: 503,
            url: "http://api/posts".to_string(),
        };
        assert_eq!(error.to_string(), "HTTP error: 503 for http://api/posts");
    }

    #[test]
    fn test_other_is_transparent() {
        let source: BoxError = "socket closed".into();
        let error = FetchError::from(source);
        assert_eq!(error.to_string(), "socket closed");
    }

    #[test]
    fn test_timeout_display() {
        assert_eq!(
            FetchError::Timeout(250).to_string(),
            "Fetch timed out after 250ms"
        );
    }

    #[test]
    fn test_detailed_message() {
        let failure = QueryFailure::new(QueryKey::new(["users"]).with(7), FetchError::msg("boom"));
        assert_eq!(
            failure.detailed_message(),
            "Failed to prefetch query [\"users\",7]\nQuery Key: [\"users\",7]\nOriginal Error: boom"
        );
    }
}
