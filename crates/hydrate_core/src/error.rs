//! Core hydration error types (pure - no I/O variants).

use thiserror::Error;

/// Core hydration errors (pure - no I/O variants).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HydrateCoreError {
    #[error("Invalid query key: {0}")]
    InvalidQueryKey(String),

    #[error("Snapshot serialization failed: {0}")]
    Serialization(String),

    #[error("Unknown render mode: {0}")]
    InvalidMode(String),
}

pub type Result<T> = std::result::Result<T, HydrateCoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_query_key_display() {
        let error = HydrateCoreError::InvalidQueryKey("null".to_string());
        assert_eq!(error.to_string(), "Invalid query key: null");
    }

    #[test]
    fn test_serialization_display() {
        let error = HydrateCoreError::Serialization("key must be a string".to_string());
        assert_eq!(
            error.to_string(),
            "Snapshot serialization failed: key must be a string"
        );
    }

    #[test]
    fn test_invalid_mode_display() {
        let error = HydrateCoreError::InvalidMode("spa".to_string());
        assert_eq!(error.to_string(), "Unknown render mode: spa");
    }
}
