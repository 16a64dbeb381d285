//! Error types for Unichat.
//!
//! A single error enum covers every failure category of the service:
//! configuration, ingestion, embedding backends, generation and lifecycle.

use thiserror::Error;

/// Unified error type for Unichat.
///
/// All fallible operations return `Result<T, AppError>`.
/// Nothing panics; errors are represented and propagated.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors, including unavailable models
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Document ingestion errors (missing, unreadable or unsupported files)
    #[error("Ingestion error: {0}")]
    Ingestion(String),

    /// Embedding backend unreachable or rejecting the request
    #[error("Embedding backend error: {0}")]
    EmbeddingBackend(String),

    /// Language model call failed
    #[error("Generation error: {0}")]
    Generation(String),

    /// Operation invoked while the pipeline is not ready
    #[error("Pipeline not ready: {0}")]
    NotReady(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_converts() {
        let err: AppError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, AppError::Io(_)));
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn test_display_carries_category() {
        let err = AppError::EmbeddingBackend("connection refused".to_string());
        assert_eq!(
            err.to_string(),
            "Embedding backend error: connection refused"
        );
    }
}
