//! Per-file ingestion errors.
//!
//! These are recovered locally by the loader (logged, file skipped) and only
//! surface as `AppError::Ingestion` when nothing at all could be ingested.

use std::path::PathBuf;
use thiserror::Error;
use unichat_core::AppError;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("document not found: {0:?}")]
    Missing(PathBuf),

    #[error("failed to read {path:?}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported document format: {0:?}")]
    UnsupportedFormat(PathBuf),

    #[error("no text could be extracted from {0:?}")]
    EmptyExtraction(PathBuf),

    #[error("failed to extract text from {path:?}: {message}")]
    Extraction { path: PathBuf, message: String },
}

impl IngestionError {
    pub(crate) fn extraction(path: &std::path::Path, message: impl std::fmt::Display) -> Self {
        Self::Extraction {
            path: path.to_path_buf(),
            message: message.to_string(),
        }
    }
}

impl From<IngestionError> for AppError {
    fn from(err: IngestionError) -> Self {
        AppError::Ingestion(err.to_string())
    }
}
