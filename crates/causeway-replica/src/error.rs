//! Error types for catalog loading.

use std::path::PathBuf;

/// Result type for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Errors that can occur while reading the item catalog or seed ratings.
#[derive(thiserror::Error, Debug)]
pub enum CatalogError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("line {line}: {reason}")]
    InvalidRecord { line: u64, reason: String },
}

impl CatalogError {
    pub(crate) fn invalid(line: u64, reason: impl Into<String>) -> Self {
        Self::InvalidRecord {
            line,
            reason: reason.into(),
        }
    }
}
