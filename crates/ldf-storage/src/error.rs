//! Categorized storage errors, so callers can decide whether to retry.

use thiserror::Error;

/// A storage failure, categorized the way every storage method's failure
/// contract requires: not-found, transient (worth retrying), or permanent.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("transient storage failure: {0}")]
    Transient(String),
    #[error("permanent storage failure: {0}")]
    Permanent(String),
}

impl StorageError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageError::Transient(_))
    }
}

pub type StorageResult<T> = Result<T, StorageError>;
