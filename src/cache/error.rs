use thiserror::Error;

use super::store::CacheStoreError;

/// Failure inside the cache layer. Never surfaced to API callers.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Store(#[from] CacheStoreError),
    #[error("cached payload is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("version counter `{key}` holds `{value}`")]
    CorruptVersion { key: String, value: String },
}

impl CacheError {
    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            CacheError::Store(CacheStoreError::Unavailable(_)) => "unavailable",
            CacheError::Store(CacheStoreError::Rejected(_)) => "rejected",
            CacheError::Store(CacheStoreError::NotACounter { .. }) => "not_a_counter",
            CacheError::Serialization(_) => "serialization",
            CacheError::CorruptVersion { .. } => "corrupt_version",
        }
    }
}
