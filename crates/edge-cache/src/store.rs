//! Shared response store.

use async_trait::async_trait;
use edge_core::EdgeResponse;

use crate::key::CacheKey;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Cache and counter store errors.
///
/// The engine never lets these fail a request; they end up in the status
/// trail and the logs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The backend could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The version counter holds something that is not a version.
    #[error("invalid counter value {value:?} for {key}")]
    InvalidCounter { key: String, value: String },
}

/// Key/value blob store for encoded responses.
#[async_trait]
pub trait ResponseStore: Send + Sync {
    /// Look up a stored response.
    async fn get(&self, key: &CacheKey) -> StoreResult<Option<EdgeResponse>>;

    /// Store a response, replacing any previous entry.
    async fn put(&self, key: &CacheKey, response: EdgeResponse) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_messages() {
        assert_eq!(
            StoreError::Unavailable("kv offline".to_string()).to_string(),
            "store unavailable: kv offline"
        );
        assert_eq!(
            StoreError::InvalidCounter {
                key: "html_cache_version".to_string(),
                value: "x".to_string()
            }
            .to_string(),
            r#"invalid counter value "x" for html_cache_version"#
        );
    }
}
