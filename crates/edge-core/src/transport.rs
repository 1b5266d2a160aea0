//! Origin transport.

use async_trait::async_trait;

use crate::context::EdgeRequest;
use crate::response::EdgeResponse;

/// Error type for origin fetches.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Request error: {0}")]
    Request(String),
}

/// Transport to the origin server.
///
/// Retries, timeouts and connection reuse belong to the implementation;
/// callers issue exactly one fetch per call.
#[async_trait]
pub trait OriginFetcher: Send + Sync {
    /// Send a request to the origin and return its response.
    async fn fetch(&self, request: EdgeRequest) -> Result<EdgeResponse, FetchError>;
}

#[async_trait]
impl<T: OriginFetcher + ?Sized> OriginFetcher for std::sync::Arc<T> {
    async fn fetch(&self, request: EdgeRequest) -> Result<EdgeResponse, FetchError> {
        (**self).fetch(request).await
    }
}
