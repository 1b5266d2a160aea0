//! Per-request cache outcome records.

use std::time::Duration;

use edge_core::RequestId;
use serde::{Deserialize, Serialize};

/// How the worker routed a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteKind {
    /// Ran through the cache decision engine.
    Engine,
    /// Another edge cache already handles this request.
    UpstreamEdgeCache,
    /// Image request, passed through.
    Image,
    /// Not an HTML GET, passed through.
    PassThrough,
}

impl std::fmt::Display for RouteKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Engine => write!(f, "engine"),
            Self::UpstreamEdgeCache => write!(f, "upstream_edge_cache"),
            Self::Image => write!(f, "image"),
            Self::PassThrough => write!(f, "pass_through"),
        }
    }
}

/// Outcome of a single handled request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheOutcome {
    /// Request ID for correlation.
    pub request_id: String,
    /// HTTP method.
    pub method: String,
    /// Request URL.
    pub url: String,
    /// Routing decision.
    pub route: RouteKind,
    /// Diagnostic status trail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_status: Option<String>,
    /// Cache version used for the lookup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    /// Whether the response came from the cache.
    pub hit: bool,
    /// HTTP status code returned.
    pub status_code: u16,
    /// Handling time (microseconds).
    pub elapsed_us: u64,
}

impl CacheOutcome {
    /// Start an outcome record for a request.
    pub fn new(
        request_id: &RequestId,
        method: impl Into<String>,
        url: impl Into<String>,
        route: RouteKind,
    ) -> Self {
        Self {
            request_id: request_id.to_string(),
            method: method.into(),
            url: url.into(),
            route,
            cache_status: None,
            version: None,
            hit: false,
            status_code: 0,
            elapsed_us: 0,
        }
    }

    /// Record the diagnostic status trail.
    pub fn with_cache_status(mut self, status: impl Into<String>) -> Self {
        self.cache_status = Some(status.into());
        self
    }

    /// Record the cache version.
    pub fn with_version(mut self, version: Option<i64>) -> Self {
        self.version = version;
        self
    }

    /// Record whether this was a cache hit.
    pub fn with_hit(mut self, hit: bool) -> Self {
        self.hit = hit;
        self
    }

    /// Record the response status.
    pub fn with_status_code(mut self, status: u16) -> Self {
        self.status_code = status;
        self
    }

    /// Record the handling time.
    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed_us = elapsed.as_micros() as u64;
        self
    }

    /// Format as JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.url.clone())
    }

    /// Emit the record as a single `info` event.
    pub fn emit(&self) {
        tracing::info!(
            request_id = %self.request_id,
            method = %self.method,
            url = %self.url,
            route = %self.route,
            cache_status = self.cache_status.as_deref().unwrap_or(""),
            version = self.version,
            hit = self.hit,
            status = self.status_code,
            elapsed_us = self.elapsed_us,
            "request handled"
        );
    }
}
