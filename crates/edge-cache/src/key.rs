//! Versioned cache key composition.

use serde::{Deserialize, Serialize};

use crate::version::CacheVersion;

/// Default query parameter carrying the cache version.
pub const DEFAULT_VERSION_PARAM: &str = "cf_edge_cache_ver";

/// A cache key uniquely identifying a stored response.
///
/// Only ever used against the cache store; it never reaches the client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    key: String,
    version: CacheVersion,
}

impl CacheKey {
    /// Get the key string.
    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// The version embedded in this key.
    pub fn version(&self) -> CacheVersion {
        self.version
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key)
    }
}

/// Builder for versioned lookup keys.
///
/// The key is the request URL with `<param>=<version>` appended, joined with
/// `&` when the URL already has a query string and `?` otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKeyBuilder {
    param: String,
}

impl CacheKeyBuilder {
    /// Create a key builder using the default version parameter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different query parameter name.
    pub fn with_param(mut self, param: impl Into<String>) -> Self {
        self.param = param.into();
        self
    }

    /// The query parameter name.
    pub fn param(&self) -> &str {
        &self.param
    }

    /// Build the key for a URL at a version.
    pub fn build(&self, url: &str, version: CacheVersion) -> CacheKey {
        let separator = if url.contains('?') { '&' } else { '?' };
        CacheKey {
            key: format!("{}{}{}={}", url, separator, self.param, version),
            version,
        }
    }
}

impl Default for CacheKeyBuilder {
    fn default() -> Self {
        Self {
            param: DEFAULT_VERSION_PARAM.to_string(),
        }
    }
}
