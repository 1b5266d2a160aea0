//! Cache version counter.
//!
//! Bumping the counter is the only invalidation mechanism: every lookup key
//! embeds the version, so a new version orphans every stored entry at once.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::store::StoreError;

/// Default counter key.
pub const DEFAULT_VERSION_KEY: &str = "html_cache_version";

/// A cache generation number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheVersion(i64);

impl CacheVersion {
    /// The first version, written on first read.
    pub const INITIAL: Self = Self(0);

    /// Sentinel used when no counter store is configured.
    pub const UNAVAILABLE: Self = Self(-1);

    /// Create a version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// The raw value.
    pub fn get(&self) -> i64 {
        self.0
    }

    /// Whether versioning is active.
    pub fn is_available(&self) -> bool {
        self.0 >= 0
    }

    /// The version after this one.
    pub fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for CacheVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Persistent single-integer store holding the cache version.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Read the raw counter value.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write the raw counter value.
    async fn put(&self, key: &str, value: String) -> Result<(), StoreError>;
}

/// Adapter exposing the counter as a [`CacheVersion`].
#[derive(Clone)]
pub struct VersionStore {
    counter: Option<Arc<dyn CounterStore>>,
    key: String,
}

impl VersionStore {
    /// Create a version store backed by a counter.
    pub fn new(counter: Arc<dyn CounterStore>, key: impl Into<String>) -> Self {
        Self {
            counter: Some(counter),
            key: key.into(),
        }
    }

    /// Create a version store with no counter behind it.
    ///
    /// Every read yields [`CacheVersion::UNAVAILABLE`] and bumps are no-ops.
    pub fn unconfigured(key: impl Into<String>) -> Self {
        Self {
            counter: None,
            key: key.into(),
        }
    }

    /// Whether a counter store is configured.
    pub fn is_configured(&self) -> bool {
        self.counter.is_some()
    }

    /// The counter key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Read the current version, initializing the counter to 0 if unset.
    pub async fn current_version(&self) -> Result<CacheVersion, StoreError> {
        let Some(counter) = &self.counter else {
            return Ok(CacheVersion::UNAVAILABLE);
        };

        match counter.get(&self.key).await? {
            Some(raw) => parse_version(&self.key, &raw),
            None => {
                counter
                    .put(&self.key, CacheVersion::INITIAL.to_string())
                    .await?;
                tracing::debug!(key = %self.key, "initialized cache version");
                Ok(CacheVersion::INITIAL)
            }
        }
    }

    /// Increment the version, invalidating every stored entry.
    ///
    /// Returns the new version, or `None` when no counter is configured.
    pub async fn bump_version(&self) -> Result<Option<CacheVersion>, StoreError> {
        let Some(counter) = &self.counter else {
            return Ok(None);
        };

        let next = self.current_version().await?.next();
        counter.put(&self.key, next.to_string()).await?;
        Ok(Some(next))
    }
}

impl fmt::Debug for VersionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersionStore")
            .field("key", &self.key)
            .field("configured", &self.is_configured())
            .finish()
    }
}

fn parse_version(key: &str, raw: &str) -> Result<CacheVersion, StoreError> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|v| *v >= 0)
        .map(CacheVersion::new)
        .ok_or_else(|| StoreError::InvalidCounter {
            key: key.to_string(),
            value: raw.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryCounterStore;

    fn store_with(counter: Arc<MemoryCounterStore>) -> VersionStore {
        VersionStore::new(counter, DEFAULT_VERSION_KEY)
    }

    #[test]
    fn test_cache_version_next() {
        assert_eq!(CacheVersion::INITIAL.next(), CacheVersion::new(1));
        assert_eq!(CacheVersion::new(i64::MAX).next(), CacheVersion::new(i64::MAX));
    }

    #[test]
    fn test_cache_version_availability() {
        assert!(CacheVersion::INITIAL.is_available());
        assert!(!CacheVersion::UNAVAILABLE.is_available());
        assert_eq!(CacheVersion::UNAVAILABLE.to_string(), "-1");
    }

    #[tokio::test]
    async fn test_first_read_initializes_counter() {
        let counter = Arc::new(MemoryCounterStore::new());
        let versions = store_with(counter.clone());

        assert_eq!(versions.current_version().await.unwrap(), CacheVersion::INITIAL);
        assert_eq!(counter.value(DEFAULT_VERSION_KEY).as_deref(), Some("0"));
        assert_eq!(counter.writes(), 1);

        // Second read does not write again
        versions.current_version().await.unwrap();
        assert_eq!(counter.writes(), 1);
    }

    #[tokio::test]
    async fn test_existing_value_is_parsed() {
        let counter = Arc::new(MemoryCounterStore::with_value(DEFAULT_VERSION_KEY, "7"));
        let versions = store_with(counter);

        assert_eq!(versions.current_version().await.unwrap(), CacheVersion::new(7));
    }

    #[tokio::test]
    async fn test_bump_increments_by_one() {
        let counter = Arc::new(MemoryCounterStore::with_value(DEFAULT_VERSION_KEY, "4"));
        let versions = store_with(counter.clone());

        let bumped = versions.bump_version().await.unwrap();

        assert_eq!(bumped, Some(CacheVersion::new(5)));
        assert_eq!(counter.value(DEFAULT_VERSION_KEY).as_deref(), Some("5"));
    }

    #[tokio::test]
    async fn test_bump_from_unset_counter() {
        let counter = Arc::new(MemoryCounterStore::new());
        let versions = store_with(counter.clone());

        assert_eq!(versions.bump_version().await.unwrap(), Some(CacheVersion::new(1)));
        assert_eq!(counter.value(DEFAULT_VERSION_KEY).as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_unconfigured_store() {
        let versions = VersionStore::unconfigured(DEFAULT_VERSION_KEY);

        assert!(!versions.is_configured());
        assert_eq!(versions.current_version().await.unwrap(), CacheVersion::UNAVAILABLE);
        assert_eq!(versions.bump_version().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_garbage_counter_value_is_an_error() {
        let counter = Arc::new(MemoryCounterStore::with_value(DEFAULT_VERSION_KEY, "banana"));
        let versions = store_with(counter);

        let err = versions.current_version().await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidCounter { .. }));
    }

    #[tokio::test]
    async fn test_counter_failure_propagates() {
        let counter = Arc::new(MemoryCounterStore::new());
        counter.set_failing(true);
        let versions = store_with(counter);

        assert!(versions.current_version().await.is_err());
        assert!(versions.bump_version().await.is_err());
    }
}
