//! In-memory stores and origin for tests, replay and local runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use edge_core::{EdgeRequest, EdgeResponse, FetchError, OriginFetcher, StatusCode};

use crate::key::CacheKey;
use crate::store::{ResponseStore, StoreError, StoreResult};
use crate::version::CounterStore;

/// Response store backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryResponseStore {
    entries: RwLock<HashMap<String, EdgeResponse>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
    failing: AtomicBool,
}

impl MemoryResponseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail with [`StoreError::Unavailable`].
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Whether an entry exists under the exact key string.
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    /// Raw stored entry, as written by the engine.
    pub fn entry(&self, key: &str) -> Option<EdgeResponse> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of `get` calls.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of `put` calls.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check(&self) -> StoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store set to fail".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ResponseStore for MemoryResponseStore {
    async fn get(&self, key: &CacheKey) -> StoreResult<Option<EdgeResponse>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.entry(key.as_str()))
    }

    async fn put(&self, key: &CacheKey, response: EdgeResponse) -> StoreResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.as_str().to_string(), response);
        Ok(())
    }
}

/// Counter store backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    values: RwLock<HashMap<String, String>>,
    writes: AtomicUsize,
    failing: AtomicBool,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding one raw value.
    pub fn with_value(key: impl Into<String>, value: impl Into<String>) -> Self {
        let store = Self::new();
        store
            .values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value.into());
        store
    }

    /// Raw value under `key`.
    pub fn value(&self, key: &str) -> Option<String> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Number of `put` calls.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every operation fail with [`StoreError::Unavailable`].
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> StoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("counter store set to fail".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.check()?;
        Ok(self.value(key))
    }

    async fn put(&self, key: &str, value: String) -> StoreResult<()> {
        self.check()?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
        Ok(())
    }
}

/// Origin serving canned responses keyed by URL.
///
/// Unknown URLs get an empty 404.
#[derive(Debug, Default)]
pub struct MemoryOrigin {
    responses: RwLock<HashMap<String, EdgeResponse>>,
    requests: Mutex<Vec<EdgeRequest>>,
    failure: RwLock<Option<FetchError>>,
}

impl MemoryOrigin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a canned response.
    pub fn with_response(self, url: impl Into<String>, response: EdgeResponse) -> Self {
        self.set_response(url, response);
        self
    }

    /// Replace the canned response for a URL.
    pub fn set_response(&self, url: impl Into<String>, response: EdgeResponse) {
        self.responses
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.into(), response);
    }

    /// Fail every fetch with `error`, or stop failing with `None`.
    pub fn set_failure(&self, error: Option<FetchError>) {
        *self.failure.write().unwrap_or_else(PoisonError::into_inner) = error;
    }

    /// Number of fetches received.
    pub fn fetch_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Every request received, in order.
    pub fn requests(&self) -> Vec<EdgeRequest> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// The most recent request received.
    pub fn last_request(&self) -> Option<EdgeRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}

#[async_trait]
impl OriginFetcher for MemoryOrigin {
    async fn fetch(&self, request: EdgeRequest) -> Result<EdgeResponse, FetchError> {
        let url = request.url.clone();
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);

        if let Some(err) = self.failure.read().unwrap_or_else(PoisonError::into_inner).clone() {
            return Err(err);
        }

        let response = self
            .responses
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&url)
            .cloned();
        Ok(response.unwrap_or_else(|| EdgeResponse::new(StatusCode::NOT_FOUND)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::CacheKeyBuilder;
    use crate::version::CacheVersion;

    #[tokio::test]
    async fn test_response_store_put_get() {
        let store = MemoryResponseStore::new();
        let key = CacheKeyBuilder::new().build("https://example.com/", CacheVersion::INITIAL);

        assert!(store.get(&key).await.unwrap().is_none());
        store.put(&key, EdgeResponse::ok("hello")).await.unwrap();

        let stored = store.get(&key).await.unwrap().unwrap();
        assert_eq!(stored.body, "hello");
        assert!(store.contains("https://example.com/?cf_edge_cache_ver=0"));
        assert_eq!((store.reads(), store.writes()), (2, 1));
    }

    #[tokio::test]
    async fn test_response_store_failing() {
        let store = MemoryResponseStore::new();
        let key = CacheKeyBuilder::new().build("https://example.com/", CacheVersion::INITIAL);
        store.set_failing(true);

        assert!(matches!(store.get(&key).await, Err(StoreError::Unavailable(_))));
        assert!(store.put(&key, EdgeResponse::ok("x")).await.is_err());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_counter_store() {
        let counter = MemoryCounterStore::with_value("v", "3");

        assert_eq!(counter.get("v").await.unwrap().as_deref(), Some("3"));
        counter.put("v", "4".to_string()).await.unwrap();
        assert_eq!(counter.value("v").as_deref(), Some("4"));
        assert_eq!(counter.writes(), 1);
    }

    #[tokio::test]
    async fn test_origin_fixtures_and_fallback() {
        let origin =
            MemoryOrigin::new().with_response("https://example.com/", EdgeResponse::ok("home"));

        let home = origin.fetch(EdgeRequest::get("https://example.com/")).await.unwrap();
        let missing = origin.fetch(EdgeRequest::get("https://example.com/nope")).await.unwrap();

        assert_eq!(home.body, "home");
        assert_eq!(missing.status, StatusCode::NOT_FOUND);
        assert_eq!(origin.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_origin_failure() {
        let origin = MemoryOrigin::new();
        origin.set_failure(Some(FetchError::Connection("refused".to_string())));

        let err = origin.fetch(EdgeRequest::get("https://example.com/")).await.unwrap_err();
        assert_eq!(err, FetchError::Connection("refused".to_string()));
        assert_eq!(origin.fetch_count(), 1);
    }
}
