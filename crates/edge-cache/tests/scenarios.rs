//! End-to-end request scenarios through the worker.

use std::sync::Arc;

use edge_cache::{
    CacheKeyBuilder, CacheVersion, DecisionEngine, EdgeCacheConfig, EdgeCacheWorker,
    MemoryCounterStore, MemoryOrigin, MemoryResponseStore, DEFAULT_VERSION_KEY,
};
use edge_core::{EdgeRequest, EdgeResponse, FetchError};

const PAGE: &str = "https://shop.example.com/page";

struct Edge {
    worker: EdgeCacheWorker,
    store: Arc<MemoryResponseStore>,
    counter: Arc<MemoryCounterStore>,
    origin: Arc<MemoryOrigin>,
}

impl Edge {
    fn new() -> Self {
        let store = Arc::new(MemoryResponseStore::new());
        let counter = Arc::new(MemoryCounterStore::new());
        let origin = Arc::new(MemoryOrigin::new());
        let config = Arc::new(EdgeCacheConfig::default());
        let engine = DecisionEngine::new(config, store.clone(), origin.clone())
            .unwrap()
            .with_counter(counter.clone());

        Self {
            worker: EdgeCacheWorker::new(engine).unwrap(),
            store,
            counter,
            origin,
        }
    }

    async fn get(&self, request: EdgeRequest) -> EdgeResponse {
        let response = self.worker.handle(request).await.unwrap();
        self.worker.engine().background().flush().await;
        response
    }

    fn version(&self) -> Option<String> {
        self.counter.value(DEFAULT_VERSION_KEY)
    }
}

fn html_get(url: &str) -> EdgeRequest {
    EdgeRequest::get(url).with_header("Accept", "text/html,application/xhtml+xml;q=0.9")
}

fn origin_page(body: &str, directive: Option<&str>) -> EdgeResponse {
    let response = EdgeResponse::ok(body.to_string())
        .with_header("Content-Type", "text/html; charset=utf-8")
        .with_header("Cache-Control", "max-age=0, no-store");
    match directive {
        Some(value) => response.with_header("x-HTML-Edge-Cache", value),
        None => response,
    }
}

fn status(response: &EdgeResponse) -> Option<&str> {
    response.header("x-HTML-Edge-Cache-Status")
}

#[tokio::test]
async fn test_first_request_is_cached() {
    let edge = Edge::new();
    edge.origin.set_response(PAGE, origin_page("v1", Some("cache")));

    let response = edge.get(html_get(PAGE)).await;

    assert_eq!(status(&response), Some("Miss, Cached"));
    assert_eq!(response.header("x-HTML-Edge-Cache-Version"), Some("0"));
    assert_eq!(response.header("CF-Cache-Status"), None);
    assert!(edge.store.contains("https://shop.example.com/page?cf_edge_cache_ver=0"));
    assert_eq!(response.header("cache-control"), Some("max-age=0, no-store"));
}

#[tokio::test]
async fn test_second_request_hits_and_refreshes() {
    let edge = Edge::new();
    edge.origin.set_response(PAGE, origin_page("v1", None));
    edge.get(html_get(PAGE)).await;

    edge.origin.set_response(PAGE, origin_page("v2", None));
    let response = edge.worker.handle(html_get(PAGE)).await.unwrap();

    assert_eq!(status(&response), Some("Hit, Refreshed"));
    assert_eq!(response.header("CF-Cache-Status"), Some("HIT"));
    assert_eq!(response.body, "v1");
    assert_eq!(response.header("cache-control"), Some("max-age=0, no-store"));

    let report = edge.worker.engine().background().flush().await;
    assert!(report.completed >= 1);
    assert_eq!(edge.origin.fetch_count(), 2);

    let next = edge.get(html_get(PAGE)).await;
    assert_eq!(next.body, "v2");
}

#[tokio::test]
async fn test_bypass_cookie_refetches() {
    let edge = Edge::new();
    edge.origin.set_response(PAGE, origin_page("public", None));
    edge.get(html_get(PAGE)).await;

    edge.origin.set_response(PAGE, origin_page("logged in", None));
    let response = edge
        .get(html_get(PAGE).with_header("Cookie", "wp-settings=1; session=abc"))
        .await;

    assert_eq!(status(&response), Some("Bypass Cookie"));
    assert_eq!(response.header("CF-Cache-Status"), None);
    assert_eq!(response.body, "logged in");
    assert_eq!(edge.origin.fetch_count(), 2);

    // The stored copy is untouched by the bypassed request
    let stored = edge
        .store
        .entry("https://shop.example.com/page?cf_edge_cache_ver=0")
        .unwrap();
    assert_eq!(stored.body, "public");
}

#[tokio::test]
async fn test_purge_increments_version_once() {
    let edge = Edge::new();
    edge.origin.set_response(PAGE, origin_page("v1", Some("cache")));
    edge.get(html_get(PAGE)).await;
    assert_eq!(edge.version().as_deref(), Some("0"));

    let save = "https://shop.example.com/wp-admin/post.php";
    edge.origin.set_response(save, origin_page("saved", Some("purgeall")));
    let response = edge.get(html_get(save)).await;

    assert!(status(&response).is_some_and(|s| s.contains("Purged")));
    assert_eq!(edge.version().as_deref(), Some("1"));
}

#[tokio::test]
async fn test_purge_orphans_old_entries() {
    let edge = Edge::new();
    edge.origin.set_response(PAGE, origin_page("v1", Some("cache")));
    edge.get(html_get(PAGE)).await;

    let purge = "https://shop.example.com/purge";
    edge.origin.set_response(purge, origin_page("ok", Some("purgeall")));
    edge.get(html_get(purge)).await;

    edge.origin.set_response(PAGE, origin_page("v2", Some("cache")));
    let response = edge.get(html_get(PAGE)).await;

    assert_eq!(status(&response), Some("Miss, Cached"));
    assert_eq!(response.header("x-HTML-Edge-Cache-Version"), Some("1"));
    assert_eq!(response.body, "v2");

    // Nothing is deleted; the old entry is just unreachable
    let old = CacheKeyBuilder::new().build(PAGE, CacheVersion::INITIAL);
    let new = CacheKeyBuilder::new().build(PAGE, CacheVersion::new(1));
    assert!(edge.store.contains(old.as_str()));
    assert!(edge.store.contains(new.as_str()));
}

#[tokio::test]
async fn test_store_outage_serves_origin() {
    let edge = Edge::new();
    edge.store.set_failing(true);
    edge.origin.set_response(PAGE, origin_page("fresh", Some("cache")));

    let response = edge.get(html_get(PAGE)).await;

    assert_eq!(response.body, "fresh");
    assert!(status(&response).is_some_and(|s| s.starts_with("Cache Read Exception: ")));
    assert_eq!(response.header("x-worker-status"), Some("Active"));
}

#[tokio::test]
async fn test_origin_failure_is_not_masked() {
    let edge = Edge::new();
    edge.origin.set_response(PAGE, origin_page("v1", Some("cache")));
    edge.get(html_get(PAGE)).await;

    edge.origin
        .set_failure(Some(FetchError::Connection("origin down".to_string())));
    let reload = html_get(PAGE).with_header("Cache-Control", "no-cache");
    let result = edge.worker.handle(reload).await;

    assert_eq!(result.unwrap_err(), FetchError::Connection("origin down".to_string()));
}

#[tokio::test]
async fn test_query_string_urls_get_distinct_keys() {
    let edge = Edge::new();
    let search = "https://shop.example.com/search?q=boots";
    edge.origin.set_response(search, origin_page("boots", None));

    edge.get(html_get(search)).await;

    assert_eq!(
        edge.store.keys(),
        vec!["https://shop.example.com/search?q=boots&cf_edge_cache_ver=0".to_string()]
    );
}

#[tokio::test]
async fn test_concurrent_misses_are_not_coalesced() {
    let edge = Edge::new();
    edge.origin.set_response(PAGE, origin_page("v1", Some("cache")));

    let requests = (0..4).map(|_| edge.worker.handle(html_get(PAGE)));
    let responses = futures::future::join_all(requests).await;
    edge.worker.engine().background().flush().await;

    for response in responses {
        assert_eq!(status(&response.unwrap()), Some("Miss, Cached"));
    }
    assert_eq!(edge.origin.fetch_count(), 4);
    assert_eq!(edge.store.len(), 1);
}
