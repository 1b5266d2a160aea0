//! Request dispatch in front of the decision engine.

use std::sync::Arc;
use std::time::Instant;

use edge_core::{
    header_pair, EdgeRequest, EdgeResponse, FetchError, HeaderName, HeaderValue, OriginFetcher,
};
use edge_observability::{CacheOutcome, RouteKind};

use crate::config::ConfigError;
use crate::engine::DecisionEngine;
use crate::headers::header_names;

/// Entry point for every request reaching the edge.
///
/// HTML GETs go through the [`DecisionEngine`]; everything else, including
/// image requests and requests already handled by an edge cache in front of
/// this one, goes straight to the origin. Every response is tagged with the
/// configured liveness header.
#[derive(Debug, Clone)]
pub struct EdgeCacheWorker {
    engine: DecisionEngine,
    liveness: Option<(HeaderName, HeaderValue)>,
}

impl EdgeCacheWorker {
    pub fn new(engine: DecisionEngine) -> Result<Self, ConfigError> {
        let liveness = match engine.config().liveness() {
            Some(header) => Some(
                header_pair(&header.name, &header.value)
                    .map_err(|err| ConfigError::Invalid(format!("liveness_header: {}", err)))?,
            ),
            None => None,
        };

        Ok(Self { engine, liveness })
    }

    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    /// Decide which path a request takes.
    pub fn route(&self, request: &EdgeRequest) -> RouteKind {
        let config = self.engine.config();

        let upstream = request.header(header_names::EDGE_CACHE).is_some();
        if config.respect_upstream_edge_cache && upstream {
            RouteKind::UpstreamEdgeCache
        } else if config.skip_image_requests && request.accepts_images() {
            RouteKind::Image
        } else if request.is_get() && request.accepts_html() {
            RouteKind::Engine
        } else {
            RouteKind::PassThrough
        }
    }

    /// Handle one request.
    pub async fn handle(&self, request: EdgeRequest) -> Result<EdgeResponse, FetchError> {
        let started = Instant::now();
        let route = self.route(&request);
        let outcome = CacheOutcome::new(
            &request.request_id,
            request.method.as_str(),
            &request.url,
            route,
        );

        let (response, outcome) = match route {
            RouteKind::Engine => {
                let decision = self
                    .engine
                    .process(&request)
                    .await
                    .inspect_err(|err| log_fetch_error(&request, route, err))?;
                let outcome = outcome
                    .with_cache_status(decision.status.as_str())
                    .with_version(decision.version.map(|v| v.get()))
                    .with_hit(decision.hit);
                (decision.response, outcome)
            }
            RouteKind::UpstreamEdgeCache | RouteKind::Image | RouteKind::PassThrough => {
                let origin: &Arc<dyn OriginFetcher> = self.engine.origin();
                let response = origin
                    .fetch(request.clone())
                    .await
                    .inspect_err(|err| log_fetch_error(&request, route, err))?;
                (response, outcome)
            }
        };

        let response = self.tag(response);
        outcome
            .with_status_code(response.status.as_u16())
            .with_elapsed(started.elapsed())
            .emit();

        Ok(response)
    }

    fn tag(&self, response: EdgeResponse) -> EdgeResponse {
        match &self.liveness {
            Some((name, value)) => response.with_typed_header(name.clone(), value.clone()),
            None => response,
        }
    }
}

fn log_fetch_error(request: &EdgeRequest, route: RouteKind, err: &FetchError) {
    tracing::warn!(
        request_id = %request.request_id,
        url = %request.url,
        route = %route,
        error = %err,
        "origin fetch failed"
    );
}
