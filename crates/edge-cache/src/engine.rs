//! Cache decision engine.
//!
//! Per request the engine looks up the versioned key, serves a hit or
//! fetches from the origin, honors the origin's directive (purge, cache,
//! bypass list) and decorates the response with diagnostic headers. Store
//! writes, version bumps and stale-while-revalidate refreshes run on
//! [`BackgroundTasks`] and never delay the response.
//!
//! Store and counter failures degrade to a miss and show up in the status
//! trail. Origin failures propagate.

use std::fmt;
use std::sync::Arc;

use edge_core::{
    header_pair, sanitize_header_value, set_header, EdgeRequest, EdgeResponse, FetchError,
    HeaderName, HeaderValue, OriginFetcher, StatusCode,
};

use crate::background::BackgroundTasks;
use crate::bypass::BypassPolicy;
use crate::codec::EntryCodec;
use crate::config::{ConfigError, EdgeCacheConfig};
use crate::directive::Directive;
use crate::headers::{header_names, StatusTrail};
use crate::key::{CacheKey, CacheKeyBuilder};
use crate::store::ResponseStore;
use crate::version::{CacheVersion, CounterStore, VersionStore};

/// Result of processing one request.
#[derive(Debug, Clone)]
pub struct Decision {
    /// Response to return to the client.
    pub response: EdgeResponse,
    /// Diagnostic trail, also sent as `x-HTML-Edge-Cache-Status`.
    pub status: StatusTrail,
    /// Cache version resolved while handling the request.
    pub version: Option<CacheVersion>,
    /// Served from the store without an origin fetch.
    pub hit: bool,
}

/// Where the version stands for the current request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VersionState {
    Unresolved,
    Resolved(CacheVersion),
    Failed,
}

impl VersionState {
    fn resolved(self) -> Option<CacheVersion> {
        match self {
            Self::Resolved(version) => Some(version),
            Self::Unresolved | Self::Failed => None,
        }
    }
}

/// Mutable per-request bookkeeping.
struct RequestState {
    status: StatusTrail,
    version: VersionState,
    bypass: bool,
    candidate: Option<(EdgeResponse, Option<Directive>)>,
}

impl RequestState {
    fn new(status: StatusTrail, version: VersionState) -> Self {
        Self {
            status,
            version,
            bypass: false,
            candidate: None,
        }
    }
}

/// The cache decision engine.
///
/// Cheap to clone; clones share the store, origin, counter and task set.
#[derive(Clone)]
pub struct DecisionEngine {
    config: Arc<EdgeCacheConfig>,
    store: Arc<dyn ResponseStore>,
    origin: Arc<dyn OriginFetcher>,
    versions: VersionStore,
    keys: CacheKeyBuilder,
    bypass: BypassPolicy,
    codec: EntryCodec,
    advertise: (HeaderName, HeaderValue),
    background: BackgroundTasks,
}

impl DecisionEngine {
    /// Create an engine without a counter store.
    ///
    /// Until [`DecisionEngine::with_counter`] is called, versioning is
    /// unavailable: lookups use version `-1` and nothing is stored.
    pub fn new(
        config: Arc<EdgeCacheConfig>,
        store: Arc<dyn ResponseStore>,
        origin: Arc<dyn OriginFetcher>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let advertise = header_pair(header_names::EDGE_CACHE, &config.advertised_support)
            .map_err(|_| ConfigError::InvalidHeaderValue {
                field: "advertised_support",
                value: config.advertised_support.clone(),
            })?;

        Ok(Self {
            versions: VersionStore::unconfigured(config.version_key.clone()),
            keys: CacheKeyBuilder::new().with_param(config.version_param.clone()),
            bypass: BypassPolicy::new(config.default_bypass_prefixes.clone()),
            codec: EntryCodec::new(&config.storage_cache_control)?,
            advertise,
            background: BackgroundTasks::new(),
            config,
            store,
            origin,
        })
    }

    /// Attach the counter store holding the cache version.
    pub fn with_counter(mut self, counter: Arc<dyn CounterStore>) -> Self {
        self.versions = VersionStore::new(counter, self.config.version_key.clone());
        self
    }

    pub fn config(&self) -> &EdgeCacheConfig {
        &self.config
    }

    pub fn origin(&self) -> &Arc<dyn OriginFetcher> {
        &self.origin
    }

    pub fn versions(&self) -> &VersionStore {
        &self.versions
    }

    pub fn background(&self) -> &BackgroundTasks {
        &self.background
    }

    /// Decide how to answer a request.
    pub async fn process(&self, request: &EdgeRequest) -> Result<Decision, FetchError> {
        let mut state = self.lookup(request).await;

        let (response, hit) = match state.candidate.take() {
            Some((response, directive)) => {
                self.maybe_refresh(request, &response, directive.as_ref(), &mut state);
                (response, true)
            }
            None => (self.fetch_and_store(request, &mut state).await?, false),
        };

        Ok(self.finalize(request, response, state, hit))
    }

    // === Lookup ===

    async fn lookup(&self, request: &EdgeRequest) -> RequestState {
        if request.is_reload() {
            return RequestState::new(
                StatusTrail::new(StatusTrail::BYPASS_RELOAD),
                VersionState::Unresolved,
            );
        }
        if !(request.is_get() && request.accepts_html()) {
            return RequestState::new(StatusTrail::default(), VersionState::Unresolved);
        }

        let version = match self.versions.current_version().await {
            Ok(version) => version,
            Err(err) => {
                tracing::warn!(url = %request.url, error = %err, "cache version read failed");
                return RequestState::new(StatusTrail::read_exception(&err), VersionState::Failed);
            }
        };

        let key = self.keys.build(&request.url, version);
        let mut state = RequestState::new(StatusTrail::default(), VersionState::Resolved(version));

        match self.store.get(&key).await {
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "cache read failed");
                state.status = StatusTrail::read_exception(&err);
            }
            Ok(None) => {}
            Ok(Some(stored)) => {
                // The directive header is not renamed, so it survives storage.
                let directive = Directive::from_headers(&stored.headers);
                if self.bypass.should_bypass(request, directive.as_ref()) {
                    state.status = StatusTrail::new(StatusTrail::BYPASS_COOKIE);
                    state.bypass = true;
                } else {
                    state.status = StatusTrail::new(StatusTrail::HIT);
                    state.candidate = Some((self.codec.decode_from_storage(stored), directive));
                }
            }
        }

        state
    }

    // === Miss path ===

    async fn fetch_and_store(
        &self,
        request: &EdgeRequest,
        state: &mut RequestState,
    ) -> Result<EdgeResponse, FetchError> {
        let response = self.fetch_from_origin(request).await?;
        let directive = Directive::from_headers(&response.headers);

        state.bypass = state.bypass || self.bypass.should_bypass(request, directive.as_ref());
        let storable =
            wants_cache(directive.as_ref()) && is_cacheable(request, &response) && !state.bypass;

        // Resolve before scheduling a purge so the write uses the version the
        // request was looked up under.
        let store_version = if storable {
            self.version_for_store(request, &mut state.version).await
        } else {
            None
        };

        let purge = directive.as_ref().is_some_and(|d| d.purge);
        if purge && self.schedule_purge(request, &state.version) {
            state.status.push(StatusTrail::PURGED);
        }

        if let Some(version) = store_version {
            let key = self.keys.build(&request.url, version);
            self.schedule_write(key, &response);
            state.status.push(StatusTrail::CACHED);
        }

        Ok(response)
    }

    async fn fetch_from_origin(&self, request: &EdgeRequest) -> Result<EdgeResponse, FetchError> {
        let mut outgoing = request.clone();
        let (name, value) = &self.advertise;
        outgoing.headers.insert(name.clone(), value.clone());
        self.origin.fetch(outgoing).await
    }

    async fn version_for_store(
        &self,
        request: &EdgeRequest,
        state: &mut VersionState,
    ) -> Option<CacheVersion> {
        let version = match *state {
            VersionState::Resolved(version) => version,
            VersionState::Failed => return None,
            VersionState::Unresolved => match self.versions.current_version().await {
                Ok(version) => {
                    *state = VersionState::Resolved(version);
                    version
                }
                Err(err) => {
                    tracing::warn!(url = %request.url, error = %err, "cache version read failed");
                    *state = VersionState::Failed;
                    return None;
                }
            },
        };

        if !version.is_available() {
            tracing::debug!(url = %request.url, "versioning unavailable, not storing");
            return None;
        }
        Some(version)
    }

    fn schedule_purge(&self, request: &EdgeRequest, version: &VersionState) -> bool {
        if !self.versions.is_configured() {
            tracing::debug!(url = %request.url, "purge requested without a counter store");
            return false;
        }
        // The read exception already in the trail covers this request.
        if matches!(version, VersionState::Failed) {
            tracing::warn!(url = %request.url, "purge skipped, cache version unreadable");
            return false;
        }

        let engine = self.clone();
        self.background.spawn("purge", async move { engine.purge().await });
        true
    }

    fn schedule_write(&self, key: CacheKey, response: &EdgeResponse) {
        let stored = self.codec.encode_for_storage(response);
        let engine = self.clone();
        self.background.spawn("store", async move { engine.write(key, stored).await });
    }

    async fn purge(&self) {
        match self.versions.bump_version().await {
            Ok(Some(version)) => tracing::info!(version = %version, "cache purged"),
            Ok(None) => {}
            Err(err) => tracing::warn!(
                key = %self.versions.key(),
                error = %err,
                "cache version bump failed"
            ),
        }
    }

    async fn write(&self, key: CacheKey, stored: EdgeResponse) {
        match self.store.put(&key, stored).await {
            Ok(()) => tracing::debug!(key = %key, "response stored"),
            Err(err) => tracing::warn!(key = %key, error = %err, "cache write failed"),
        }
    }

    // === Hit path ===

    fn maybe_refresh(
        &self,
        request: &EdgeRequest,
        response: &EdgeResponse,
        directive: Option<&Directive>,
        state: &mut RequestState,
    ) {
        // An entry stored with an explicit directive is the origin's call.
        if directive.is_some() || state.bypass || !is_cacheable(request, response) {
            return;
        }
        let Some(version) = state.version.resolved() else {
            return;
        };

        state.status.push(StatusTrail::REFRESHED);
        tracing::debug!(url = %request.url, version = %version, "background refresh scheduled");

        let engine = self.clone();
        let request = request.clone();
        self.background
            .spawn("refresh", async move { engine.refresh(request, version).await });
    }

    async fn refresh(&self, request: EdgeRequest, version: CacheVersion) {
        let response = match self.fetch_from_origin(&request).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(url = %request.url, error = %err, "background refresh failed");
                return;
            }
        };

        let directive = Directive::from_headers(&response.headers);
        if directive.as_ref().is_some_and(|d| d.purge) && self.versions.is_configured() {
            self.purge().await;
        }

        let bypass = self.bypass.should_bypass(&request, directive.as_ref());
        if wants_cache(directive.as_ref())
            && is_cacheable(&request, &response)
            && !bypass
            && version.is_available()
        {
            let key = self.keys.build(&request.url, version);
            self.write(key, self.codec.encode_for_storage(&response)).await;
        }
    }

    // === Finalize ===

    fn finalize(
        &self,
        request: &EdgeRequest,
        mut response: EdgeResponse,
        state: RequestState,
        hit: bool,
    ) -> Decision {
        let version = state.version.resolved();

        if is_cacheable(request, &response) {
            let headers = &mut response.headers;
            let trail = sanitize_header_value(state.status.as_str());
            if let Err(err) = set_header(headers, header_names::EDGE_CACHE_STATUS, &trail) {
                tracing::warn!(error = %err, "dropping status header");
            }
            if let Some(version) = version {
                let version = version.to_string();
                if let Err(err) = set_header(headers, header_names::EDGE_CACHE_VERSION, &version) {
                    tracing::warn!(error = %err, "dropping version header");
                }
            }
            if hit {
                if let Err(err) = set_header(headers, header_names::CF_CACHE_STATUS, "HIT") {
                    tracing::warn!(error = %err, "dropping cache status header");
                }
            }
        }

        tracing::debug!(
            url = %request.url,
            status = %state.status,
            version = ?version.map(|v| v.get()),
            hit,
            "cache decision"
        );

        Decision {
            response,
            status: state.status,
            version,
            hit,
        }
    }
}

impl fmt::Debug for DecisionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecisionEngine")
            .field("versions", &self.versions)
            .field("keys", &self.keys)
            .field("bypass", &self.bypass)
            .field("pending", &self.background.pending())
            .finish()
    }
}

/// No directive, or a directive that says `cache`.
fn wants_cache(directive: Option<&Directive>) -> bool {
    match directive {
        Some(directive) => directive.cache,
        None => true,
    }
}

/// GET, 200 and an HTML-accepting request.
fn is_cacheable(request: &EdgeRequest, response: &EdgeResponse) -> bool {
    request.is_get() && response.status == StatusCode::OK && request.accepts_html()
}
