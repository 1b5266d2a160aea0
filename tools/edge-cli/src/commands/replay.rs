//! Scenario replay against in-memory stores.
//!
//! A scenario file describes origin fixtures and an ordered list of requests:
//!
//! ```toml
//! base_url = "https://example.com"
//!
//! [[origin]]
//! path = "/page"
//! body = "<html>v1</html>"
//! headers = { "x-HTML-Edge-Cache" = "cache" }
//!
//! [[request]]
//! path = "/page"
//!
//! [[request]]
//! path = "/page"
//! cookie = "wp-settings=1"
//! origin = { body = "<html>v2</html>" }
//! ```
//!
//! Background tasks are flushed after every request, so refreshes and purges
//! are visible to the next one.

use std::collections::BTreeMap;
use std::fs;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context as _, Result};
use chrono::Utc;
use edge_cache::{
    header_names, DecisionEngine, EdgeCacheConfig, EdgeCacheWorker, MemoryCounterStore,
    MemoryOrigin, MemoryResponseStore,
};
use edge_core::{header_pair, EdgeRequest, EdgeResponse, FetchError, Method, StatusCode};
use serde::{Deserialize, Serialize};

use super::ReplayArgs;
use crate::context::Context;
use crate::output::{format_duration, trail_badge};

/// Run the replay command.
pub async fn run(args: ReplayArgs, ctx: &Context) -> Result<()> {
    let path = ctx.resolve_path(&args.scenario);
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read scenario {}", path.display()))?;
    let scenario: Scenario = toml::from_str(&content)
        .with_context(|| format!("Failed to parse scenario {}", path.display()))?;

    let spinner = ctx.output.spinner(&format!("Replaying {} request(s)", scenario.requests.len()));
    let result = replay(&scenario, ctx.config.clone(), args.fail_fast).await;
    spinner.finish_and_clear();
    let mut report = result?;
    report.scenario = path.display().to_string();

    if ctx.output.is_json() {
        ctx.output.json(&report);
        return Ok(());
    }

    ctx.output.header(&format!("Replay: {}", report.scenario));
    ctx.output
        .table_row(&["#", "request", "code", "ver", "cf", "trail"], &WIDTHS);
    for line in &report.requests {
        print_line(line, ctx);
    }

    ctx.output.info("");
    ctx.output
        .kv("cache version", report.final_version.as_deref().unwrap_or("(none)"));
    ctx.output.kv("stored entries", &report.stored_entries.len().to_string());
    for key in &report.stored_entries {
        ctx.output.list_item(key);
    }

    let failures = report.requests.iter().filter(|l| l.error.is_some()).count();
    if failures > 0 {
        ctx.output
            .warn(&format!("{} request(s) failed at the origin", failures));
    } else {
        ctx.output.success("Replay complete");
    }

    Ok(())
}

const WIDTHS: [usize; 6] = [3, 32, 4, 4, 4, 0];

fn print_line(line: &ReplayLine, ctx: &Context) {
    let index = line.index.to_string();
    let request = format!("{} {}", line.method, line.path);
    let code = line.status.map(|s| s.to_string()).unwrap_or_else(|| "ERR".to_string());
    let trail = match (&line.trail, &line.error) {
        (_, Some(error)) => error.clone(),
        (Some(trail), None) => trail_badge(trail),
        (None, None) => format!("({})", line.route),
    };

    ctx.output.table_row(
        &[
            index.as_str(),
            request.as_str(),
            code.as_str(),
            line.version.as_deref().unwrap_or("-"),
            line.cf_cache_status.as_deref().unwrap_or("-"),
            trail.as_str(),
        ],
        &WIDTHS,
    );
    ctx.output.debug(&format!(
        "#{} took {}, {} background task(s) joined",
        line.index,
        format_duration(Duration::from_micros(line.elapsed_us)),
        line.background_tasks
    ));
}

/// A replay scenario.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    /// Scheme and authority prepended to every path.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Attach a counter store. Without one, versioning is unavailable.
    #[serde(default = "default_true")]
    pub counter: bool,

    /// Raw counter value to start from.
    #[serde(default)]
    pub initial_version: Option<String>,

    /// Origin responses keyed by path.
    #[serde(default, rename = "origin")]
    pub origins: Vec<OriginFixture>,

    /// Requests, in order.
    #[serde(default, rename = "request")]
    pub requests: Vec<ScenarioRequest>,
}

fn default_base_url() -> String {
    "https://example.com".to_string()
}

fn default_true() -> bool {
    true
}

/// A canned origin response.
#[derive(Debug, Clone, Deserialize)]
pub struct OriginFixture {
    /// Path served. Defaults to the request path when inline in a request.
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default = "default_status")]
    pub status: u16,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_status() -> u16 {
    200
}

/// One request in a scenario.
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioRequest {
    pub path: String,
    #[serde(default = "default_method")]
    pub method: String,
    /// `Accept` header; empty to omit.
    #[serde(default = "default_accept")]
    pub accept: String,
    #[serde(default)]
    pub cookie: Option<String>,
    /// Send `Cache-Control: no-cache`.
    #[serde(default)]
    pub reload: bool,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Replace the origin response for this path before sending.
    #[serde(default)]
    pub origin: Option<OriginFixture>,
    /// Switch the response store in or out of failing mode.
    #[serde(default)]
    pub store_failing: Option<bool>,
    /// Make the origin refuse connections, or bring it back.
    #[serde(default)]
    pub origin_down: Option<bool>,
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_accept() -> String {
    "text/html,application/xhtml+xml".to_string()
}

/// Result of a replay.
#[derive(Debug, Serialize)]
pub struct ReplayReport {
    pub scenario: String,
    pub started_at: String,
    pub final_version: Option<String>,
    pub stored_entries: Vec<String>,
    pub requests: Vec<ReplayLine>,
}

/// Result of one replayed request.
#[derive(Debug, Serialize)]
pub struct ReplayLine {
    pub index: usize,
    pub method: String,
    pub path: String,
    pub route: String,
    pub status: Option<u16>,
    pub trail: Option<String>,
    pub version: Option<String>,
    pub cf_cache_status: Option<String>,
    pub error: Option<String>,
    pub background_tasks: usize,
    pub elapsed_us: u64,
}

/// Run a scenario through a worker backed by in-memory collaborators.
pub async fn replay(
    scenario: &Scenario,
    config: EdgeCacheConfig,
    fail_fast: bool,
) -> Result<ReplayReport> {
    let base = scenario.base_url.trim_end_matches('/');
    let version_key = config.version_key.clone();

    let store = Arc::new(MemoryResponseStore::new());
    let origin = Arc::new(MemoryOrigin::new());
    let counter = Arc::new(match &scenario.initial_version {
        Some(value) => MemoryCounterStore::with_value(version_key.clone(), value.clone()),
        None => MemoryCounterStore::new(),
    });

    for fixture in &scenario.origins {
        let Some(path) = &fixture.path else {
            bail!("Origin fixture without a path");
        };
        origin.set_response(format!("{}{}", base, path), build_response(fixture)?);
    }

    let mut engine = DecisionEngine::new(Arc::new(config), store.clone(), origin.clone())
        .context("Invalid cache configuration")?;
    if scenario.counter {
        engine = engine.with_counter(counter.clone());
    }
    let worker = EdgeCacheWorker::new(engine).context("Invalid cache configuration")?;

    let started_at = Utc::now().to_rfc3339();
    let mut lines = Vec::with_capacity(scenario.requests.len());

    for (index, step) in scenario.requests.iter().enumerate() {
        let url = format!("{}{}", base, step.path);

        if let Some(fixture) = &step.origin {
            let target = match &fixture.path {
                Some(path) => format!("{}{}", base, path),
                None => url.clone(),
            };
            origin.set_response(target, build_response(fixture)?);
        }
        if let Some(failing) = step.store_failing {
            store.set_failing(failing);
        }
        if let Some(down) = step.origin_down {
            let failure = down.then(|| FetchError::Connection("origin down".to_string()));
            origin.set_failure(failure);
        }

        let request = build_request(&url, step).with_context(|| format!("Request #{}", index + 1))?;
        let route = worker.route(&request).to_string();
        let method = request.method.to_string();

        let started = Instant::now();
        let result = worker.handle(request).await;
        let elapsed_us = started.elapsed().as_micros() as u64;
        let flushed = worker.engine().background().flush().await;

        let mut line = ReplayLine {
            index: index + 1,
            method,
            path: step.path.clone(),
            route,
            status: None,
            trail: None,
            version: None,
            cf_cache_status: None,
            error: None,
            background_tasks: flushed.completed + flushed.panicked,
            elapsed_us,
        };

        match result {
            Ok(response) => {
                line.status = Some(response.status.as_u16());
                let header = |name: &str| response.header(name).map(str::to_string);
                line.trail = header(header_names::EDGE_CACHE_STATUS);
                line.version = header(header_names::EDGE_CACHE_VERSION);
                line.cf_cache_status = header(header_names::CF_CACHE_STATUS);
            }
            Err(err) if fail_fast => {
                return Err(err)
                    .with_context(|| format!("Request #{} {} failed", index + 1, step.path));
            }
            Err(err) => line.error = Some(err.to_string()),
        }

        lines.push(line);
    }

    Ok(ReplayReport {
        scenario: String::new(),
        started_at,
        final_version: counter.value(&version_key),
        stored_entries: store.keys(),
        requests: lines,
    })
}

fn build_response(fixture: &OriginFixture) -> Result<EdgeResponse> {
    let status = StatusCode::from_u16(fixture.status)
        .with_context(|| format!("Invalid status code {}", fixture.status))?;
    let mut response = EdgeResponse::new(status).with_body(fixture.body.clone());

    for (name, value) in &fixture.headers {
        let (name, value) = header_pair(name, value)?;
        response = response.with_typed_header(name, value);
    }

    Ok(response)
}

fn build_request(url: &str, step: &ScenarioRequest) -> Result<EdgeRequest> {
    let method = Method::from_bytes(step.method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("Invalid method {}", step.method))?;
    let mut request = EdgeRequest::new(method, url);

    let mut headers: Vec<(&str, &str)> = Vec::new();
    if !step.accept.is_empty() {
        headers.push(("accept", step.accept.as_str()));
    }
    if let Some(cookie) = &step.cookie {
        headers.push(("cookie", cookie.as_str()));
    }
    if step.reload {
        headers.push(("cache-control", "no-cache"));
    }
    headers.extend(step.headers.iter().map(|(k, v)| (k.as_str(), v.as_str())));

    for (name, value) in headers {
        let (name, value) = header_pair(name, value)?;
        request.headers.insert(name, value);
    }

    Ok(request)
}
