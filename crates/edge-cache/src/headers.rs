//! Protocol header names and the diagnostic status trail.

use std::fmt;

use http::header::{CACHE_CONTROL, EXPIRES, PRAGMA};
use http::HeaderName;

/// Header names used by the edge cache protocol.
pub mod header_names {
    /// Origin directive on responses; protocol advertisement on origin requests.
    pub const EDGE_CACHE: &str = "x-HTML-Edge-Cache";
    /// Diagnostic status trail sent to clients.
    pub const EDGE_CACHE_STATUS: &str = "x-HTML-Edge-Cache-Status";
    /// Cache version used for the lookup.
    pub const EDGE_CACHE_VERSION: &str = "x-HTML-Edge-Cache-Version";
    /// Prefix for origin freshness headers parked inside a stored entry.
    pub const EDGE_CACHE_HEADER_PREFIX: &str = "x-HTML-Edge-Cache-Header-";
    /// Cache hit marker.
    pub const CF_CACHE_STATUS: &str = "CF-Cache-Status";
}

/// Origin freshness headers paired with the names they are stored under.
pub(crate) fn preserved_headers() -> [(HeaderName, HeaderName); 3] {
    [
        (
            CACHE_CONTROL,
            HeaderName::from_static("x-html-edge-cache-header-cache-control"),
        ),
        (
            EXPIRES,
            HeaderName::from_static("x-html-edge-cache-header-expires"),
        ),
        (
            PRAGMA,
            HeaderName::from_static("x-html-edge-cache-header-pragma"),
        ),
    ]
}

/// Append-only, human-readable record of what happened to a request.
///
/// Diagnostic only; nothing parses it back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusTrail(String);

impl StatusTrail {
    pub const MISS: &'static str = "Miss";
    pub const HIT: &'static str = "Hit";
    pub const BYPASS_RELOAD: &'static str = "Bypass for Reload";
    pub const BYPASS_COOKIE: &'static str = "Bypass Cookie";
    pub const PURGED: &'static str = ", Purged";
    pub const CACHED: &'static str = ", Cached";
    pub const REFRESHED: &'static str = ", Refreshed";

    /// Start a trail.
    pub fn new(initial: impl Into<String>) -> Self {
        Self(initial.into())
    }

    /// Trail for a failed cache read.
    pub fn read_exception(message: impl fmt::Display) -> Self {
        Self(format!("Cache Read Exception: {}", message))
    }

    /// Append a fragment such as [`StatusTrail::CACHED`].
    pub fn push(&mut self, fragment: &str) {
        self.0.push_str(fragment);
    }

    /// Get the trail.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether a fragment appears anywhere in the trail.
    pub fn contains(&self, fragment: &str) -> bool {
        self.0.contains(fragment)
    }
}

impl Default for StatusTrail {
    fn default() -> Self {
        Self::new(Self::MISS)
    }
}

impl fmt::Display for StatusTrail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
