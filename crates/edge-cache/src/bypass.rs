//! Cookie-based cache bypass.

use edge_core::EdgeRequest;

use crate::directive::Directive;

/// Decides whether a request's cookies force a cache skip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BypassPolicy {
    defaults: Vec<String>,
}

impl BypassPolicy {
    /// Create a policy with the default prefix list.
    pub fn new(defaults: Vec<String>) -> Self {
        Self { defaults }
    }

    /// The default prefixes.
    pub fn defaults(&self) -> &[String] {
        &self.defaults
    }

    /// The prefixes in force for a response.
    ///
    /// A present directive always wins, even with an empty list.
    pub fn prefixes_for<'a>(&'a self, directive: Option<&'a Directive>) -> &'a [String] {
        match directive {
            Some(directive) => &directive.bypass_cookies,
            None => &self.defaults,
        }
    }

    /// Whether the request must skip the cache.
    pub fn should_bypass(&self, request: &EdgeRequest, directive: Option<&Directive>) -> bool {
        let prefixes = self.prefixes_for(directive);
        request
            .cookies()
            .is_some_and(|cookies| matching_cookie(&cookies, prefixes).is_some())
    }
}

/// Find the first cookie that starts with one of `prefixes`.
///
/// The header is split on `;` and each `name=value` pair is trimmed before
/// the raw prefix test. Matching is case-sensitive.
pub fn matching_cookie<'a>(cookie_header: &'a str, prefixes: &[String]) -> Option<&'a str> {
    if prefixes.is_empty() {
        return None;
    }

    cookie_header
        .split(';')
        .map(str::trim)
        .find(|cookie| prefixes.iter().any(|prefix| cookie.starts_with(prefix.as_str())))
}
