//! Origin directive protocol.
//!
//! The origin opts in by returning `x-HTML-Edge-Cache` with a comma-separated
//! list of commands:
//!
//! - `cache` - store this response
//! - `purgeall` - invalidate every stored entry
//! - `bypass-cookies=<p1>|<p2>|...` - cookie prefixes that skip the cache
//!
//! Unknown commands are ignored.

use edge_core::{header_joined, HeaderMap};
use serde::{Deserialize, Serialize};

use crate::headers::header_names;

const CMD_PURGE_ALL: &str = "purgeall";
const CMD_CACHE: &str = "cache";
const CMD_BYPASS_COOKIES: &str = "bypass-cookies";

/// Parsed origin directive.
///
/// `None` in an `Option<Directive>` means the origin did not send the header
/// at all, which is different from a header with no recognized commands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directive {
    /// Invalidate every stored entry.
    pub purge: bool,
    /// Store this response.
    pub cache: bool,
    /// Cookie prefixes that bypass the cache. Empty means bypass nothing.
    pub bypass_cookies: Vec<String>,
}

impl Directive {
    /// Parse an optional header value.
    pub fn parse(value: Option<&str>) -> Option<Self> {
        value.map(Self::parse_value)
    }

    /// Parse the directive carried by a header map.
    ///
    /// Repeated header lines are combined as one comma-separated list.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        if !headers.contains_key(header_names::EDGE_CACHE) {
            return None;
        }
        // A present header that is not visible ASCII still opts in.
        let value = header_joined(headers, header_names::EDGE_CACHE, ",").unwrap_or_default();
        Some(Self::parse_value(&value))
    }

    /// Parse a present header value.
    pub fn parse_value(value: &str) -> Self {
        let mut directive = Self::default();

        for command in value.split(',') {
            let command = command.trim();
            if command == CMD_PURGE_ALL {
                directive.purge = true;
            } else if command == CMD_CACHE {
                directive.cache = true;
            } else if let Some((name, prefixes)) = command.split_once('=') {
                if name.trim() == CMD_BYPASS_COOKIES {
                    directive.bypass_cookies.extend(
                        prefixes
                            .split('|')
                            .map(str::trim)
                            .filter(|p| !p.is_empty())
                            .map(String::from),
                    );
                }
            }
        }

        directive
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all_commands() {
        let directive = Directive::parse(Some("cache,purgeall,bypass-cookies=foo|bar")).unwrap();

        assert_eq!(
            directive,
            Directive {
                purge: true,
                cache: true,
                bypass_cookies: vec!["foo".to_string(), "bar".to_string()],
            }
        );
    }

    #[test]
    fn test_absent_header_is_none() {
        assert_eq!(Directive::parse(None), None);
        assert_eq!(Directive::from_headers(&HeaderMap::new()), None);
    }

    #[test]
    fn test_unknown_commands_yield_empty_directive() {
        assert_eq!(Directive::parse(Some("stale-while,whatever")), Some(Directive::default()));
        assert_eq!(Directive::parse(Some("")), Some(Directive::default()));
    }

    #[test]
    fn test_tokens_are_trimmed() {
        let directive = Directive::parse_value("  cache ,  bypass-cookies = wp- | | shop_  ");

        assert!(directive.cache);
        assert!(!directive.purge);
        assert_eq!(directive.bypass_cookies, vec!["wp-", "shop_"]);
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        let directive = Directive::parse_value("Cache,PURGEALL");
        assert_eq!(directive, Directive::default());
    }

    #[test]
    fn test_bypass_cookies_without_value_is_ignored() {
        let directive = Directive::parse_value("bypass-cookies");
        assert!(directive.bypass_cookies.is_empty());
    }

    #[test]
    fn test_explicit_empty_bypass_list() {
        let directive = Directive::parse_value("cache,bypass-cookies=");

        assert!(directive.cache);
        assert!(directive.bypass_cookies.is_empty());
    }

    #[test]
    fn test_repeated_bypass_cookies_accumulate() {
        let directive = Directive::parse_value("bypass-cookies=a|b,bypass-cookies=c");
        assert_eq!(directive.bypass_cookies, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_from_headers_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert("x-html-edge-cache", "purgeall".parse().unwrap());

        assert_eq!(
            Directive::from_headers(&headers),
            Some(Directive {
                purge: true,
                ..Default::default()
            })
        );
    }

    #[test]
    fn test_from_headers_combines_repeated_lines() {
        let mut headers = HeaderMap::new();
        headers.append("x-html-edge-cache", "cache".parse().unwrap());
        headers.append("x-html-edge-cache", "purgeall".parse().unwrap());
        headers.append("x-html-edge-cache", "bypass-cookies=sess_".parse().unwrap());

        assert_eq!(
            Directive::from_headers(&headers),
            Some(Directive {
                purge: true,
                cache: true,
                bypass_cookies: vec!["sess_".to_string()],
            })
        );
    }
}
