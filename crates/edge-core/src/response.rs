//! Response values.

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};

use crate::headers::{header_pair, header_str};

/// A response travelling between origin, cache store and client.
///
/// The body is a [`Bytes`] handle, so duplicating a response for the client
/// and for the store is an explicit `clone()` that shares the buffer instead
/// of draining a single-read stream.
#[derive(Debug, Clone)]
pub struct EdgeResponse {
    /// HTTP status.
    pub status: StatusCode,
    /// HTTP headers.
    pub headers: HeaderMap,
    /// Response body.
    pub body: Bytes,
}

impl EdgeResponse {
    /// Create an empty response with the given status.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Create a 200 response with a body.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::new(StatusCode::OK).with_body(body)
    }

    /// Add a header, replacing any previous value.
    ///
    /// Pairs that are not valid HTTP are dropped with a warning.
    pub fn with_header(self, name: &str, value: &str) -> Self {
        match header_pair(name, value) {
            Ok((name, value)) => self.with_typed_header(name, value),
            Err(err) => {
                tracing::warn!(error = %err, "dropping response header");
                self
            }
        }
    }

    /// Add an already validated header, replacing any previous value.
    pub fn with_typed_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set the response body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Get a header value by name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        header_str(&self.headers, name)
    }

    /// Whether the origin answered 200 OK.
    pub fn is_ok(&self) -> bool {
        self.status == StatusCode::OK
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_response() {
        let resp = EdgeResponse::ok("<html></html>");

        assert!(resp.is_ok());
        assert_eq!(resp.body, Bytes::from_static(b"<html></html>"));
    }

    #[test]
    fn test_with_header_builds_new_value() {
        let original = EdgeResponse::ok("body").with_header("Cache-Control", "max-age=60");
        let copy = original.clone().with_header("Cache-Control", "no-store");

        assert_eq!(original.header("cache-control"), Some("max-age=60"));
        assert_eq!(copy.header("cache-control"), Some("no-store"));
    }

    #[test]
    fn test_clone_shares_body() {
        let original = EdgeResponse::ok(vec![b'a'; 1024]);
        let copy = original.clone();

        assert_eq!(original.body.as_ptr(), copy.body.as_ptr());
    }

    #[test]
    fn test_not_ok() {
        let resp = EdgeResponse::new(StatusCode::NOT_FOUND);
        assert!(!resp.is_ok());
    }
}
