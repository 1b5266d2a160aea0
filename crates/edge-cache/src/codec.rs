//! Storage encoding for cached responses.
//!
//! A stored entry carries the store's own freshness header, so the origin's
//! `Cache-Control`, `Expires` and `Pragma` are parked under
//! `x-HTML-Edge-Cache-Header-<Name>` and put back on the way out.

use edge_core::{EdgeResponse, HeaderMap, HeaderValue};
use http::header::{CACHE_CONTROL, SET_COOKIE};

use crate::config::ConfigError;
use crate::headers::{header_names, preserved_headers};

/// Default freshness header written on stored entries (10 years).
pub const DEFAULT_STORAGE_CACHE_CONTROL: &str = "public; max-age=315360000";

/// Encodes responses for the store and decodes them for delivery.
#[derive(Debug, Clone)]
pub struct EntryCodec {
    storage_cache_control: HeaderValue,
}

impl EntryCodec {
    /// Create a codec writing the given `Cache-Control` on stored entries.
    pub fn new(storage_cache_control: &str) -> Result<Self, ConfigError> {
        let storage_cache_control = HeaderValue::from_str(storage_cache_control)
            .map_err(|_| ConfigError::InvalidHeaderValue {
                field: "storage_cache_control",
                value: storage_cache_control.to_string(),
            })?;
        Ok(Self {
            storage_cache_control,
        })
    }

    /// Build the copy that goes into the store.
    ///
    /// The body handle is duplicated; the caller's response is untouched and
    /// can still be sent to the client.
    pub fn encode_for_storage(&self, response: &EdgeResponse) -> EdgeResponse {
        let mut headers = response.headers.clone();

        for (original, stored) in preserved_headers() {
            for value in take_all(&mut headers, &original) {
                headers.append(stored.clone(), value);
            }
        }

        headers.remove(SET_COOKIE);
        headers.insert(CACHE_CONTROL, self.storage_cache_control.clone());

        EdgeResponse {
            status: response.status,
            headers,
            body: response.body.clone(),
        }
    }

    /// Turn a stored entry back into a deliverable response.
    pub fn decode_from_storage(&self, stored: EdgeResponse) -> EdgeResponse {
        let EdgeResponse {
            status,
            mut headers,
            body,
        } = stored;

        headers.remove(CACHE_CONTROL);
        headers.remove(header_names::EDGE_CACHE_STATUS);

        for (original, stored) in preserved_headers() {
            let values = take_all(&mut headers, &stored);
            if values.is_empty() {
                continue;
            }
            headers.remove(&original);
            for value in values {
                headers.append(original.clone(), value);
            }
        }

        EdgeResponse {
            status,
            headers,
            body,
        }
    }
}

impl Default for EntryCodec {
    fn default() -> Self {
        Self {
            storage_cache_control: HeaderValue::from_static(DEFAULT_STORAGE_CACHE_CONTROL),
        }
    }
}

/// Remove a header and return every non-empty value it had.
fn take_all(headers: &mut HeaderMap, name: &http::HeaderName) -> Vec<HeaderValue> {
    let values: Vec<HeaderValue> = headers
        .get_all(name)
        .iter()
        .filter(|v| !v.is_empty())
        .cloned()
        .collect();
    headers.remove(name);
    values
}
