//! Case-insensitive header helpers.

use http::{HeaderMap, HeaderName, HeaderValue};

/// Error raised when a header name or value cannot be represented.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeaderError {
    #[error("invalid header name: {0:?}")]
    InvalidName(String),

    #[error("invalid value for header {name}: {value:?}")]
    InvalidValue { name: String, value: String },
}

/// Parse a header name, accepting any ASCII casing.
pub fn header_name(name: &str) -> Result<HeaderName, HeaderError> {
    HeaderName::from_bytes(name.as_bytes()).map_err(|_| HeaderError::InvalidName(name.to_string()))
}

/// Parse a header name/value pair.
pub fn header_pair(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), HeaderError> {
    let header = header_name(name)?;
    let value = HeaderValue::from_str(value).map_err(|_| HeaderError::InvalidValue {
        name: name.to_string(),
        value: value.to_string(),
    })?;
    Ok((header, value))
}

/// Get the first value of a header as a string.
///
/// Values that are not visible ASCII are treated as absent.
pub fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Get every value of a header joined with `separator`.
pub fn header_joined(headers: &HeaderMap, name: &str, separator: &str) -> Option<String> {
    let values: Vec<&str> = headers
        .get_all(name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();

    if values.is_empty() {
        None
    } else {
        Some(values.join(separator))
    }
}

/// Replace a header with a single value.
pub fn set_header(headers: &mut HeaderMap, name: &str, value: &str) -> Result<(), HeaderError> {
    let (name, value) = header_pair(name, value)?;
    headers.insert(name, value);
    Ok(())
}

/// Reduce a free-form string to something a header value can carry.
///
/// Control characters become spaces so diagnostic text never fails to encode.
pub fn sanitize_header_value(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_ascii_control() && c != '\t' { ' ' } else { c })
        .collect()
}
