//! Core abstractions for the HTML edge cache.
//!
//! This crate provides the fundamental types and traits:
//! - `EdgeRequest` / `EdgeResponse` - Immutable-by-convention HTTP values
//! - `RequestId` - Request correlation identifier
//! - `OriginFetcher` - Transport to the origin server
//! - Header helpers for case-insensitive access to a `HeaderMap`

mod context;
mod headers;
mod response;
mod transport;

pub use context::*;
pub use headers::*;
pub use response::*;
pub use transport::*;

pub use bytes::Bytes;
pub use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
