//! Observability infrastructure for the HTML edge cache.
//!
//! This crate provides:
//! - `LoggingConfig` / `init_logging` - `tracing` subscriber setup
//! - `CacheOutcome` - One structured record per handled request

mod logging;
mod outcome;

pub use logging::*;
pub use outcome::*;

// Re-export RequestId from edge-core for convenience
pub use edge_core::RequestId;
