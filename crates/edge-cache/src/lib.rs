//! Versioned HTML edge cache.
//!
//! This crate provides:
//! - `DecisionEngine` - Hit/miss/bypass decisions, purge and background refresh
//! - `EdgeCacheWorker` - Request dispatch and liveness tagging in front of the engine
//! - `VersionStore` / `CacheKeyBuilder` - Version counter and versioned cache keys
//! - `Directive` / `BypassPolicy` - Origin directive protocol and cookie bypass
//! - `EntryCodec` - Header encoding for stored responses
//! - `ResponseStore` / `CounterStore` - Collaborator traits, with in-memory implementations
//! - `EdgeCacheConfig` - Configuration file
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use edge_cache::{
//!     DecisionEngine, EdgeCacheConfig, EdgeCacheWorker, MemoryCounterStore, MemoryOrigin,
//!     MemoryResponseStore,
//! };
//!
//! let engine = DecisionEngine::new(
//!     Arc::new(EdgeCacheConfig::default()),
//!     Arc::new(MemoryResponseStore::new()),
//!     Arc::new(MemoryOrigin::new()),
//! )?
//! .with_counter(Arc::new(MemoryCounterStore::new()));
//!
//! let worker = EdgeCacheWorker::new(engine)?;
//! let response = worker.handle(request).await?;
//! worker.engine().background().flush().await;
//! ```

mod background;
mod bypass;
mod codec;
mod config;
mod directive;
mod engine;
mod headers;
mod key;
mod memory;
mod store;
mod version;
mod worker;

pub use background::*;
pub use bypass::*;
pub use codec::*;
pub use config::*;
pub use directive::*;
pub use engine::*;
pub use headers::*;
pub use key::*;
pub use memory::*;
pub use store::*;
pub use version::*;
pub use worker::*;
