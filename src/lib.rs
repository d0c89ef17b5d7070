//! llm-cache — a local caching proxy for LLM APIs.
//!
//! Sits between an application and a remote language-model API, storing
//! responses keyed by a deterministic fingerprint of the request and
//! replaying them on repeat requests.
//!
//! The crate is organized leaves-first:
//! - [`fingerprint`] turns a request's semantic payload into a stable key
//! - [`store`] is the durable SQLite-backed key→entry table
//! - [`cache`] layers TTL/LRU policy and hit/miss accounting on the store
//! - [`coalesce`] collapses concurrent identical misses into one fetch
//! - [`proxy`] is the axum request pipeline tying it all together

pub mod cache;
pub mod coalesce;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod proxy;
pub mod store;

pub use cache::{Cache, CachePolicy, CacheStats};
pub use config::Config;
pub use error::{CacheError, Result};
pub use store::Store;
