//! Crate-wide error type.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CacheError>;

/// All failure modes of the cache engine and proxy pipeline.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Malformed input to fingerprinting. Surfaced to the caller
    /// immediately (HTTP 400), never retried.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Store I/O failure (disk full, corruption). The cache layer degrades
    /// to a forced miss instead of failing the request.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The upstream fetch itself failed. Propagated verbatim to the caller
    /// and to all coalesced waiters; never cached.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Structural configuration error (e.g. a capacity bound that can never
    /// admit an entry). Fatal at construction time.
    #[error("Capacity error: {0}")]
    Capacity(String),

    /// Invalid or unloadable configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem error outside the store proper (export/import paths).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for CacheError {
    fn from(e: rusqlite::Error) -> Self {
        CacheError::Storage(e.to_string())
    }
}
