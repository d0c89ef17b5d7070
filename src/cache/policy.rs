//! The [`Cache`] wraps the persistent [`Store`] with policy and accounting.
//!
//! Policy: a construction-time default TTL (per-call TTLs override it) and
//! an optional capacity bound enforced by LRU eviction after every write.
//!
//! Failure posture: storage errors on the hot path (`get`/`set`) degrade to
//! a forced miss — the request still completes via upstream — and are
//! logged, never propagated. Administrative operations (`stats`, `clear`,
//! `export`, `import`) report errors to their caller.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{CacheError, Result};
use crate::store::{ImportReport, Store};

/// Construction-time cache policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct CachePolicy {
    /// Default TTL applied when `set` is called without one. `None`
    /// disables TTL expiry.
    pub default_ttl: Option<Duration>,
    /// Maximum entry count. `None` means unbounded.
    pub max_entries: Option<usize>,
}

/// Aggregate statistics for one cache instance.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    /// Lookups answered from the store.
    pub hit_count: u64,
    /// Lookups that fell through to upstream.
    pub miss_count: u64,
    /// `hits / (hits + misses)`, 0 when no requests yet.
    pub hit_rate: f64,
    /// Entries currently stored.
    pub entry_count: usize,
    /// Sum of cached payload sizes.
    pub total_size_bytes: u64,
    /// Size of the database file on disk.
    pub db_size_bytes: u64,
    /// Entry counts per model.
    pub by_model: BTreeMap<String, u64>,
}

/// Store + policy + accounting. Cheap to clone; clones share the store and
/// therefore the counters. Two caches with separate stores never share
/// counters.
#[derive(Clone)]
pub struct Cache {
    store: Store,
    policy: CachePolicy,
}

impl Cache {
    /// Build a cache over `store` with the given policy.
    ///
    /// `max_entries = 0` is rejected as a structural configuration error:
    /// eviction could never make room for a single entry.
    pub fn new(store: Store, policy: CachePolicy) -> Result<Self> {
        if policy.max_entries == Some(0) {
            return Err(CacheError::Capacity(
                "max_entries must be at least 1 (or unset for unbounded)".into(),
            ));
        }
        Ok(Self { store, policy })
    }

    /// Look up a cached value. Counts a hit or miss; expired and absent
    /// entries are misses. A storage failure is logged and degrades to a
    /// miss so the caller can still fetch upstream.
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        match self.store.get(key) {
            Ok(Some(entry)) => {
                self.record(true);
                Some(entry.value)
            }
            Ok(None) => {
                self.record(false);
                None
            }
            Err(e) => {
                warn!("cache read failed, treating as miss: {e}");
                self.record(false);
                None
            }
        }
    }

    /// Write a value through to the store, then enforce the capacity bound.
    /// Per-call `ttl` overrides the default. Storage failures are logged
    /// and swallowed — a failed write must not fail the request that
    /// produced the value.
    pub fn set(&self, key: &str, value: &serde_json::Value, model: &str, ttl: Option<Duration>) {
        let ttl = ttl.or(self.policy.default_ttl);
        if let Err(e) = self.store.set(key, value, model, ttl) {
            warn!("cache write failed, skipping: {e}");
            return;
        }
        if let Some(max) = self.policy.max_entries {
            if let Err(e) = self.store.evict_if_over_capacity(max) {
                warn!("capacity eviction failed: {e}");
            }
        }
    }

    /// Delete one entry.
    pub fn delete(&self, key: &str) -> Result<bool> {
        self.store.delete(key)
    }

    /// Remove entries, optionally only those older than the given age.
    pub fn clear(&self, older_than: Option<Duration>) -> Result<usize> {
        self.store.clear(older_than)
    }

    /// Physically remove expired rows.
    pub fn sweep_expired(&self) -> Result<usize> {
        self.store.sweep_expired()
    }

    /// Snapshot all entries to a file.
    pub fn export(&self, dest: &Path) -> Result<()> {
        self.store.export(dest)
    }

    /// Merge a snapshot file into the store (overwrite-wins).
    pub fn import(&self, src: &Path) -> Result<ImportReport> {
        self.store.import(src)
    }

    /// Current statistics, including the derived hit rate.
    pub fn stats(&self) -> Result<CacheStats> {
        let (hit_count, miss_count) = self.store.counters()?;
        let total = hit_count + miss_count;
        let hit_rate = if total > 0 {
            hit_count as f64 / total as f64
        } else {
            0.0
        };
        Ok(CacheStats {
            hit_count,
            miss_count,
            hit_rate,
            entry_count: self.store.entry_count()?,
            total_size_bytes: self.store.total_size_bytes()?,
            db_size_bytes: self.store.db_size_bytes(),
            by_model: self.store.by_model()?,
        })
    }

    fn record(&self, hit: bool) {
        let result = if hit {
            self.store.record_hit()
        } else {
            self.store.record_miss()
        };
        if let Err(e) = result {
            debug!("failed to persist {} counter: {e}", if hit { "hit" } else { "miss" });
        }
    }
}
