//! SQLite-backed persistent store for cached responses.
//!
//! One logical table, surviving process restarts:
//! `cache(key PRIMARY KEY, value, model, created_at, last_accessed_at,
//! expires_at NULLABLE, hit_count, size_bytes)`, plus a two-row `stats`
//! table persisting the hit/miss counters. Timestamps are unix seconds
//! stored as REAL.
//!
//! Expiry is lazy: `get` treats a row with `expires_at <= now` as absent
//! (and deletes it), so a stale value is never returned even if the
//! physical sweep has not run yet.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{CacheError, Result};

/// A cached response entry, as persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Content-addressable cache key (hex SHA-256).
    pub key: String,
    /// The cached response payload.
    pub value: Value,
    /// Model that produced the response.
    pub model: String,
    /// Unix timestamp when the entry was created.
    pub created_at: f64,
    /// Unix timestamp when the entry was last read.
    pub last_accessed_at: f64,
    /// Unix timestamp after which the entry is treated as absent.
    /// `None` means the entry never expires via TTL.
    pub expires_at: Option<f64>,
    /// Number of cache hits for this entry.
    pub hit_count: u64,
    /// Size of the serialized payload in bytes.
    pub size_bytes: u64,
}

/// Outcome of [`Store::import`]: keys merged in, split by conflict handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportReport {
    /// Entries whose key was not present before.
    pub added: usize,
    /// Entries that replaced an existing key (overwrite-wins).
    pub overwritten: usize,
}

/// Export file envelope. Self-contained snapshot of the cache table.
#[derive(Debug, Serialize, Deserialize)]
struct ExportSnapshot {
    version: u32,
    entries: Vec<CacheEntry>,
}

const EXPORT_VERSION: u32 = 1;

/// Durable key→entry storage. Cheap to clone; clones share the connection.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl Store {
    /// Open (or create) the store at `path`, creating parent directories
    /// and the schema as needed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path.to_path_buf()),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Open an in-memory store. Used by tests and ephemeral runs.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS cache (
                key              TEXT PRIMARY KEY,
                value            TEXT NOT NULL,
                model            TEXT NOT NULL,
                created_at       REAL NOT NULL,
                last_accessed_at REAL NOT NULL,
                expires_at       REAL,
                hit_count        INTEGER NOT NULL DEFAULT 0,
                size_bytes       INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_cache_expires_at ON cache(expires_at);
            CREATE INDEX IF NOT EXISTS idx_cache_last_accessed_at ON cache(last_accessed_at);
            CREATE TABLE IF NOT EXISTS stats (
                key   TEXT PRIMARY KEY,
                value INTEGER NOT NULL DEFAULT 0
            );
            INSERT OR IGNORE INTO stats (key, value) VALUES ('hits', 0);
            INSERT OR IGNORE INTO stats (key, value) VALUES ('misses', 0);",
        )?;
        Ok(())
    }

    fn lock_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CacheError::Storage("store mutex poisoned".into()))
    }

    /// Look up an entry. Expired rows are deleted and reported absent.
    /// On hit, bumps `last_accessed_at` and `hit_count`.
    pub fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let now = now_ts();
        let conn = self.lock_conn()?;

        let row: Option<(String, String, f64, f64, Option<f64>, u64, u64)> = conn
            .query_row(
                "SELECT value, model, created_at, last_accessed_at, expires_at,
                        hit_count, size_bytes
                 FROM cache WHERE key = ?1",
                params![key],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                    ))
                },
            )
            .optional()?;

        let Some((value_json, model, created_at, _, expires_at, hit_count, size_bytes)) = row
        else {
            return Ok(None);
        };

        if let Some(expires) = expires_at {
            if expires <= now {
                debug!(key = %&key[..8.min(key.len())], "entry expired, removing");
                conn.execute("DELETE FROM cache WHERE key = ?1", params![key])?;
                return Ok(None);
            }
        }

        conn.execute(
            "UPDATE cache SET last_accessed_at = ?1, hit_count = hit_count + 1
             WHERE key = ?2",
            params![now, key],
        )?;

        let value = serde_json::from_str(&value_json)
            .map_err(|e| CacheError::Storage(format!("corrupt cached value: {e}")))?;

        Ok(Some(CacheEntry {
            key: key.to_string(),
            value,
            model,
            created_at,
            last_accessed_at: now,
            expires_at,
            hit_count: hit_count + 1,
            size_bytes,
        }))
    }

    /// Upsert an entry. `expires_at = now + ttl` when a TTL is given,
    /// otherwise the entry never expires via TTL (still subject to LRU).
    pub fn set(&self, key: &str, value: &Value, model: &str, ttl: Option<Duration>) -> Result<()> {
        let now = now_ts();
        let expires_at = ttl.map(|t| now + t.as_secs_f64());
        let value_json = value.to_string();
        let size_bytes = value_json.len() as u64;

        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO cache
             (key, value, model, created_at, last_accessed_at, expires_at, hit_count, size_bytes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7)",
            params![key, value_json, model, now, now, expires_at, size_bytes],
        )?;
        Ok(())
    }

    /// Delete an entry. Returns `true` if it existed.
    pub fn delete(&self, key: &str) -> Result<bool> {
        let conn = self.lock_conn()?;
        let removed = conn.execute("DELETE FROM cache WHERE key = ?1", params![key])?;
        Ok(removed > 0)
    }

    /// Remove entries. With `older_than`, only entries created before
    /// `now - older_than` are removed; otherwise everything is removed and
    /// the persisted hit/miss counters reset. Returns the count removed.
    pub fn clear(&self, older_than: Option<Duration>) -> Result<usize> {
        let conn = self.lock_conn()?;
        let removed = match older_than {
            Some(age) => {
                let cutoff = now_ts() - age.as_secs_f64();
                conn.execute("DELETE FROM cache WHERE created_at < ?1", params![cutoff])?
            }
            None => {
                let n = conn.execute("DELETE FROM cache", [])?;
                conn.execute("UPDATE stats SET value = 0", [])?;
                n
            }
        };
        Ok(removed)
    }

    /// Physically remove expired rows. Lazy expiry in `get` makes this
    /// optional for correctness; it reclaims space.
    pub fn sweep_expired(&self) -> Result<usize> {
        let conn = self.lock_conn()?;
        let removed = conn.execute(
            "DELETE FROM cache WHERE expires_at IS NOT NULL AND expires_at <= ?1",
            params![now_ts()],
        )?;
        Ok(removed)
    }

    /// Evict least-recently-accessed entries until `entry_count <= max`.
    /// Ties on `last_accessed_at` evict the oldest `created_at` first.
    /// Returns the count evicted.
    pub fn evict_if_over_capacity(&self, max_entries: usize) -> Result<usize> {
        let conn = self.lock_conn()?;
        let count: usize =
            conn.query_row("SELECT COUNT(*) FROM cache", [], |row| row.get(0))?;
        if count <= max_entries {
            return Ok(0);
        }
        let excess = count - max_entries;
        let evicted = conn.execute(
            "DELETE FROM cache WHERE key IN (
                SELECT key FROM cache
                ORDER BY last_accessed_at ASC, created_at ASC
                LIMIT ?1
            )",
            params![excess],
        )?;
        debug!(evicted, "evicted LRU entries over capacity");
        Ok(evicted)
    }

    // ── accounting ──────────────────────────────────────────────────────────

    /// Increment the persisted hit counter.
    pub fn record_hit(&self) -> Result<()> {
        self.bump_counter("hits")
    }

    /// Increment the persisted miss counter.
    pub fn record_miss(&self) -> Result<()> {
        self.bump_counter("misses")
    }

    fn bump_counter(&self, name: &str) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "UPDATE stats SET value = value + 1 WHERE key = ?1",
            params![name],
        )?;
        Ok(())
    }

    /// Persisted `(hits, misses)` counters.
    pub fn counters(&self) -> Result<(u64, u64)> {
        let conn = self.lock_conn()?;
        let hits = conn.query_row(
            "SELECT value FROM stats WHERE key = 'hits'",
            [],
            |row| row.get(0),
        )?;
        let misses = conn.query_row(
            "SELECT value FROM stats WHERE key = 'misses'",
            [],
            |row| row.get(0),
        )?;
        Ok((hits, misses))
    }

    /// Number of entries currently stored (including not-yet-swept expired
    /// rows).
    pub fn entry_count(&self) -> Result<usize> {
        let conn = self.lock_conn()?;
        let n = conn.query_row("SELECT COUNT(*) FROM cache", [], |row| row.get(0))?;
        Ok(n)
    }

    /// Sum of serialized payload sizes across all entries.
    pub fn total_size_bytes(&self) -> Result<u64> {
        let conn = self.lock_conn()?;
        let n = conn.query_row(
            "SELECT COALESCE(SUM(size_bytes), 0) FROM cache",
            [],
            |row| row.get(0),
        )?;
        Ok(n)
    }

    /// Entry counts grouped by model.
    pub fn by_model(&self) -> Result<BTreeMap<String, u64>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare("SELECT model, COUNT(*) FROM cache GROUP BY model")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<BTreeMap<_, _>, _>>()?;
        Ok(rows)
    }

    /// Size of the database file on disk, or 0 for in-memory stores.
    pub fn db_size_bytes(&self) -> u64 {
        self.path
            .as_ref()
            .and_then(|p| std::fs::metadata(p).ok())
            .map(|m| m.len())
            .unwrap_or(0)
    }

    // ── export / import ─────────────────────────────────────────────────────

    /// Write a self-contained snapshot of all entries to `dest`.
    pub fn export(&self, dest: &Path) -> Result<()> {
        let entries = {
            let conn = self.lock_conn()?;
            let mut stmt = conn.prepare(
                "SELECT key, value, model, created_at, last_accessed_at, expires_at,
                        hit_count, size_bytes
                 FROM cache ORDER BY key",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, f64>(4)?,
                    row.get::<_, Option<f64>>(5)?,
                    row.get::<_, u64>(6)?,
                    row.get::<_, u64>(7)?,
                ))
            })?;
            let mut entries = Vec::new();
            for row in rows {
                let (key, value_json, model, created_at, last_accessed_at, expires_at, hit_count, size_bytes) =
                    row?;
                let value = serde_json::from_str(&value_json)
                    .map_err(|e| CacheError::Storage(format!("corrupt cached value: {e}")))?;
                entries.push(CacheEntry {
                    key,
                    value,
                    model,
                    created_at,
                    last_accessed_at,
                    expires_at,
                    hit_count,
                    size_bytes,
                });
            }
            entries
        };

        let snapshot = ExportSnapshot {
            version: EXPORT_VERSION,
            entries,
        };
        let data = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| CacheError::Storage(format!("cannot serialize snapshot: {e}")))?;
        std::fs::write(dest, data)?;
        Ok(())
    }

    /// Merge a snapshot file into this store, key by key. Conflict policy is
    /// overwrite-wins; the report separates added from overwritten counts.
    pub fn import(&self, src: &Path) -> Result<ImportReport> {
        let data = std::fs::read_to_string(src)?;
        let snapshot: ExportSnapshot = serde_json::from_str(&data)
            .map_err(|e| CacheError::Storage(format!("invalid snapshot file: {e}")))?;
        if snapshot.version != EXPORT_VERSION {
            return Err(CacheError::Storage(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }

        let conn = self.lock_conn()?;
        let mut report = ImportReport {
            added: 0,
            overwritten: 0,
        };
        for entry in &snapshot.entries {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM cache WHERE key = ?1)",
                params![entry.key],
                |row| row.get(0),
            )?;
            conn.execute(
                "INSERT OR REPLACE INTO cache
                 (key, value, model, created_at, last_accessed_at, expires_at, hit_count, size_bytes)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    entry.key,
                    entry.value.to_string(),
                    entry.model,
                    entry.created_at,
                    entry.last_accessed_at,
                    entry.expires_at,
                    entry.hit_count,
                    entry.size_bytes,
                ],
            )?;
            if exists {
                report.overwritten += 1;
            } else {
                report.added += 1;
            }
        }
        Ok(report)
    }

    /// Backdate an entry's timestamps. Test-only hook for deterministic
    /// expiry and LRU assertions without sleeping.
    #[cfg(test)]
    pub(crate) fn backdate(
        &self,
        key: &str,
        last_accessed_at: f64,
        expires_at: Option<f64>,
    ) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "UPDATE cache SET last_accessed_at = ?1, expires_at = ?2 WHERE key = ?3",
            params![last_accessed_at, expires_at, key],
        )?;
        Ok(())
    }

    /// Poison the connection mutex so every subsequent operation fails with
    /// a `Storage` error. Test-only hook for exercising degradation paths.
    #[cfg(test)]
    pub(crate) fn poison_for_tests(&self) {
        let conn = Arc::clone(&self.conn);
        let _ = std::thread::spawn(move || {
            let _guard = conn.lock().unwrap();
            panic!("poisoning store mutex for test");
        })
        .join();
    }
}

/// Current wall-clock time as unix seconds.
pub(crate) fn now_ts() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> Store {
        Store::open_in_memory().unwrap()
    }

    #[test]
    fn test_set_get_round_trip() {
        let s = store();
        let value = json!({"choices": [{"message": {"content": "hi"}}]});
        s.set("k1", &value, "gpt-4", None).unwrap();
        let entry = s.get("k1").unwrap().unwrap();
        assert_eq!(entry.value, value);
        assert_eq!(entry.model, "gpt-4");
        assert_eq!(entry.hit_count, 1);
        assert!(entry.expires_at.is_none());
    }

    #[test]
    fn test_get_absent_returns_none() {
        let s = store();
        assert!(s.get("missing").unwrap().is_none());
    }

    #[test]
    fn test_expired_entry_is_absent_and_deleted() {
        let s = store();
        s.set("k", &json!("v"), "m", Some(Duration::from_secs(60)))
            .unwrap();
        // Backdate expiry to one second in the past.
        s.backdate("k", now_ts(), Some(now_ts() - 1.0)).unwrap();
        assert!(s.get("k").unwrap().is_none());
        assert_eq!(s.entry_count().unwrap(), 0, "lazy expiry deletes the row");
    }

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let s = store();
        s.set("k", &json!("v"), "m", Some(Duration::from_secs(60)))
            .unwrap();
        // expires_at exactly now → treated as absent.
        s.backdate("k", now_ts(), Some(now_ts())).unwrap();
        assert!(s.get("k").unwrap().is_none());
    }

    #[test]
    fn test_set_without_ttl_never_expires() {
        let s = store();
        s.set("k", &json!("v"), "m", None).unwrap();
        let entry = s.get("k").unwrap().unwrap();
        assert!(entry.expires_at.is_none());
    }

    #[test]
    fn test_upsert_replaces_value() {
        let s = store();
        s.set("k", &json!("old"), "m", None).unwrap();
        s.set("k", &json!("new"), "m", None).unwrap();
        assert_eq!(s.get("k").unwrap().unwrap().value, json!("new"));
        assert_eq!(s.entry_count().unwrap(), 1);
    }

    #[test]
    fn test_delete() {
        let s = store();
        s.set("k", &json!("v"), "m", None).unwrap();
        assert!(s.delete("k").unwrap());
        assert!(!s.delete("k").unwrap());
        assert!(s.get("k").unwrap().is_none());
    }

    #[test]
    fn test_get_updates_last_accessed() {
        let s = store();
        s.set("k", &json!("v"), "m", None).unwrap();
        s.backdate("k", 100.0, None).unwrap();
        let entry = s.get("k").unwrap().unwrap();
        assert!(entry.last_accessed_at > 100.0);
    }

    #[test]
    fn test_lru_eviction_order() {
        let s = store();
        for i in 1..=3 {
            s.set(&format!("k{i}"), &json!(i), "m", None).unwrap();
        }
        // k2 least recently accessed, then k3; k1 most recent.
        s.backdate("k1", 300.0, None).unwrap();
        s.backdate("k2", 100.0, None).unwrap();
        s.backdate("k3", 200.0, None).unwrap();
        let evicted = s.evict_if_over_capacity(2).unwrap();
        assert_eq!(evicted, 1);
        assert!(s.get("k2").unwrap().is_none(), "k2 was LRU");
        assert!(s.get("k1").unwrap().is_some());
        assert!(s.get("k3").unwrap().is_some());
    }

    #[test]
    fn test_lru_tie_breaks_on_created_at() {
        let s = store();
        s.set("old", &json!(1), "m", None).unwrap();
        // Ensure distinct created_at for the second insert.
        std::thread::sleep(Duration::from_millis(5));
        s.set("new", &json!(2), "m", None).unwrap();
        // Equal last_accessed_at → the earlier created_at goes first.
        s.backdate("old", 500.0, None).unwrap();
        s.backdate("new", 500.0, None).unwrap();
        s.evict_if_over_capacity(1).unwrap();
        assert!(s.get("old").unwrap().is_none(), "oldest inserted evicted");
        assert!(s.get("new").unwrap().is_some());
    }

    #[test]
    fn test_evict_noop_under_capacity() {
        let s = store();
        s.set("k", &json!(1), "m", None).unwrap();
        assert_eq!(s.evict_if_over_capacity(10).unwrap(), 0);
    }

    #[test]
    fn test_clear_all_resets_counters() {
        let s = store();
        s.set("k", &json!(1), "m", None).unwrap();
        s.record_hit().unwrap();
        s.record_miss().unwrap();
        let removed = s.clear(None).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(s.counters().unwrap(), (0, 0));
    }

    #[test]
    fn test_clear_older_than_keeps_recent_and_counters() {
        let s = store();
        s.set("old", &json!(1), "m", None).unwrap();
        s.set("new", &json!(2), "m", None).unwrap();
        s.record_hit().unwrap();
        // Push "old" two days into the past.
        {
            let conn = s.lock_conn().unwrap();
            conn.execute(
                "UPDATE cache SET created_at = ?1 WHERE key = 'old'",
                params![now_ts() - 2.0 * 86400.0],
            )
            .unwrap();
        }
        let removed = s.clear(Some(Duration::from_secs(86400))).unwrap();
        assert_eq!(removed, 1);
        assert!(s.get("new").unwrap().is_some());
        assert_eq!(s.counters().unwrap(), (1, 0), "partial clear keeps counters");
    }

    #[test]
    fn test_sweep_expired() {
        let s = store();
        s.set("dead", &json!(1), "m", Some(Duration::from_secs(60)))
            .unwrap();
        s.set("live", &json!(2), "m", None).unwrap();
        s.backdate("dead", now_ts(), Some(now_ts() - 1.0)).unwrap();
        assert_eq!(s.sweep_expired().unwrap(), 1);
        assert_eq!(s.entry_count().unwrap(), 1);
    }

    #[test]
    fn test_counters_accumulate() {
        let s = store();
        s.record_hit().unwrap();
        s.record_hit().unwrap();
        s.record_miss().unwrap();
        assert_eq!(s.counters().unwrap(), (2, 1));
    }

    #[test]
    fn test_by_model_breakdown() {
        let s = store();
        s.set("a", &json!(1), "gpt-4", None).unwrap();
        s.set("b", &json!(2), "gpt-4", None).unwrap();
        s.set("c", &json!(3), "claude", None).unwrap();
        let by_model = s.by_model().unwrap();
        assert_eq!(by_model.get("gpt-4"), Some(&2));
        assert_eq!(by_model.get("claude"), Some(&1));
    }

    #[test]
    fn test_total_size_bytes_tracks_payloads() {
        let s = store();
        assert_eq!(s.total_size_bytes().unwrap(), 0);
        let value = json!({"content": "hello"});
        s.set("k", &value, "m", None).unwrap();
        assert_eq!(
            s.total_size_bytes().unwrap(),
            value.to_string().len() as u64
        );
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");
        {
            let s = Store::open(&path).unwrap();
            s.set("k", &json!("durable"), "m", None).unwrap();
        }
        let s = Store::open(&path).unwrap();
        assert_eq!(s.get("k").unwrap().unwrap().value, json!("durable"));
    }

    #[test]
    fn test_export_import_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = dir.path().join("snapshot.json");

        let src = store();
        src.set("a", &json!({"n": 1}), "gpt-4", None).unwrap();
        src.set("b", &json!({"n": 2}), "claude", Some(Duration::from_secs(3600)))
            .unwrap();
        src.export(&snapshot).unwrap();

        let dst = store();
        let report = dst.import(&snapshot).unwrap();
        assert_eq!(report, ImportReport { added: 2, overwritten: 0 });
        assert_eq!(dst.entry_count().unwrap(), 2);
        assert_eq!(dst.get("a").unwrap().unwrap().value, json!({"n": 1}));
        let b = dst.get("b").unwrap().unwrap();
        assert_eq!(b.model, "claude");
        assert!(b.expires_at.is_some());
    }

    #[test]
    fn test_import_overwrite_wins_and_reports_split() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = dir.path().join("snapshot.json");

        let src = store();
        src.set("shared", &json!("theirs"), "m", None).unwrap();
        src.set("fresh", &json!("new"), "m", None).unwrap();
        src.export(&snapshot).unwrap();

        let dst = store();
        dst.set("shared", &json!("ours"), "m", None).unwrap();
        let report = dst.import(&snapshot).unwrap();
        assert_eq!(report, ImportReport { added: 1, overwritten: 1 });
        assert_eq!(
            dst.get("shared").unwrap().unwrap().value,
            json!("theirs"),
            "import conflict policy is overwrite-wins"
        );
    }

    #[test]
    fn test_poisoned_store_surfaces_storage_error() {
        let s = store();
        s.set("k", &json!(1), "m", None).unwrap();
        s.poison_for_tests();
        assert!(matches!(s.get("k"), Err(CacheError::Storage(_))));
        assert!(matches!(s.set("k2", &json!(2), "m", None), Err(CacheError::Storage(_))));
    }

    #[test]
    fn test_import_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "not json").unwrap();
        let s = store();
        assert!(matches!(s.import(&bad), Err(CacheError::Storage(_))));
    }
}
