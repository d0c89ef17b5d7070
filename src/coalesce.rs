//! Request coalescing: at most one in-flight upstream fetch per key.
//!
//! The first caller for a key becomes the owner and its fetch is spawned as
//! a detached task; every caller (owner included) awaits a broadcast of the
//! shared outcome. Because the fetch runs in its own task, it always runs
//! to completion once started — a canceled inbound request only drops its
//! receiver, detaching that waiter without affecting anyone else.
//!
//! Failures are published to all waiters and are not negatively cached:
//! the registry entry is removed before the outcome is published, so a
//! subsequent request for the same key is free to retry.

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::{CacheError, Result};

/// Outcome shared between the owner and all waiters. Errors are wrapped in
/// `Arc` so one failure can be delivered to every subscriber.
pub type Shared<T> = std::result::Result<T, Arc<CacheError>>;

/// Transient registry of in-flight fetches, keyed by cache key.
/// Entries exist only while an upstream call is outstanding.
pub struct Coalescer<T> {
    in_flight: Arc<DashMap<String, broadcast::Sender<Shared<T>>>>,
}

impl<T> Default for Coalescer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Coalescer<T> {
    pub fn new() -> Self {
        Self {
            in_flight: Arc::new(DashMap::new()),
        }
    }

    /// Number of keys with an outstanding fetch.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }
}

impl<T> Coalescer<T>
where
    T: Clone + Send + 'static,
{
    /// Run `fetch` for `key`, collapsing concurrent calls into one.
    ///
    /// Exactly one caller's `fetch` future is executed; all concurrent
    /// callers for the same key receive the same result or the same
    /// failure. Losers' futures are dropped unrun.
    pub async fn execute<F>(&self, key: &str, fetch: F) -> Shared<T>
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        enum Role<T> {
            Owner(broadcast::Sender<Shared<T>>, broadcast::Receiver<Shared<T>>),
            Waiter(broadcast::Receiver<Shared<T>>),
        }

        // Decide ownership atomically, then release the map shard before
        // spawning or awaiting anything.
        let role = match self.in_flight.entry(key.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(entry) => {
                Role::Waiter(entry.get().subscribe())
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let (tx, rx) = broadcast::channel(1);
                slot.insert(tx.clone());
                Role::Owner(tx, rx)
            }
        };

        let mut rx = match role {
            Role::Waiter(rx) => {
                debug!(key = %&key[..8.min(key.len())], "joining in-flight fetch");
                rx
            }
            Role::Owner(tx, rx) => {
                let registry = Arc::clone(&self.in_flight);
                let key = key.to_string();
                // Detached task: the fetch runs to completion even if the
                // request that started it is canceled, so late waiters and
                // the cache still benefit from the finished work.
                tokio::spawn(async move {
                    let outcome = fetch.await.map_err(Arc::new);
                    // Remove before publishing: a new request arriving after
                    // the publish must start a fresh fetch, not subscribe to
                    // a resolved one.
                    registry.remove(&key);
                    let _ = tx.send(outcome);
                });
                rx
            }
        };

        match rx.recv().await {
            Ok(outcome) => outcome,
            // The sender dropped without publishing (owner task panicked).
            Err(_) => Err(Arc::new(CacheError::Upstream(
                "in-flight fetch aborted".into(),
            ))),
        }
    }
}
