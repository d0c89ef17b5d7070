//! Periodic physical sweep of expired entries.
//!
//! Lazy expiry in the store keeps correctness without this task; the sweep
//! reclaims space from rows nobody reads anymore.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cache::Cache;

/// Spawn a background task sweeping expired entries every `interval`.
/// The first sweep runs immediately at startup.
pub fn start_periodic_sweep(cache: Cache, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match cache.sweep_expired() {
                Ok(0) => {}
                Ok(removed) => debug!(removed, "swept expired cache entries"),
                Err(e) => warn!("expired-entry sweep failed: {e}"),
            }
        }
    })
}
