//! Delivery-id de-duplication.
//!
//! GitHub redelivers webhooks with the same `X-GitHub-Delivery` id. The
//! cache remembers recently seen ids so retries are acknowledged without
//! being processed again. It is process-local; across restarts idempotency
//! comes from deterministic session naming instead.

use crate::cache::{Sweep, Sweeper, TtlCache};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Default retention of delivery ids, covering GitHub's redelivery window
pub const DEFAULT_DEDUP_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default interval between sweeps of expired delivery ids
pub const DEFAULT_DEDUP_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// TTL-based set of delivery ids already accepted for processing
pub struct DeduplicationCache {
    entries: TtlCache<()>,
    sweeper: Mutex<Option<Sweeper>>,
}

impl DeduplicationCache {
    /// Create a cache without a background sweeper
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: TtlCache::new(ttl),
            sweeper: Mutex::new(None),
        }
    }

    /// Create a cache and start its sweeper on the current tokio runtime
    pub fn with_sweeper(ttl: Duration, sweep_interval: Duration) -> Arc<Self> {
        let cache = Arc::new(Self::new(ttl));
        let sweeper = Sweeper::spawn("deduplication", Arc::downgrade(&cache), sweep_interval);
        *cache.sweeper.lock().unwrap_or_else(PoisonError::into_inner) = Some(sweeper);
        cache
    }

    /// Whether `delivery_id` has been seen within the TTL
    pub fn is_duplicate(&self, delivery_id: &str) -> bool {
        self.entries.contains(delivery_id)
    }

    /// Record `delivery_id`.
    ///
    /// Returns `false` without changing anything if a live entry already
    /// exists, `true` if this call inserted it. Callers racing on the same id
    /// can rely on exactly one of them seeing `true`.
    pub fn add(&self, delivery_id: &str) -> bool {
        self.entries.insert_if_absent(delivery_id, ())
    }

    /// Number of stored delivery ids
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// Stop the background sweeper, if one is running
    pub async fn shutdown(&self) {
        let sweeper = self
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(sweeper) = sweeper {
            sweeper.shutdown().await;
        }
    }
}

impl Default for DeduplicationCache {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_TTL)
    }
}

impl Sweep for DeduplicationCache {
    fn sweep(&self) -> usize {
        self.entries.purge_expired()
    }
}

#[cfg(test)]
#[path = "dedup_tests.rs"]
mod tests;
