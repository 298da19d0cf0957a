//! TTL cache and background sweeper.
//!
//! Both the delivery de-duplication cache and the installation cache are a
//! map from a string key to a value with an expiry time, guarded by a single
//! read-write lock, and pruned by a periodic task. This module provides the
//! shared pieces.
//!
//! Time is measured with [`tokio::time::Instant`] so tests can drive expiry
//! with a paused clock.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

// ============================================================================
// TtlCache
// ============================================================================

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Thread-safe map whose entries expire after a fixed TTL.
///
/// Expired entries are invisible to readers immediately. They are physically
/// removed by [`TtlCache::purge_expired`] or overwritten by a later insert.
///
/// A poisoned lock is recovered rather than propagated. Every write leaves
/// the map in a consistent state, so a panic elsewhere cannot corrupt it.
pub struct TtlCache<V> {
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    /// Create an empty cache whose entries live for `ttl`
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Configured entry lifetime
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the live value for `key`, if any
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone())
    }

    /// Whether a live entry exists for `key`
    pub fn contains(&self, key: &str) -> bool {
        let now = Instant::now();
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(key).is_some_and(|entry| entry.is_live(now))
    }

    /// Insert or replace the entry for `key`, resetting its expiry
    pub fn insert(&self, key: impl Into<String>, value: V) {
        let expires_at = Instant::now() + self.ttl;
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.into(), CacheEntry { value, expires_at });
    }

    /// Insert `value` only if no live entry exists for `key`.
    ///
    /// Liveness is re-checked under the write lock, so of many concurrent
    /// callers for the same key exactly one observes `true`.
    pub fn insert_if_absent(&self, key: impl Into<String>, value: V) -> bool {
        let key = key.into();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();

        if entries.get(&key).is_some_and(|entry| entry.is_live(now)) {
            return false;
        }

        entries.insert(
            key,
            CacheEntry {
                value,
                expires_at: now + self.ttl,
            },
        );
        true
    }

    /// Remove the entry for `key`. Returns whether an entry was present.
    pub fn remove(&self, key: &str) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key).is_some()
    }

    /// Drop every expired entry and return how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }

    /// Number of stored entries, including expired ones not yet purged
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Sweeper
// ============================================================================

/// Something a [`Sweeper`] can prune periodically
pub trait Sweep: Send + Sync + 'static {
    /// Remove stale state and return the number of entries removed
    fn sweep(&self) -> usize;
}

/// Handle to a background task that periodically calls [`Sweep::sweep`].
///
/// The task holds only a weak reference to its target and exits on the
/// first tick after the target is dropped. It also exits when
/// [`Sweeper::shutdown`] is called or the handle is dropped.
pub struct Sweeper {
    name: &'static str,
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Sweeper {
    /// Spawn a sweeper on the current tokio runtime.
    ///
    /// The first sweep happens one `interval` after spawning.
    pub fn spawn<T: Sweep>(name: &'static str, target: Weak<T>, interval: Duration) -> Self {
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let Some(target) = target.upgrade() else {
                            debug!(sweeper = name, "Sweep target dropped; stopping");
                            break;
                        };
                        let removed = target.sweep();
                        if removed > 0 {
                            debug!(sweeper = name, removed, "Removed expired cache entries");
                        }
                    }
                    // Err means the handle was dropped
                    _ = stop_rx.changed() => break,
                }
            }
        });

        Self {
            name,
            stop_tx,
            task,
        }
    }

    /// Signal the task to stop and wait for it to finish
    pub async fn shutdown(self) {
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.task.await {
            debug!(sweeper = self.name, error = %e, "Sweeper task ended abnormally");
        }
        info!(sweeper = self.name, "Cache sweeper stopped");
    }

    /// Whether the background task has exited
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
