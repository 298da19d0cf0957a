//! Tests for [`TtlCache`] and [`Sweeper`].

use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const TTL: Duration = Duration::from_secs(60);

mod ttl_cache_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_get_returns_live_value() {
        let cache = TtlCache::new(TTL);
        cache.insert("acme/backend", 42_i64);

        assert_eq!(cache.get("acme/backend"), Some(42));
        assert!(cache.contains("acme/backend"));
        assert_eq!(cache.get("acme/other"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_invisible_after_ttl() {
        let cache = TtlCache::new(TTL);
        cache.insert("key", ());

        tokio::time::advance(TTL - Duration::from_secs(1)).await;
        assert!(cache.contains("key"));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!cache.contains("key"));
        assert_eq!(cache.len(), 1, "expired entry remains until purged");
    }

    #[tokio::test(start_paused = true)]
    async fn test_insert_if_absent_only_once_per_window() {
        let cache = TtlCache::new(TTL);

        assert!(cache.insert_if_absent("key", ()));
        assert!(!cache.insert_if_absent("key", ()));

        tokio::time::advance(TTL).await;
        assert!(cache.insert_if_absent("key", ()), "expired entry is replaced");
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_insert_overwrites_and_resets_expiry() {
        let cache = TtlCache::new(TTL);
        cache.insert("key", 1);

        tokio::time::advance(TTL / 2).await;
        cache.insert("key", 2);

        tokio::time::advance(TTL / 2 + Duration::from_secs(1)).await;
        assert_eq!(cache.get("key"), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired_removes_only_stale_entries() {
        let cache = TtlCache::new(TTL);
        cache.insert("old", ());

        tokio::time::advance(TTL / 2).await;
        cache.insert("new", ());

        tokio::time::advance(TTL / 2).await;
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains("new"));
    }

    #[tokio::test]
    async fn test_remove() {
        let cache = TtlCache::new(TTL);
        cache.insert("key", ());

        assert!(cache.remove("key"));
        assert!(!cache.remove("key"));
        assert!(cache.is_empty());
    }
}

mod sweeper_tests {
    use super::*;

    struct CountingTarget {
        sweeps: AtomicUsize,
    }

    impl Sweep for CountingTarget {
        fn sweep(&self) -> usize {
            self.sweeps.fetch_add(1, Ordering::SeqCst);
            0
        }
    }

    fn target() -> Arc<CountingTarget> {
        Arc::new(CountingTarget {
            sweeps: AtomicUsize::new(0),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeps_on_each_interval() {
        let target = target();
        let sweeper = Sweeper::spawn("test", Arc::downgrade(&target), Duration::from_secs(10));

        tokio::time::sleep(Duration::from_secs(35)).await;

        assert_eq!(target.sweeps.load(Ordering::SeqCst), 3);
        sweeper.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_task() {
        let target = target();
        let sweeper = Sweeper::spawn("test", Arc::downgrade(&target), Duration::from_secs(10));

        sweeper.shutdown().await;
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(target.sweeps.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_exits_when_target_dropped() {
        let target = target();
        let sweeper = Sweeper::spawn("test", Arc::downgrade(&target), Duration::from_secs(10));

        drop(target);
        tokio::time::sleep(Duration::from_secs(11)).await;
        tokio::task::yield_now().await;

        assert!(sweeper.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_exits_when_handle_dropped() {
        let target = target();
        let sweeper = Sweeper::spawn("test", Arc::downgrade(&target), Duration::from_secs(10));

        drop(sweeper);
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(target.sweeps.load(Ordering::SeqCst), 0);
    }
}
