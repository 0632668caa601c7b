//! Short-TTL cache for the ranking configuration
//!
//! Injected into the assembler rather than held in a process-wide static.
//! Readers share a `RwLock`; a single periodic writer (`spawn_refresher`)
//! keeps it warm, last write wins. Staleness up to the TTL is accepted.
//! At most one store fetch is in flight: readers that find the value stale
//! while another caller is refreshing are served the stale copy.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, info, warn};

use super::feed_config::FeedConfig;
use super::repository::ConfigStore;

struct CachedConfig {
    config: FeedConfig,
    fetched_at: Instant,
}

pub struct FeedConfigCache {
    store: Arc<dyn ConfigStore>,
    ttl: Duration,
    state: RwLock<Option<CachedConfig>>,
    refreshing: Mutex<()>,
}

impl FeedConfigCache {
    pub fn new(store: Arc<dyn ConfigStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            state: RwLock::new(None),
            refreshing: Mutex::new(()),
        }
    }

    /// Current configuration; refetches when stale and never fails.
    ///
    /// Store failures fall back to the last good value, then to defaults.
    pub async fn get(&self) -> FeedConfig {
        if let Some(config) = self.cached(true).await {
            return config;
        }

        match self.refreshing.try_lock() {
            Ok(_guard) => self.reload().await,
            Err(_) => {
                if let Some(stale) = self.cached(false).await {
                    return stale;
                }
                // Cold cache: wait for the in-flight fetch instead of issuing another
                let _guard = self.refreshing.lock().await;
                match self.cached(true).await {
                    Some(config) => config,
                    None => self.reload().await,
                }
            }
        }
    }

    /// Fetch from the store and replace the cached value
    pub async fn refresh(&self) -> FeedConfig {
        let _guard = self.refreshing.lock().await;
        self.reload().await
    }

    async fn cached(&self, fresh_only: bool) -> Option<FeedConfig> {
        let state = self.state.read().await;
        state
            .as_ref()
            .filter(|cached| !fresh_only || cached.fetched_at.elapsed() < self.ttl)
            .map(|cached| cached.config.clone())
    }

    async fn reload(&self) -> FeedConfig {
        match self.store.feed_config().await {
            Ok(config) => {
                debug!("Feed config v{} loaded", config.version);
                let mut state = self.state.write().await;
                *state = Some(CachedConfig {
                    config: config.clone(),
                    fetched_at: Instant::now(),
                });
                config
            }
            Err(e) => {
                let mut state = self.state.write().await;
                match state.as_mut() {
                    Some(cached) => {
                        warn!(
                            "Failed to load feed config, keeping v{}: {}",
                            cached.config.version, e
                        );
                        // Wait a full TTL before asking the store again
                        cached.fetched_at = Instant::now();
                        cached.config.clone()
                    }
                    None => {
                        warn!("Failed to load feed config, using defaults: {}", e);
                        FeedConfig::default()
                    }
                }
            }
        }
    }

    /// Periodic writer keeping the cache warm until shutdown
    pub fn spawn_refresher(
        self: Arc<Self>,
        every: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let config = self.refresh().await;
                        debug!("Feed config refreshed (v{})", config.version);
                    }
                    _ = shutdown.recv() => {
                        info!("Feed config refresher shutting down");
                        break;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct CountingStore {
        calls: AtomicUsize,
        failing: AtomicBool,
        delay: Duration,
    }

    impl CountingStore {
        fn new() -> Arc<Self> {
            Self::slow(Duration::ZERO)
        }

        fn slow(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                failing: AtomicBool::new(false),
                delay,
            })
        }
    }

    #[async_trait]
    impl ConfigStore for CountingStore {
        async fn feed_config(&self) -> Result<FeedConfig> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) as i64 + 1;
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.failing.load(Ordering::SeqCst) {
                return Err(Error::database("config table unavailable"));
            }
            Ok(FeedConfig::from_entries(n, [("discovery_count", 4.0)]))
        }
    }

    #[tokio::test]
    async fn test_fresh_value_is_served_from_cache() {
        let store = CountingStore::new();
        let cache = FeedConfigCache::new(store.clone(), Duration::from_secs(300));
        assert_eq!(cache.get().await.version, 1);
        assert_eq!(cache.get().await.version, 1);
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stale_value_is_refetched() {
        let store = CountingStore::new();
        let cache = FeedConfigCache::new(store.clone(), Duration::ZERO);
        assert_eq!(cache.get().await.version, 1);
        assert_eq!(cache.get().await.version, 2);
    }

    #[tokio::test]
    async fn test_concurrent_stale_readers_trigger_one_fetch() {
        let store = CountingStore::slow(Duration::from_millis(50));
        let cache = FeedConfigCache::new(store.clone(), Duration::ZERO);
        assert_eq!(cache.get().await.version, 1);

        let (a, b, c, d) = tokio::join!(cache.get(), cache.get(), cache.get(), cache.get());
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
        let versions = [a.version, b.version, c.version, d.version];
        assert_eq!(versions.iter().filter(|v| **v == 2).count(), 1);
        assert_eq!(versions.iter().filter(|v| **v == 1).count(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_cold_readers_share_one_fetch() {
        let store = CountingStore::slow(Duration::from_millis(50));
        let cache = FeedConfigCache::new(store.clone(), Duration::from_secs(300));

        let (a, b, c) = tokio::join!(cache.get(), cache.get(), cache.get());
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
        assert!([a, b, c].iter().all(|config| config.version == 1));
    }

    #[tokio::test]
    async fn test_store_failure_keeps_last_good_value() {
        let store = CountingStore::new();
        let cache = FeedConfigCache::new(store.clone(), Duration::ZERO);
        let first = cache.get().await;
        assert_eq!(first.discovery_count, 4);

        store.failing.store(true, Ordering::SeqCst);
        let fallback = cache.get().await;
        assert_eq!(fallback.version, first.version);
        assert_eq!(fallback.discovery_count, 4);
    }

    #[tokio::test]
    async fn test_store_failure_without_cache_uses_defaults() {
        let store = CountingStore::new();
        store.failing.store(true, Ordering::SeqCst);
        let cache = FeedConfigCache::new(store, Duration::from_secs(300));
        assert_eq!(cache.get().await, FeedConfig::default());
    }

    #[tokio::test]
    async fn test_refresher_stops_on_shutdown() {
        let store = CountingStore::new();
        let cache = Arc::new(FeedConfigCache::new(store.clone(), Duration::from_secs(300)));
        let (tx, rx) = broadcast::channel(1);
        let handle = cache.clone().spawn_refresher(Duration::from_millis(10), rx);

        tokio::time::sleep(Duration::from_millis(35)).await;
        let _ = tx.send(());
        handle.await.unwrap();

        assert!(store.calls.load(Ordering::SeqCst) >= 1);
        assert!(cache.get().await.version >= 1);
    }
}
