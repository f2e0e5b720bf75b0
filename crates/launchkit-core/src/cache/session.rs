//! Refresh controller for one plugin's remote list.
//!
//! A [`CacheSession`] decides per read whether to serve the stored list or
//! refetch it, and optionally owns a background timer that refreshes the list
//! on a fixed interval.
//!
//! All refreshes of a session are serialized on one async lock, so the
//! store has a single writer at any time:
//! - a foreground miss that had to wait for an in-flight refresh adopts its
//!   result instead of fetching again;
//! - background and mutation-triggered refreshes wait, then fetch.

use super::entry::{CacheConfig, CacheEntry, CacheState};
use super::source::ListSource;
use super::store::CacheStore;
use crate::cancel::CancellationToken;
use crate::item::RemoteItem;
use crate::network::{retry_transient, RetryConfig};
use crate::{LaunchkitError, Result};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Items shared between the session and its readers.
pub type Items = Arc<Vec<RemoteItem>>;

#[derive(Debug, Clone)]
struct Loaded {
    items: Items,
    fetched_at: DateTime<Utc>,
    valid_until: DateTime<Utc>,
}

impl Loaded {
    fn from_entry(entry: CacheEntry) -> Self {
        Self {
            items: Arc::new(entry.items),
            fetched_at: entry.fetched_at,
            valid_until: entry.valid_until,
        }
    }

    fn is_fresh(&self) -> bool {
        Utc::now() < self.valid_until
    }
}

#[derive(Debug, Default)]
enum Memory {
    /// The store has not been consulted yet.
    #[default]
    Unloaded,
    Empty,
    Loaded(Loaded),
}

struct SessionInner {
    name: String,
    source: Arc<dyn ListSource>,
    store: Arc<dyn CacheStore>,
    config: RwLock<CacheConfig>,
    memory: RwLock<Memory>,
    /// Bumped after every successful store write.
    generation: AtomicU64,
    /// Bumped by every clear; a fetch that started in an older epoch is
    /// returned to its caller but never stored.
    epoch: AtomicU64,
    refresh_lock: tokio::sync::Mutex<()>,
    /// Serializes store writes against clears. `memory` is only held for
    /// the in-memory swap, never across file I/O.
    store_lock: Mutex<()>,
}

struct RefreshTimer {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Per-plugin-instance cache controller.
pub struct CacheSession {
    inner: Arc<SessionInner>,
    timer: Mutex<Option<RefreshTimer>>,
}

impl CacheSession {
    pub fn new(
        name: impl Into<String>,
        source: Arc<dyn ListSource>,
        store: Arc<dyn CacheStore>,
        config: CacheConfig,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                name: name.into(),
                source,
                store,
                config: RwLock::new(config),
                memory: RwLock::new(Memory::Unloaded),
                generation: AtomicU64::new(0),
                epoch: AtomicU64::new(0),
                refresh_lock: tokio::sync::Mutex::new(()),
                store_lock: Mutex::new(()),
            }),
            timer: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn config(&self) -> CacheConfig {
        self.inner.config()
    }

    pub fn state(&self) -> CacheState {
        match self.inner.load() {
            None => CacheState::Cold,
            Some(loaded) if loaded.is_fresh() => CacheState::Fresh,
            Some(_) => CacheState::Stale,
        }
    }

    /// When the stored list was fetched, if there is one.
    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.inner.load().map(|loaded| loaded.fetched_at)
    }

    /// The list for a foreground query.
    ///
    /// Caching disabled: always fetches and stores nothing. Fresh entry:
    /// served without a remote call. Cold or stale: refetched and stored.
    pub async fn get_results(&self) -> Result<Items> {
        self.inner.get_results().await
    }

    /// Refetch unconditionally and store the result when caching is enabled.
    pub async fn refresh(&self) -> Result<Items> {
        self.inner.refresh().await
    }

    /// Whatever is stored, fresh or stale, without touching the network.
    pub fn cached_items(&self) -> Option<Items> {
        self.inner.load().map(|loaded| loaded.items)
    }

    /// Mark the stored entry stale so the next read refetches.
    pub fn expire(&self) {
        self.inner.expire();
    }

    /// Delete the stored entry. Safe to call when nothing is stored.
    pub fn clear(&self) -> Result<()> {
        self.inner.clear()
    }

    /// Apply new settings and their side effects.
    ///
    /// Disabling the cache deletes the stored entry; a TTL change expires it;
    /// toggling auto-refresh (or changing its interval) starts or stops the
    /// background timer.
    pub fn set_config(&self, config: CacheConfig) {
        let old = {
            let mut current = self
                .inner
                .config
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *current, config.clone())
        };

        if old.enabled && !config.enabled {
            info!("Caching disabled for {}, removing stored list", self.name());
            if let Err(e) = self.inner.clear() {
                warn!("Failed to clear cache for {}: {}", self.name(), e);
            }
        } else if config.enabled && old.enabled && old.ttl != config.ttl {
            debug!("Cache TTL changed for {}, expiring entry", self.name());
            self.inner.expire();
        }

        let interval_changed = old.refresh_interval != config.refresh_interval;
        if config.auto_refresh && (!old.auto_refresh || interval_changed || !self.is_running()) {
            self.stop();
            self.start();
        } else if !config.auto_refresh && old.auto_refresh {
            self.stop();
        }
    }

    /// Start the background refresh timer if auto-refresh is configured.
    ///
    /// Returns whether a timer is running afterwards. Requires a Tokio runtime.
    pub fn start(&self) -> bool {
        let config = self.config();
        if !config.auto_refresh {
            return false;
        }

        let mut timer = self.timer.lock().unwrap_or_else(PoisonError::into_inner);
        if timer.as_ref().is_some_and(|t| !t.handle.is_finished()) {
            return true;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                warn!("No async runtime; auto-refresh for {} not started", self.name());
                return false;
            }
        };

        let token = CancellationToken::new();
        let handle = runtime.spawn(run_timer(
            Arc::downgrade(&self.inner),
            config.refresh_interval,
            token.clone(),
        ));
        info!(
            "Started auto-refresh for {} every {:?}",
            self.name(),
            config.refresh_interval
        );
        *timer = Some(RefreshTimer { token, handle });
        true
    }

    /// Stop future timer fires. A refresh already in flight runs to completion.
    pub fn stop(&self) {
        let timer = self
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(timer) = timer {
            timer.token.cancel();
            info!("Stopped auto-refresh for {}", self.name());
        }
    }

    pub fn is_running(&self) -> bool {
        self.timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|t| !t.token.is_cancelled() && !t.handle.is_finished())
    }
}

impl Drop for CacheSession {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for CacheSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheSession")
            .field("name", &self.inner.name)
            .field("config", &self.inner.config())
            .finish_non_exhaustive()
    }
}

async fn run_timer(inner: Weak<SessionInner>, interval: std::time::Duration, token: CancellationToken) {
    loop {
        if token.is_cancelled() {
            break;
        }
        let Some(session) = inner.upgrade() else {
            break;
        };

        match session.refresh().await {
            Ok(items) => info!("Background refresh of {} fetched {} items", session.name, items.len()),
            Err(e) => warn!("Background refresh of {} failed: {}", session.name, e),
        }
        drop(session);

        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
    debug!("Refresh timer exited");
}

impl SessionInner {
    fn config(&self) -> CacheConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Current entry, reading the store on first use.
    fn load(&self) -> Option<Loaded> {
        match &*self.memory.read().unwrap_or_else(PoisonError::into_inner) {
            Memory::Loaded(loaded) => return Some(loaded.clone()),
            Memory::Empty => return None,
            Memory::Unloaded => {}
        }

        let read = match self.store.read() {
            Ok(Some(entry)) => {
                debug!("Loaded {} stored items for {}", entry.items.len(), self.name);
                Memory::Loaded(Loaded::from_entry(entry))
            }
            Ok(None) => Memory::Empty,
            Err(e) => {
                // Unreadable entries count as absent.
                warn!("Ignoring stored list for {}: {}", self.name, e);
                Memory::Empty
            }
        };

        // A write or clear that landed while the file was read wins.
        let mut memory = self.memory.write().unwrap_or_else(PoisonError::into_inner);
        if let Memory::Unloaded = *memory {
            *memory = read;
        }
        match &*memory {
            Memory::Loaded(loaded) => Some(loaded.clone()),
            _ => None,
        }
    }

    async fn get_results(&self) -> Result<Items> {
        let config = self.config();
        if !config.enabled {
            debug!("Caching disabled for {}, fetching directly", self.name);
            return self.fetch(&config).await.map(Arc::new);
        }

        if let Some(loaded) = self.load().filter(Loaded::is_fresh) {
            debug!("Cache hit for {} ({} items)", self.name, loaded.items.len());
            return Ok(loaded.items);
        }

        let seen_generation = self.generation.load(Ordering::SeqCst);
        let _guard = self.refresh_lock.lock().await;

        let current = self.load();
        if let Some(loaded) = &current {
            if loaded.is_fresh() || self.generation.load(Ordering::SeqCst) != seen_generation {
                debug!("Adopted concurrent refresh of {}", self.name);
                return Ok(loaded.items.clone());
            }
        }

        debug!("Cache miss for {}, fetching", self.name);
        let epoch = self.epoch.load(Ordering::SeqCst);
        match self.fetch(&config).await {
            Ok(items) => Ok(self.store_items(items, &config, epoch)),
            Err(e) => match current {
                Some(stale) if config.serve_stale_on_error => {
                    warn!("Refresh of {} failed, serving stale list: {}", self.name, e);
                    Ok(stale.items)
                }
                _ => Err(e),
            },
        }
    }

    async fn refresh(&self) -> Result<Items> {
        let _guard = self.refresh_lock.lock().await;
        let config = self.config();
        let epoch = self.epoch.load(Ordering::SeqCst);
        let items = self.fetch(&config).await?;
        if config.enabled {
            Ok(self.store_items(items, &config, epoch))
        } else {
            Ok(Arc::new(items))
        }
    }

    async fn fetch(&self, config: &CacheConfig) -> Result<Vec<RemoteItem>> {
        if config.fetch_attempts <= 1 {
            return self.source.fetch_all().await;
        }

        let retry = RetryConfig::new().with_max_attempts(config.fetch_attempts);
        let source = &self.source;
        let (result, stats) = retry_transient(&retry, || source.fetch_all()).await;
        if stats.attempts > 1 {
            debug!("Fetch of {} took {} attempts", self.name, stats.attempts);
        }
        result
    }

    /// Persist a fetched list unless the cache was cleared or disabled after
    /// the fetch began (`epoch` is the value read before fetching).
    fn store_items(&self, items: Vec<RemoteItem>, config: &CacheConfig, epoch: u64) -> Items {
        let _store = self.store_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if self.epoch.load(Ordering::SeqCst) != epoch || !self.config().enabled {
            debug!("Cache for {} cleared during fetch, not storing", self.name);
            return Arc::new(items);
        }

        let entry = CacheEntry::fetched_now(items, config.ttl);
        if let Err(e) = self.store.write(&entry) {
            warn!("Failed to persist cache for {}: {}", self.name, e);
        }

        let loaded = Loaded::from_entry(entry);
        let items = loaded.items.clone();
        *self.memory.write().unwrap_or_else(PoisonError::into_inner) = Memory::Loaded(loaded);
        self.generation.fetch_add(1, Ordering::SeqCst);
        info!("Cached {} items for {}", items.len(), self.name);
        items
    }

    fn expire(&self) {
        let _store = self.store_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let current = match &*self.memory.read().unwrap_or_else(PoisonError::into_inner) {
            Memory::Loaded(loaded) => Some(loaded.clone()),
            _ => None,
        };

        match current {
            Some(loaded) => {
                let valid_until = loaded.fetched_at.min(Utc::now());
                let entry = CacheEntry {
                    items: loaded.items.as_ref().clone(),
                    fetched_at: loaded.fetched_at,
                    valid_until,
                };
                if let Err(e) = self.store.write(&entry) {
                    warn!("Failed to persist expiry for {}: {}", self.name, e);
                }
                let mut memory = self.memory.write().unwrap_or_else(PoisonError::into_inner);
                if let Memory::Loaded(loaded) = &mut *memory {
                    loaded.valid_until = valid_until;
                }
            }
            // Nothing in memory; expire whatever is on disk.
            None => match self.store.read() {
                Ok(Some(entry)) => {
                    if let Err(e) = self.store.write(&entry.expired()) {
                        warn!("Failed to persist expiry for {}: {}", self.name, e);
                    }
                    *self.memory.write().unwrap_or_else(PoisonError::into_inner) =
                        Memory::Unloaded;
                }
                Ok(None) | Err(LaunchkitError::CacheCorruption { .. }) => {}
                Err(e) => warn!("Failed to read cache for {}: {}", self.name, e),
            },
        }
    }

    fn clear(&self) -> Result<()> {
        let _store = self.store_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.epoch.fetch_add(1, Ordering::SeqCst);
        let result = self.store.clear();
        *self.memory.write().unwrap_or_else(PoisonError::into_inner) = Memory::Empty;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::{JsonFileStore, MemoryStore};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Counts fetches and the peak number running at once.
    #[derive(Default)]
    struct CountingSource {
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        fail: std::sync::atomic::AtomicBool,
        delay: Duration,
    }

    impl CountingSource {
        fn slow(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::default()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ListSource for CountingSource {
        async fn fetch_all(&self) -> Result<Vec<RemoteItem>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fail.load(Ordering::SeqCst) {
                return Err(LaunchkitError::Remote {
                    status: 500,
                    url: "http://localhost/api/list".into(),
                });
            }
            Ok(vec![RemoteItem::from_value(json!({"id": call, "title": format!("fetch {call}")}))
                .unwrap()])
        }
    }

    /// Records store calls made while the session's memory lock is held.
    #[derive(Default)]
    struct LockAwareStore {
        inner: MemoryStore,
        session: std::sync::OnceLock<Weak<SessionInner>>,
        calls_under_lock: AtomicUsize,
    }

    impl LockAwareStore {
        fn check(&self) {
            let Some(session) = self.session.get().and_then(Weak::upgrade) else {
                return;
            };
            if session.memory.try_write().is_err() {
                self.calls_under_lock.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    impl CacheStore for LockAwareStore {
        fn read(&self) -> Result<Option<CacheEntry>> {
            self.check();
            self.inner.read()
        }

        fn write(&self, entry: &CacheEntry) -> Result<()> {
            self.check();
            self.inner.write(entry)
        }

        fn clear(&self) -> Result<()> {
            self.check();
            self.inner.clear()
        }
    }

    fn session(source: Arc<CountingSource>, config: CacheConfig) -> CacheSession {
        CacheSession::new("test", source, Arc::new(MemoryStore::new()), config)
    }

    fn ttl(secs: u64) -> CacheConfig {
        CacheConfig::enabled(Duration::from_secs(secs))
    }

    #[tokio::test]
    async fn test_fresh_entry_is_served_without_fetch() {
        let source = Arc::new(CountingSource::default());
        let session = session(source.clone(), ttl(600));

        let first = session.get_results().await.unwrap();
        let second = session.get_results().await.unwrap();

        assert_eq!(source.calls(), 1);
        assert_eq!(first, second);
        assert_eq!(session.state(), CacheState::Fresh);
    }

    #[tokio::test]
    async fn test_disabled_cache_always_fetches_and_stores_nothing() {
        let source = Arc::new(CountingSource::default());
        let store = Arc::new(MemoryStore::new());
        let session = CacheSession::new("test", source.clone(), store.clone(), CacheConfig::default());

        session.get_results().await.unwrap();
        session.get_results().await.unwrap();
        session.refresh().await.unwrap();

        assert_eq!(source.calls(), 3);
        assert!(store.read().unwrap().is_none());
        assert_eq!(session.state(), CacheState::Cold);
    }

    #[tokio::test]
    async fn test_stale_entry_is_refetched() {
        let source = Arc::new(CountingSource::default());
        let session = session(source.clone(), ttl(600));

        session.get_results().await.unwrap();
        session.expire();
        assert_eq!(session.state(), CacheState::Stale);

        let items = session.get_results().await.unwrap();
        assert_eq!(source.calls(), 2);
        assert_eq!(items[0].i64_field("id"), Some(2));
    }

    #[tokio::test]
    async fn test_error_propagates_by_default() {
        let source = Arc::new(CountingSource::default());
        let session = session(source.clone(), ttl(600));
        session.get_results().await.unwrap();
        session.expire();
        source.fail.store(true, Ordering::SeqCst);

        let err = session.get_results().await.unwrap_err();
        assert!(matches!(err, LaunchkitError::Remote { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_stale_served_on_error_when_opted_in() {
        let source = Arc::new(CountingSource::default());
        let session = session(source.clone(), ttl(600).with_serve_stale_on_error(true));
        session.get_results().await.unwrap();
        session.expire();
        source.fail.store(true, Ordering::SeqCst);

        let items = session.get_results().await.unwrap();
        assert_eq!(items[0].i64_field("id"), Some(1));
        assert_eq!(session.state(), CacheState::Stale);
    }

    #[tokio::test]
    async fn test_cold_error_without_stale_entry_propagates() {
        let source = Arc::new(CountingSource::default());
        source.fail.store(true, Ordering::SeqCst);
        let session = session(source.clone(), ttl(600).with_serve_stale_on_error(true));

        assert!(session.get_results().await.is_err());
    }

    #[tokio::test]
    async fn test_disabling_deletes_cache_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("linkding.json");
        let source = Arc::new(CountingSource::default());
        let session = CacheSession::new(
            "linkding",
            source.clone(),
            Arc::new(JsonFileStore::new(&path)),
            ttl(600),
        );

        session.get_results().await.unwrap();
        assert!(path.exists());

        session.set_config(CacheConfig::default());
        assert!(!path.exists());

        session.clear().unwrap();
        session.clear().unwrap();
    }

    #[tokio::test]
    async fn test_disabling_mid_fetch_does_not_resurrect_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("linkding.json");
        let source = Arc::new(CountingSource::slow(Duration::from_millis(200)));
        let session = Arc::new(CacheSession::new(
            "linkding",
            source.clone(),
            Arc::new(JsonFileStore::new(&path)),
            ttl(600),
        ));

        let pending = {
            let session = session.clone();
            tokio::spawn(async move { session.get_results().await })
        };
        while source.in_flight.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        session.set_config(CacheConfig::default());
        let items = pending.await.unwrap().unwrap();

        assert_eq!(items.len(), 1);
        assert!(!path.exists());
        assert!(session.cached_items().is_none());
        assert_eq!(session.state(), CacheState::Cold);
    }

    #[tokio::test]
    async fn test_clear_mid_refresh_discards_old_list() {
        let source = Arc::new(CountingSource::slow(Duration::from_millis(200)));
        let store = Arc::new(MemoryStore::new());
        let session = Arc::new(CacheSession::new("sonarr", source.clone(), store.clone(), ttl(600)));

        let pending = {
            let session = session.clone();
            tokio::spawn(async move { session.refresh().await })
        };
        while source.in_flight.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        session.clear().unwrap();
        pending.await.unwrap().unwrap();

        assert!(store.read().unwrap().is_none());
        assert!(session.cached_items().is_none());

        // The next read fetches against the new connection and stores it.
        session.get_results().await.unwrap();
        assert_eq!(source.calls(), 2);
        assert_eq!(session.state(), CacheState::Fresh);
    }

    #[tokio::test]
    async fn test_stored_entry_survives_restart() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("paperless.json");
        let source = Arc::new(CountingSource::default());

        {
            let session = CacheSession::new(
                "paperless",
                source.clone(),
                Arc::new(JsonFileStore::new(&path)),
                ttl(600),
            );
            session.get_results().await.unwrap();
        }

        let session = CacheSession::new(
            "paperless",
            source.clone(),
            Arc::new(JsonFileStore::new(&path)),
            ttl(600),
        );
        assert_eq!(session.state(), CacheState::Fresh);
        session.get_results().await.unwrap();
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_treated_as_cold() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("sonarr.json");
        std::fs::write(&path, "garbage").unwrap();
        let source = Arc::new(CountingSource::default());
        let session = CacheSession::new(
            "sonarr",
            source.clone(),
            Arc::new(JsonFileStore::new(&path)),
            ttl(600),
        );

        assert_eq!(session.state(), CacheState::Cold);
        assert!(session.cached_items().is_none());
        session.get_results().await.unwrap();
        assert_eq!(source.calls(), 1);
        assert_eq!(session.state(), CacheState::Fresh);
    }

    #[tokio::test]
    async fn test_store_io_runs_outside_memory_lock() {
        let source = Arc::new(CountingSource::default());
        let store = Arc::new(LockAwareStore::default());
        store
            .inner
            .write(&CacheEntry::fetched_now(Vec::new(), Duration::from_secs(600)))
            .unwrap();
        let session = CacheSession::new("radarr", source.clone(), store.clone(), ttl(600));
        store.session.set(Arc::downgrade(&session.inner)).ok();

        assert_eq!(session.state(), CacheState::Fresh);
        session.expire();
        session.get_results().await.unwrap();
        session.set_config(ttl(1200));
        session.clear().unwrap();

        // Expire with nothing in memory goes through the store directly.
        store
            .inner
            .write(&CacheEntry::fetched_now(Vec::new(), Duration::from_secs(600)))
            .unwrap();
        session.expire();
        assert_eq!(session.state(), CacheState::Stale);

        assert_eq!(source.calls(), 1);
        assert_eq!(store.calls_under_lock.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_ttl_change_expires_entry() {
        let source = Arc::new(CountingSource::default());
        let session = session(source.clone(), ttl(600));
        session.get_results().await.unwrap();

        session.set_config(ttl(1200));

        assert_eq!(session.state(), CacheState::Stale);
        session.get_results().await.unwrap();
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_refreshes_keep_one_fetch_in_flight() {
        let source = Arc::new(CountingSource::slow(Duration::from_millis(50)));
        let session = Arc::new(session(source.clone(), ttl(600)));

        let mut handles = Vec::new();
        for i in 0..8 {
            let session = session.clone();
            handles.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    session.get_results().await.map(|_| ())
                } else {
                    session.refresh().await.map(|_| ())
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(source.max_in_flight.load(Ordering::SeqCst), 1);
        // Four unconditional refreshes; foreground misses mostly adopt.
        assert!(source.calls() >= 4);
        assert!(source.calls() <= 8);
    }

    #[tokio::test]
    async fn test_foreground_misses_adopt_in_flight_result() {
        let source = Arc::new(CountingSource::slow(Duration::from_millis(50)));
        let session = Arc::new(session(source.clone(), ttl(600)));

        let (a, b, c) = tokio::join!(
            session.get_results(),
            session.get_results(),
            session.get_results()
        );

        assert_eq!(source.calls(), 1);
        assert_eq!(a.unwrap(), b.as_ref().unwrap().clone());
        assert_eq!(b.unwrap(), c.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_refreshes_on_interval_until_stopped() {
        let source = Arc::new(CountingSource::default());
        let config = ttl(600)
            .with_auto_refresh(true)
            .with_refresh_interval(Duration::from_secs(60));
        let session = session(source.clone(), config);

        assert!(session.start());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(source.calls(), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(source.calls(), 2);

        session.stop();
        assert!(!session.is_running());
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_survives_failures() {
        let source = Arc::new(CountingSource::default());
        source.fail.store(true, Ordering::SeqCst);
        let config = ttl(600)
            .with_auto_refresh(true)
            .with_refresh_interval(Duration::from_secs(10));
        let session = session(source.clone(), config);

        session.start();
        tokio::time::sleep(Duration::from_secs(25)).await;

        assert_eq!(source.calls(), 3);
        assert!(session.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_refresh_toggle_starts_and_stops_timer() {
        let source = Arc::new(CountingSource::default());
        let session = session(source.clone(), ttl(600));
        assert!(!session.start());

        session.set_config(ttl(600).with_auto_refresh(true));
        assert!(session.is_running());

        session.set_config(ttl(600));
        assert!(!session.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_timer() {
        let source = Arc::new(CountingSource::default());
        let config = ttl(600)
            .with_auto_refresh(true)
            .with_refresh_interval(Duration::from_secs(10));
        let session = session(source.clone(), config);
        session.start();
        tokio::time::sleep(Duration::from_millis(10)).await;

        drop(session);
        tokio::time::sleep(Duration::from_secs(100)).await;

        assert_eq!(source.calls(), 1);
    }
}
