//! Cache-aside store for expensive per-subject computations.
//!
//! Callers hand [`AnalyticsCache::get_or_generate`] a key, a generator and a TTL.
//! Fresh entries are served directly; misses and expired entries run the
//! generator under a per-key lock so concurrent misses on the same key share a
//! single generation. Hits close to expiry schedule a refresh on a spawned task.

pub mod backend;
pub mod clock;
pub mod key;

pub use backend::{CacheBackend, CacheEntry, MemoryCacheBackend};
pub use clock::{Clock, ManualClock, SystemClock};
pub use key::CacheKey;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::error::{AppError, AppResult};

pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(4);
pub const DEFAULT_REFRESH_THRESHOLD_RATIO: f64 = 0.1;

#[derive(Debug, Clone, Copy)]
pub struct CacheSettings {
    /// Wall-clock budget for one generation
    pub generation_timeout: Duration,
    /// Hits within this fraction of the TTL before expiry trigger a background refresh
    pub refresh_threshold_ratio: f64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            generation_timeout: DEFAULT_GENERATION_TIMEOUT,
            refresh_threshold_ratio: DEFAULT_REFRESH_THRESHOLD_RATIO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheOptions {
    pub ttl: Duration,
    pub force_refresh: bool,
}

impl CacheOptions {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            force_refresh: false,
        }
    }

    pub fn force_refresh(mut self, force: bool) -> Self {
        self.force_refresh = force;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CachePerformance {
    pub duration_ms: u64,
    pub cache_hit: bool,
    pub computed_at: DateTime<Utc>,
    pub backend: &'static str,
}

#[derive(Debug, Clone)]
pub struct CachedValue<T> {
    pub value: T,
    pub cached: bool,
    pub performance: CachePerformance,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub subject_id: String,
    pub total_entries: usize,
    pub expired_entries: usize,
    pub backend: &'static str,
}

type KeyLock = Arc<tokio::sync::Mutex<()>>;

/// Generations running for one subject, and how often the subject was
/// invalidated while any of them ran. Only present while `active > 0`.
#[derive(Debug, Default)]
struct SubjectGenerations {
    active: usize,
    epoch: u64,
}

struct CacheInner {
    backend: Arc<dyn CacheBackend>,
    clock: Arc<dyn Clock>,
    settings: CacheSettings,
    key_locks: Mutex<HashMap<String, KeyLock>>,
    refreshing: Mutex<HashSet<String>>,
    in_flight: Mutex<HashMap<String, SubjectGenerations>>,
    /// Stores take it shared, invalidation exclusively, so an invalidation
    /// can never land between a generation's epoch check and its write
    store_gate: tokio::sync::RwLock<()>,
}

/// Registration of one running generation. Dropping it, including through
/// cancellation, unregisters the generation.
struct GenerationTicket<'a> {
    inner: &'a CacheInner,
    subject_id: String,
    epoch: u64,
}

impl<'a> GenerationTicket<'a> {
    fn issue(inner: &'a CacheInner, subject_id: &str) -> Self {
        let mut in_flight = inner.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        let generations = in_flight.entry(subject_id.to_string()).or_default();
        generations.active += 1;
        Self {
            inner,
            subject_id: subject_id.to_string(),
            epoch: generations.epoch,
        }
    }

    /// False once the subject was invalidated after this generation started
    fn is_current(&self) -> bool {
        self.inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&self.subject_id)
            .is_some_and(|g| g.epoch == self.epoch)
    }
}

impl Drop for GenerationTicket<'_> {
    fn drop(&mut self) {
        let mut in_flight = self
            .inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(generations) = in_flight.get_mut(&self.subject_id) {
            generations.active -= 1;
            if generations.active == 0 {
                in_flight.remove(&self.subject_id);
            }
        }
    }
}

/// Process-scoped analytics cache. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct AnalyticsCache {
    inner: Arc<CacheInner>,
}

impl AnalyticsCache {
    pub fn new(
        backend: Arc<dyn CacheBackend>,
        clock: Arc<dyn Clock>,
        settings: CacheSettings,
    ) -> Self {
        tracing::info!(
            backend = backend.name(),
            generation_timeout_ms = settings.generation_timeout.as_millis() as u64,
            refresh_threshold_ratio = settings.refresh_threshold_ratio,
            "Analytics cache initialized"
        );

        Self {
            inner: Arc::new(CacheInner {
                backend,
                clock,
                settings,
                key_locks: Mutex::new(HashMap::new()),
                refreshing: Mutex::new(HashSet::new()),
                in_flight: Mutex::new(HashMap::new()),
                store_gate: tokio::sync::RwLock::new(()),
            }),
        }
    }

    /// In-process cache on the wall clock with default settings
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryCacheBackend::new()),
            Arc::new(SystemClock),
            CacheSettings::default(),
        )
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.inner.clock.clone()
    }

    /// Returns the cached value for `key`, generating and storing it when the
    /// entry is missing, expired, or `force_refresh` is set.
    ///
    /// Generator failures are returned to this caller only and leave any
    /// previously stored entry in place.
    pub async fn get_or_generate<T, F, Fut>(
        &self,
        key: &CacheKey,
        generate: F,
        opts: CacheOptions,
    ) -> AppResult<CachedValue<T>>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = AppResult<T>> + Send + 'static,
    {
        let started = Instant::now();
        let key_str = key.to_string();
        let fingerprint = fingerprint_of::<T>();

        if !opts.force_refresh {
            if let Some((value, entry)) = self.read_fresh::<T>(&key_str, &fingerprint).await {
                tracing::debug!(key = %key_str, "Cache hit");
                if self.near_expiry(&entry) {
                    self.schedule_background_refresh(key, generate, opts);
                }
                return Ok(self.hit(value, &entry, started));
            }
        }

        let lock = self.key_lock(&key_str);
        let guard = lock.lock().await;

        // Another caller may have generated this key while we waited for the lock
        if !opts.force_refresh {
            if let Some((value, entry)) = self.read_fresh::<T>(&key_str, &fingerprint).await {
                drop(guard);
                self.release_key_lock(&key_str, lock);
                tracing::debug!(key = %key_str, "Cache hit after coalesced generation");
                return Ok(self.hit(value, &entry, started));
            }
        }

        tracing::debug!(key = %key_str, force_refresh = opts.force_refresh, "Cache miss");
        let result = self
            .generate_and_store(key, &fingerprint, opts.ttl, generate)
            .await;

        drop(guard);
        self.release_key_lock(&key_str, lock);

        let (value, computed_at) = result?;
        Ok(CachedValue {
            value,
            cached: false,
            performance: CachePerformance {
                duration_ms: started.elapsed().as_millis() as u64,
                cache_hit: false,
                computed_at,
                backend: self.inner.backend.name(),
            },
        })
    }

    /// Recomputes `key` on a spawned task without blocking the caller.
    ///
    /// At most one background refresh per key runs at a time; further requests
    /// while one is in flight are dropped.
    pub fn schedule_background_refresh<T, F, Fut>(
        &self,
        key: &CacheKey,
        generate: F,
        opts: CacheOptions,
    ) where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = AppResult<T>> + Send + 'static,
    {
        let key_str = key.to_string();
        {
            let mut refreshing = self
                .inner
                .refreshing
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if !refreshing.insert(key_str.clone()) {
                return;
            }
        }

        tracing::debug!(key = %key_str, "Scheduling background refresh");

        let cache = self.clone();
        let key = key.clone();
        tokio::spawn(async move {
            let fingerprint = fingerprint_of::<T>();
            let lock = cache.key_lock(&key_str);
            let guard = lock.lock().await;

            match cache
                .generate_and_store(&key, &fingerprint, opts.ttl, generate)
                .await
            {
                Ok(_) => tracing::debug!(key = %key_str, "Background refresh completed"),
                Err(e) => {
                    tracing::warn!(key = %key_str, error = %e, "Background refresh failed")
                }
            }

            drop(guard);
            cache.release_key_lock(&key_str, lock);
            cache
                .inner
                .refreshing
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&key_str);
        });
    }

    /// Drops every cached computation for one subject. Generations already
    /// running for the subject still answer their callers but do not store.
    pub async fn clear_user_cache(&self, subject_id: &str) -> AppResult<usize> {
        let _gate = self.inner.store_gate.write().await;
        self.invalidate_in_flight(subject_id);

        let removed = self
            .inner
            .backend
            .remove_prefix(&CacheKey::subject_prefix(subject_id))
            .await?;

        tracing::info!(subject_id = %subject_id, removed, "Cleared subject cache");
        Ok(removed)
    }

    fn invalidate_in_flight(&self, subject_id: &str) {
        let mut in_flight = self
            .inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(generations) = in_flight.get_mut(subject_id) {
            generations.epoch += 1;
        }
    }

    pub async fn get_cache_stats(&self, subject_id: &str) -> AppResult<CacheStats> {
        let entries = self
            .inner
            .backend
            .entries_with_prefix(&CacheKey::subject_prefix(subject_id))
            .await?;
        let now = self.inner.clock.now();

        Ok(CacheStats {
            subject_id: subject_id.to_string(),
            total_entries: entries.len(),
            expired_entries: entries.iter().filter(|e| e.is_expired(now)).count(),
            backend: self.inner.backend.name(),
        })
    }

    /// Reads `key` if present, unexpired and produced by the same generator type.
    /// Backend read failures are treated as misses.
    async fn read_fresh<T: DeserializeOwned>(
        &self,
        key: &str,
        fingerprint: &str,
    ) -> Option<(T, CacheEntry)> {
        let entry = match self.inner.backend.get(key).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache read failed, treating as miss");
                return None;
            }
        };

        if entry.generator_fingerprint != fingerprint {
            tracing::debug!(key = %key, "Cached entry produced by a different generator");
            return None;
        }
        if entry.is_expired(self.inner.clock.now()) {
            return None;
        }

        match serde_json::from_value(entry.value.clone()) {
            Ok(value) => Some((value, entry)),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache deserialization error");
                None
            }
        }
    }

    fn near_expiry(&self, entry: &CacheEntry) -> bool {
        let ratio = self.inner.settings.refresh_threshold_ratio;
        if ratio <= 0.0 {
            return false;
        }
        let threshold_ms = entry.ttl_ms as f64 * ratio;
        let remaining_ms = entry.remaining(self.inner.clock.now()).num_milliseconds() as f64;
        remaining_ms <= threshold_ms
    }

    async fn generate_and_store<T, F, Fut>(
        &self,
        cache_key: &CacheKey,
        fingerprint: &str,
        ttl: Duration,
        generate: F,
    ) -> AppResult<(T, DateTime<Utc>)>
    where
        T: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let key_str = cache_key.to_string();
        let key = key_str.as_str();
        let ticket = GenerationTicket::issue(&self.inner, cache_key.subject_id());

        let value = match tokio::time::timeout(self.inner.settings.generation_timeout, generate())
            .await
        {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => {
                tracing::warn!(key = %key, error = %e, "Cache generation failed");
                return Err(wrap_generation_error(key, e));
            }
            Err(_) => {
                tracing::warn!(
                    key = %key,
                    timeout_ms = self.inner.settings.generation_timeout.as_millis() as u64,
                    "Cache generation timed out"
                );
                return Err(AppError::DependencyTimeout(format!(
                    "generation of {} exceeded {:?}",
                    key, self.inner.settings.generation_timeout
                )));
            }
        };

        let json = serde_json::to_value(&value)
            .map_err(|e| AppError::Internal(format!("Cache serialization error: {}", e)))?;
        let computed_at = self.inner.clock.now();

        let entry = CacheEntry {
            key: key.to_string(),
            value: json,
            computed_at,
            ttl_ms: ttl.as_millis() as u64,
            generator_fingerprint: fingerprint.to_string(),
        };

        let _gate = self.inner.store_gate.read().await;
        if !ticket.is_current() {
            tracing::debug!(key = %key, "Subject invalidated during generation, not storing");
        } else if let Err(e) = self.inner.backend.put(entry).await {
            tracing::error!(key = %key, error = %e, "Failed to write cache entry");
        }

        Ok((value, computed_at))
    }

    fn hit<T>(&self, value: T, entry: &CacheEntry, started: Instant) -> CachedValue<T> {
        CachedValue {
            value,
            cached: true,
            performance: CachePerformance {
                duration_ms: started.elapsed().as_millis() as u64,
                cache_hit: true,
                computed_at: entry.computed_at,
                backend: self.inner.backend.name(),
            },
        }
    }

    fn key_lock(&self, key: &str) -> KeyLock {
        self.inner
            .key_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.to_string())
            .or_default()
            .clone()
    }

    /// Forgets the per-key lock once nobody else holds a handle to it
    fn release_key_lock(&self, key: &str, lock: KeyLock) {
        let mut locks = self
            .inner
            .key_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // one reference in the map, one in `lock`
        if Arc::strong_count(&lock) <= 2 {
            locks.remove(key);
        }
    }
}

fn fingerprint_of<T>() -> String {
    std::any::type_name::<T>().to_string()
}

/// Lookup and dependency errors keep their identity; anything else the
/// generator raised becomes a generation failure for this key.
fn wrap_generation_error(key: &str, error: AppError) -> AppError {
    match error {
        AppError::NotFound(_) | AppError::CacheGeneration { .. } => error,
        e if e.is_dependency_failure() => e,
        other => AppError::CacheGeneration {
            key: key.to_string(),
            reason: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_test::{assert_err, assert_ok};

    const TTL: Duration = Duration::from_secs(60);

    fn manual_cache(refresh_ratio: f64) -> (AnalyticsCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        ));
        let cache = AnalyticsCache::new(
            Arc::new(MemoryCacheBackend::new()),
            clock.clone(),
            CacheSettings {
                generation_timeout: Duration::from_secs(2),
                refresh_threshold_ratio: refresh_ratio,
            },
        );
        (cache, clock)
    }

    fn counting(counter: &Arc<AtomicUsize>) -> impl FnOnce() -> std::future::Ready<AppResult<usize>> {
        let counter = counter.clone();
        move || std::future::ready(Ok(counter.fetch_add(1, Ordering::SeqCst) + 1))
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let (cache, _clock) = manual_cache(0.0);
        let key = CacheKey::new("u1", "comprehensive");
        let calls = Arc::new(AtomicUsize::new(0));

        let first = assert_ok!(
            cache
                .get_or_generate(&key, counting(&calls), CacheOptions::with_ttl(TTL))
                .await
        );
        assert!(!first.cached);
        assert_eq!(first.value, 1);

        let second = assert_ok!(
            cache
                .get_or_generate(&key, counting(&calls), CacheOptions::with_ttl(TTL))
                .await
        );
        assert!(second.cached);
        assert!(second.performance.cache_hit);
        assert_eq!(second.value, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_ttl_boundary() {
        let (cache, clock) = manual_cache(0.0);
        let key = CacheKey::new("u1", "comprehensive");
        let calls = Arc::new(AtomicUsize::new(0));
        let opts = CacheOptions::with_ttl(TTL);

        cache.get_or_generate(&key, counting(&calls), opts).await.unwrap();

        clock.advance(chrono::Duration::seconds(59));
        let before = cache.get_or_generate(&key, counting(&calls), opts).await.unwrap();
        assert!(before.cached);

        clock.advance(chrono::Duration::seconds(2));
        let after = cache.get_or_generate(&key, counting(&calls), opts).await.unwrap();
        assert!(!after.cached);
        assert_eq!(after.value, 2);
    }

    #[tokio::test]
    async fn test_force_refresh_always_generates() {
        let (cache, _clock) = manual_cache(0.0);
        let key = CacheKey::new("u1", "comprehensive");
        let calls = Arc::new(AtomicUsize::new(0));
        let opts = CacheOptions::with_ttl(TTL);

        cache.get_or_generate(&key, counting(&calls), opts).await.unwrap();
        let forced = cache
            .get_or_generate(&key, counting(&calls), opts.force_refresh(true))
            .await
            .unwrap();
        assert!(!forced.cached);
        assert_eq!(forced.value, 2);

        let next = cache.get_or_generate(&key, counting(&calls), opts).await.unwrap();
        assert!(next.cached);
        assert_eq!(next.value, 2);
    }

    #[tokio::test]
    async fn test_concurrent_misses_share_one_generation() {
        let (cache, _clock) = manual_cache(0.0);
        let key = CacheKey::new("u1", "comprehensive");
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let key = key.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_generate(
                        &key,
                        move || async move {
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            Ok(calls.fetch_add(1, Ordering::SeqCst) + 100)
                        },
                        CacheOptions::with_ttl(TTL),
                    )
                    .await
            }));
        }

        let mut values = Vec::new();
        for handle in handles {
            values.push(handle.await.unwrap().unwrap().value);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(values.iter().all(|v| *v == 100));
    }

    #[tokio::test]
    async fn test_generation_running_during_invalidation_is_not_stored() {
        let (cache, _clock) = manual_cache(0.0);
        let key = CacheKey::new("u1", "comprehensive");
        let opts = CacheOptions::with_ttl(TTL);
        let release = Arc::new(tokio::sync::Notify::new());
        let (started_tx, started_rx) = tokio::sync::oneshot::channel();

        let pending = {
            let cache = cache.clone();
            let key = key.clone();
            let release = release.clone();
            tokio::spawn(async move {
                cache
                    .get_or_generate(
                        &key,
                        move || async move {
                            let _ = started_tx.send(());
                            release.notified().await;
                            Ok("old-history".to_string())
                        },
                        opts,
                    )
                    .await
            })
        };

        started_rx.await.unwrap();
        assert_eq!(cache.clear_user_cache("u1").await.unwrap(), 0);
        release.notify_one();

        // the waiting caller still gets its value
        let stale = pending.await.unwrap().unwrap();
        assert!(!stale.cached);
        assert_eq!(stale.value, "old-history");

        let after = cache
            .get_or_generate(&key, || async { Ok("new-history".to_string()) }, opts)
            .await
            .unwrap();
        assert!(!after.cached);
        assert_eq!(after.value, "new-history");
        assert!(cache.inner.in_flight.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalidating_one_subject_keeps_others_generating() {
        let (cache, _clock) = manual_cache(0.0);
        let opts = CacheOptions::with_ttl(TTL);
        let release = Arc::new(tokio::sync::Notify::new());
        let (started_tx, started_rx) = tokio::sync::oneshot::channel();

        let pending = {
            let cache = cache.clone();
            let release = release.clone();
            tokio::spawn(async move {
                cache
                    .get_or_generate(
                        &CacheKey::new("u2", "comprehensive"),
                        move || async move {
                            let _ = started_tx.send(());
                            release.notified().await;
                            Ok(2usize)
                        },
                        opts,
                    )
                    .await
            })
        };

        started_rx.await.unwrap();
        cache.clear_user_cache("u1").await.unwrap();
        release.notify_one();
        pending.await.unwrap().unwrap();

        let stats = cache.get_cache_stats("u2").await.unwrap();
        assert_eq!(stats.total_entries, 1);
    }

    #[tokio::test]
    async fn test_generation_failure_keeps_previous_entry() {
        let (cache, clock) = manual_cache(0.0);
        let key = CacheKey::new("u1", "comprehensive");
        let opts = CacheOptions::with_ttl(TTL);

        cache
            .get_or_generate(&key, || async { Ok(7usize) }, opts)
            .await
            .unwrap();

        let err = assert_err!(
            cache
                .get_or_generate(
                    &key,
                    || async { Err::<usize, _>(AppError::Internal("model crashed".to_string())) },
                    opts.force_refresh(true),
                )
                .await
        );
        assert!(matches!(err, AppError::CacheGeneration { .. }));

        clock.advance(chrono::Duration::seconds(1));
        let still = cache
            .get_or_generate(&key, || async { Ok(8usize) }, opts)
            .await
            .unwrap();
        assert!(still.cached);
        assert_eq!(still.value, 7);
    }

    #[tokio::test]
    async fn test_failure_on_one_key_does_not_affect_another() {
        let (cache, _clock) = manual_cache(0.0);
        let opts = CacheOptions::with_ttl(TTL);
        let bad = CacheKey::new("u1", "comprehensive");
        let good = CacheKey::new("u1", "family_analysis");

        let (bad_result, good_result) = tokio::join!(
            cache.get_or_generate(
                &bad,
                || async { Err::<usize, _>(AppError::Internal("boom".to_string())) },
                opts,
            ),
            cache.get_or_generate(&good, || async { Ok(3usize) }, opts),
        );

        assert!(bad_result.is_err());
        assert_eq!(good_result.unwrap().value, 3);
    }

    #[tokio::test]
    async fn test_slow_generation_times_out() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = AnalyticsCache::new(
            Arc::new(MemoryCacheBackend::new()),
            clock,
            CacheSettings {
                generation_timeout: Duration::from_millis(20),
                refresh_threshold_ratio: 0.0,
            },
        );
        let key = CacheKey::new("u1", "comprehensive");

        let err = cache
            .get_or_generate(
                &key,
                || async {
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    Ok(1usize)
                },
                CacheOptions::with_ttl(TTL),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DependencyTimeout(_)));
    }

    #[tokio::test]
    async fn test_hit_near_expiry_refreshes_in_background() {
        let (cache, clock) = manual_cache(0.1);
        let key = CacheKey::new("u1", "comprehensive");
        let calls = Arc::new(AtomicUsize::new(0));
        let opts = CacheOptions::with_ttl(TTL);

        cache.get_or_generate(&key, counting(&calls), opts).await.unwrap();

        // 57s into a 60s TTL: inside the last 10%
        clock.advance(chrono::Duration::seconds(57));
        let hit = cache.get_or_generate(&key, counting(&calls), opts).await.unwrap();
        assert!(hit.cached);
        assert_eq!(hit.value, 1);

        for _ in 0..50 {
            if calls.load(Ordering::SeqCst) == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        // let the spawned task finish writing
        tokio::time::sleep(Duration::from_millis(20)).await;

        // the refreshed entry is good for another full TTL from t+57s
        clock.advance(chrono::Duration::seconds(30));
        let refreshed = cache.get_or_generate(&key, counting(&calls), opts).await.unwrap();
        assert!(refreshed.cached);
        assert_eq!(refreshed.value, 2);
    }

    #[tokio::test]
    async fn test_hit_far_from_expiry_does_not_refresh() {
        let (cache, clock) = manual_cache(0.1);
        let key = CacheKey::new("u1", "comprehensive");
        let calls = Arc::new(AtomicUsize::new(0));
        let opts = CacheOptions::with_ttl(TTL);

        cache.get_or_generate(&key, counting(&calls), opts).await.unwrap();
        clock.advance(chrono::Duration::seconds(30));
        cache.get_or_generate(&key, counting(&calls), opts).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_clear_user_cache_and_stats() {
        let (cache, clock) = manual_cache(0.0);
        let opts = CacheOptions::with_ttl(TTL);
        for kind in ["comprehensive", "family_analysis"] {
            cache
                .get_or_generate(&CacheKey::new("u1", kind), || async { Ok(1usize) }, opts)
                .await
                .unwrap();
        }
        cache
            .get_or_generate(
                &CacheKey::new("u1", "accord_profile"),
                || async { Ok(1usize) },
                CacheOptions::with_ttl(Duration::from_secs(5)),
            )
            .await
            .unwrap();
        cache
            .get_or_generate(&CacheKey::new("u2", "comprehensive"), || async { Ok(1usize) }, opts)
            .await
            .unwrap();

        clock.advance(chrono::Duration::seconds(10));
        let stats = cache.get_cache_stats("u1").await.unwrap();
        assert_eq!(stats.total_entries, 3);
        assert_eq!(stats.expired_entries, 1);

        assert_eq!(cache.clear_user_cache("u1").await.unwrap(), 3);
        assert_eq!(cache.get_cache_stats("u1").await.unwrap().total_entries, 0);
        assert_eq!(cache.get_cache_stats("u2").await.unwrap().total_entries, 1);
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Other {
        label: String,
    }

    #[tokio::test]
    async fn test_entry_from_other_generator_type_is_regenerated() {
        let (cache, _clock) = manual_cache(0.0);
        let key = CacheKey::new("u1", "comprehensive");
        let opts = CacheOptions::with_ttl(TTL);

        cache
            .get_or_generate(&key, || async { Ok(1usize) }, opts)
            .await
            .unwrap();
        let other = cache
            .get_or_generate(
                &key,
                || async {
                    Ok(Other {
                        label: "x".to_string(),
                    })
                },
                opts,
            )
            .await
            .unwrap();
        assert!(!other.cached);
        assert_eq!(other.value.label, "x");
    }
}
