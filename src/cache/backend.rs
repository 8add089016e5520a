use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::AppResult;

/// Backends keep an entry this many TTLs past its computation, so stats can
/// still report it as expired before it is dropped
pub const RETENTION_TTL_MULTIPLIER: u32 = 2;

/// Minimum spacing between sweeps of the in-process backend
const SWEEP_INTERVAL_SECS: i64 = 60;

/// A stored computation. Replaced whole, never patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub value: serde_json::Value,
    pub computed_at: DateTime<Utc>,
    pub ttl_ms: u64,
    pub generator_fingerprint: String,
}

impl CacheEntry {
    pub fn ttl(&self) -> Duration {
        Duration::milliseconds(self.ttl_ms as i64)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.computed_at + self.ttl()
    }

    /// Expired once strictly more than `ttl` has passed since computation
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.computed_at > self.ttl()
    }

    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        self.expires_at() - now
    }

    pub fn retention(&self) -> Duration {
        self.ttl() * RETENTION_TTL_MULTIPLIER as i32
    }

    /// Past retention; backends may drop it
    pub fn is_evictable(&self, now: DateTime<Utc>) -> bool {
        now - self.computed_at > self.retention()
    }
}

/// Storage behind the analytics cache
#[async_trait::async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> AppResult<Option<CacheEntry>>;

    /// Stores `entry`, replacing any previous entry with the same key
    async fn put(&self, entry: CacheEntry) -> AppResult<()>;

    /// Removes every entry whose key starts with `prefix`, returning how many were removed
    async fn remove_prefix(&self, prefix: &str) -> AppResult<usize>;

    async fn entries_with_prefix(&self, prefix: &str) -> AppResult<Vec<CacheEntry>>;

    fn name(&self) -> &'static str;
}

#[derive(Debug, Default)]
struct MemoryState {
    entries: HashMap<String, CacheEntry>,
    last_sweep: Option<DateTime<Utc>>,
}

/// In-process backend. Writes sweep out entries past retention, at most once
/// per sweep interval of cache time.
#[derive(Debug, Default)]
pub struct MemoryCacheBackend {
    state: RwLock<MemoryState>,
}

impl MemoryCacheBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CacheBackend for MemoryCacheBackend {
    async fn get(&self, key: &str) -> AppResult<Option<CacheEntry>> {
        Ok(self.state.read().await.entries.get(key).cloned())
    }

    async fn put(&self, entry: CacheEntry) -> AppResult<()> {
        let mut state = self.state.write().await;
        let now = entry.computed_at;

        let due = state
            .last_sweep
            .map_or(true, |last| now - last >= Duration::seconds(SWEEP_INTERVAL_SECS));
        if due {
            let before = state.entries.len();
            state.entries.retain(|_, e| !e.is_evictable(now));
            state.last_sweep = Some(now);
            let evicted = before - state.entries.len();
            if evicted > 0 {
                tracing::debug!(evicted, remaining = state.entries.len(), "Swept cache entries past retention");
            }
        }

        state.entries.insert(entry.key.clone(), entry);
        Ok(())
    }

    async fn remove_prefix(&self, prefix: &str) -> AppResult<usize> {
        let mut state = self.state.write().await;
        let before = state.entries.len();
        state.entries.retain(|key, _| !key.starts_with(prefix));
        Ok(before - state.entries.len())
    }

    async fn entries_with_prefix(&self, prefix: &str) -> AppResult<Vec<CacheEntry>> {
        Ok(self
            .state
            .read()
            .await
            .entries
            .values()
            .filter(|entry| entry.key.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
