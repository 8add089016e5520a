use redis::AsyncCommands;
use redis::Client;

use crate::cache::{backend::RETENTION_TTL_MULTIPLIER, CacheBackend, CacheEntry};
use crate::error::{AppError, AppResult};

/// Creates a Redis client for caching
///
/// Establishes a connection to Redis for fast data caching.
/// Uses connection pooling via the connection-manager feature.
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// Analytics cache entries stored in Redis as JSON
///
/// Redis expires entries at the shared retention (twice the TTL) so
/// expired-but-present entries still show up in cache stats; freshness is
/// always decided from `computed_at`.
#[derive(Clone)]
pub struct RedisCacheBackend {
    redis_client: Client,
}

impl RedisCacheBackend {
    pub fn new(redis_client: Client) -> Self {
        Self { redis_client }
    }

    /// How long Redis keeps an entry, in seconds
    fn retention_secs(ttl_ms: u64) -> u64 {
        (ttl_ms.saturating_mul(RETENTION_TTL_MULTIPLIER as u64) / 1000).max(1)
    }

    /// Turns a literal key prefix into a KEYS pattern
    fn prefix_pattern(prefix: &str) -> String {
        let mut pattern = String::with_capacity(prefix.len() + 1);
        for c in prefix.chars() {
            if matches!(c, '*' | '?' | '[' | ']' | '\\') {
                pattern.push('\\');
            }
            pattern.push(c);
        }
        pattern.push('*');
        pattern
    }

    async fn matching_keys(&self, prefix: &str) -> AppResult<Vec<String>> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let keys: Vec<String> = conn.keys(Self::prefix_pattern(prefix)).await?;
        Ok(keys)
    }
}

#[async_trait::async_trait]
impl CacheBackend for RedisCacheBackend {
    async fn get(&self, key: &str) -> AppResult<Option<CacheEntry>> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let cached: Option<String> = conn.get(key).await?;

        match cached {
            Some(json) => {
                let entry = serde_json::from_str(&json).map_err(|e| {
                    AppError::Internal(format!("Cache deserialization error: {}", e))
                })?;
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    async fn put(&self, entry: CacheEntry) -> AppResult<()> {
        let json = serde_json::to_string(&entry)
            .map_err(|e| AppError::Internal(format!("Cache serialization error: {}", e)))?;
        let retention = Self::retention_secs(entry.ttl_ms);

        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let _: () = conn.set_ex(&entry.key, json, retention).await?;

        tracing::debug!(key = %entry.key, retention_secs = retention, "Cached analytics entry");
        Ok(())
    }

    async fn remove_prefix(&self, prefix: &str) -> AppResult<usize> {
        let keys = self.matching_keys(prefix).await?;
        if keys.is_empty() {
            return Ok(0);
        }

        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let removed: usize = conn.del(&keys).await?;
        Ok(removed)
    }

    async fn entries_with_prefix(&self, prefix: &str) -> AppResult<Vec<CacheEntry>> {
        let keys = self.matching_keys(prefix).await?;
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let values: Vec<Option<String>> = conn.mget(&keys).await?;

        let mut entries = Vec::with_capacity(values.len());
        for json in values.into_iter().flatten() {
            match serde_json::from_str::<CacheEntry>(&json) {
                Ok(entry) => entries.push(entry),
                Err(e) => tracing::warn!(error = %e, "Skipping unreadable cache entry"),
            }
        }
        Ok(entries)
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
