//! Short-lived shared state behind a cache seam.
//!
//! Nonces, emailed verify codes, scheduler endpoint configs and share visit
//! counters all live here. Deployments run `RedisCache`; tests and
//! single-node setups run `MemoryCache`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

use crate::errors::{ApiError, ErrorCode};

pub type Result<T> = std::result::Result<T, CacheError>;

#[derive(Error, Debug)]
#[error("cache error: {0}")]
pub struct CacheError(pub String);

impl From<CacheError> for ApiError {
    fn from(err: CacheError) -> Self {
        tracing::error!("{err}");
        ApiError::Code(ErrorCode::InternalServer)
    }
}

#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;
    async fn del(&self, key: &str) -> Result<()>;
    /// Increments a counter, setting `ttl` when the key is created.
    async fn incr(&self, key: &str, ttl: Duration) -> Result<i64>;
}

pub fn nonce_key(kind: &str, username: &str) -> String {
    format!("portal::nonce::{kind}::{username}")
}

pub fn sched_cfg_key(area_id: &str) -> String {
    format!("portal::sched::cfg::{area_id}")
}

/// Index of every area that has an endpoint config registered.
pub const SCHED_AREAS_KEY: &str = "portal::sched::areas";

pub fn upload_pass_key(username: &str) -> String {
    format!("portal::upload::pass::{username}")
}

pub fn download_hour_key(hash: &str, hour: &str) -> String {
    format!("portal::download::{hash}::{hour}")
}

// ---------------------------------------------------------------------------
// Redis

pub struct RedisCache {
    manager: redis::aio::ConnectionManager,
}

impl RedisCache {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| CacheError(e.to_string()))?;
        let manager = client
            .get_connection_manager()
            .await
            .map_err(|e| CacheError(e.to_string()))?;
        Ok(Self { manager })
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        use redis::AsyncCommands;
        let mut conn = self.manager.clone();
        conn.get(key).await.map_err(|e| CacheError(e.to_string()))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        use redis::AsyncCommands;
        let mut conn = self.manager.clone();
        conn.set_ex(key, value, ttl.as_secs())
            .await
            .map_err(|e| CacheError(e.to_string()))
    }

    async fn del(&self, key: &str) -> Result<()> {
        use redis::AsyncCommands;
        let mut conn = self.manager.clone();
        conn.del(key).await.map_err(|e| CacheError(e.to_string()))
    }

    async fn incr(&self, key: &str, ttl: Duration) -> Result<i64> {
        use redis::AsyncCommands;
        let mut conn = self.manager.clone();
        let n: i64 = conn
            .incr(key, 1)
            .await
            .map_err(|e| CacheError(e.to_string()))?;
        if n == 1 {
            let _: bool = conn
                .expire(key, ttl.as_secs() as i64)
                .await
                .map_err(|e| CacheError(e.to_string()))?;
        }
        Ok(n)
    }
}

// ---------------------------------------------------------------------------
// In-memory

#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, Entry>,
}

struct Entry {
    value: String,
    expires_at: Instant,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn live_value(&self, key: &str) -> Option<String> {
        let expired = match self.entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove(key);
        }
        None
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.live_value(key))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn incr(&self, key: &str, ttl: Duration) -> Result<i64> {
        let current = self
            .live_value(key)
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(0);
        let next = current + 1;
        // Matches the Redis behavior: the TTL is set on creation only.
        let expires_at = self
            .entries
            .get(key)
            .map(|e| e.expires_at)
            .filter(|at| *at > Instant::now())
            .unwrap_or_else(|| Instant::now() + ttl);
        self.entries.insert(
            key.to_string(),
            Entry {
                value: next.to_string(),
                expires_at,
            },
        );
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_cache_round_trips() {
        let cache = MemoryCache::new();
        cache
            .set_ex("k", "v", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));

        cache.del("k").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn memory_cache_expires() {
        let cache = MemoryCache::new();
        cache
            .set_ex("k", "v", Duration::from_millis(10))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn incr_counts_and_keeps_ttl() {
        let cache = MemoryCache::new();
        assert_eq!(cache.incr("n", Duration::from_secs(60)).await.unwrap(), 1);
        assert_eq!(cache.incr("n", Duration::from_secs(60)).await.unwrap(), 2);
        assert_eq!(cache.get("n").await.unwrap().as_deref(), Some("2"));
    }
}
