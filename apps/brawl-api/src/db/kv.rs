use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::error::ApiError;

/// Abstraction over the short-lived key-value cache (display names).
///
/// Backed by Redis in production and an in-memory map in tests and local
/// runs without `REDIS_URL`.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), ApiError>;
    async fn get(&self, key: &str) -> Result<Option<String>, ApiError>;
    async fn del(&self, key: &str) -> Result<(), ApiError>;
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

pub struct MemoryStore {
    data: Mutex<HashMap<String, (String, Instant)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            data: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), ApiError> {
        let expires_at = Instant::now() + Duration::from_secs(ttl_secs);
        self.data
            .lock()
            .insert(key.to_string(), (value.to_string(), expires_at));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, ApiError> {
        let mut data = self.data.lock();
        match data.get(key) {
            Some((_, expires_at)) if *expires_at <= Instant::now() => {
                data.remove(key);
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value.clone())),
            None => Ok(None),
        }
    }

    async fn del(&self, key: &str) -> Result<(), ApiError> {
        self.data.lock().remove(key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Redis implementation
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connect and ask Redis to evict only keys that carry a TTL.
    pub async fn connect(redis_url: &str) -> Result<Self, ApiError> {
        let client = redis::Client::open(redis_url).map_err(|e| {
            tracing::error!(?e, "invalid redis url");
            ApiError::internal("Cache unavailable")
        })?;
        let mut conn = ConnectionManager::new(client).await.map_err(|e| {
            tracing::error!(?e, "redis connect failed");
            ApiError::internal("Cache unavailable")
        })?;

        // Managed Redis often forbids CONFIG; the cache still works without it.
        let policy: Result<(), redis::RedisError> = redis::cmd("CONFIG")
            .arg("SET")
            .arg("maxmemory-policy")
            .arg("volatile-lru")
            .query_async(&mut conn)
            .await;
        if let Err(e) = policy {
            tracing::warn!(?e, "could not set redis eviction policy");
        }

        tracing::info!("connected to redis");
        Ok(Self { conn })
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), ApiError> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl_secs)
            .await
            .map_err(|e| {
                tracing::error!(?e, "redis set failed");
                ApiError::internal("Cache unavailable")
            })
    }

    async fn get(&self, key: &str) -> Result<Option<String>, ApiError> {
        let mut conn = self.conn.clone();
        conn.get::<_, Option<String>>(key).await.map_err(|e| {
            tracing::error!(?e, "redis get failed");
            ApiError::internal("Cache unavailable")
        })
    }

    async fn del(&self, key: &str) -> Result<(), ApiError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await.map_err(|e| {
            tracing::error!(?e, "redis del failed");
            ApiError::internal("Cache unavailable")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryStore::new();
        store.set_ex("name:u1", "Fuzzy Peach", 60).await.unwrap();
        assert_eq!(
            store.get("name:u1").await.unwrap().as_deref(),
            Some("Fuzzy Peach")
        );

        store.del("name:u1").await.unwrap();
        assert!(store.get("name:u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn memory_store_expires_entries() {
        let store = MemoryStore::new();
        store.set_ex("name:u1", "Fuzzy Peach", 0).await.unwrap();
        assert!(store.get("name:u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn malformed_redis_url_is_an_internal_error() {
        let err = RedisStore::connect("not a redis url").await.err();
        let err = err.expect("connect should fail");
        assert_eq!(err.status, axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "Cache unavailable");
    }
}
