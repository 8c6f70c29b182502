//! User directory: the two questions rooms ask about players.
//!
//! "Does this user exist?" and "what is this user called?". Names are read
//! from the key-value cache first and fall back to the durable users store,
//! repopulating the cache on a miss.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::db::kv::{KeyValueStore, MemoryStore};
use crate::db::pool::DbPool;
use crate::error::ApiError;
use crate::models::user;

/// Durable source of display names.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// `None` when no such user exists.
    async fn display_name(&self, user_id: &str) -> Result<Option<String>, ApiError>;
}

/// Identity checks and name lookups used at the room boundary.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn validate_user(&self, user_id: &str) -> Result<bool, ApiError>;
    async fn resolve_name(&self, user_id: &str) -> Result<String, ApiError>;
}

// ---------------------------------------------------------------------------
// PostgreSQL store
// ---------------------------------------------------------------------------

pub struct PgUserStore {
    db: DbPool,
}

impl PgUserStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn display_name(&self, user_id: &str) -> Result<Option<String>, ApiError> {
        Ok(user::find_by_id(&self.db, user_id).await?.map(|u| u.name))
    }
}

// ---------------------------------------------------------------------------
// In-memory store (tests / local runs)
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryUserStore {
    names: Mutex<HashMap<String, String>>,
    lookups: AtomicUsize,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user_id: &str, name: &str) {
        self.names
            .lock()
            .insert(user_id.to_string(), name.to_string());
    }

    /// Number of `display_name` calls served so far.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn display_name(&self, user_id: &str) -> Result<Option<String>, ApiError> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        Ok(self.names.lock().get(user_id).cloned())
    }
}

// ---------------------------------------------------------------------------
// Cache-first directory
// ---------------------------------------------------------------------------

fn cache_key(user_id: &str) -> String {
    format!("name:{user_id}")
}

pub struct CachedDirectory {
    cache: Arc<dyn KeyValueStore>,
    store: Arc<dyn UserStore>,
    ttl_secs: u64,
}

impl CachedDirectory {
    pub fn new(cache: Arc<dyn KeyValueStore>, store: Arc<dyn UserStore>, ttl_secs: u64) -> Self {
        Self {
            cache,
            store,
            ttl_secs,
        }
    }

    /// A directory over an in-memory cache and users store seeded with
    /// `(id, name)` pairs.
    pub fn in_memory(users: &[(&str, &str)], ttl_secs: u64) -> Self {
        let store = MemoryUserStore::new();
        for (user_id, name) in users {
            store.insert(user_id, name);
        }
        Self::new(Arc::new(MemoryStore::new()), Arc::new(store), ttl_secs)
    }

    async fn lookup(&self, user_id: &str) -> Result<Option<String>, ApiError> {
        let key = cache_key(user_id);
        if let Some(name) = self.cache.get(&key).await? {
            return Ok(Some(name));
        }

        let Some(name) = self.store.display_name(user_id).await? else {
            return Ok(None);
        };

        if let Err(e) = self.cache.set_ex(&key, &name, self.ttl_secs).await {
            tracing::warn!(%user_id, error = %e, "failed to cache display name");
        }
        Ok(Some(name))
    }
}

#[async_trait]
impl UserDirectory for CachedDirectory {
    async fn validate_user(&self, user_id: &str) -> Result<bool, ApiError> {
        if user_id.is_empty() {
            return Ok(false);
        }
        Ok(self.lookup(user_id).await?.is_some())
    }

    async fn resolve_name(&self, user_id: &str) -> Result<String, ApiError> {
        self.lookup(user_id)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("Unknown user {user_id}")))
    }
}
