//! Cache service used by the mapping manager.
//!
//! The cache is a non-authoritative projection of the mapping store. Every
//! failure here is reported as a [`CacheError`] and the manager degrades to a
//! store read.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use thiserror::Error;

use crate::types::EntityType;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),
    #[error("cache operation timed out")]
    Timeout,
}

/// Key/value cache with a per-key TTL.
#[async_trait]
pub trait MappingCache: Send + Sync {
    /// Establishes the connection to the backing cache, if there is one.
    async fn connect(&self) -> Result<(), CacheError> {
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Removes every key starting with `prefix` and returns how many were dropped.
    async fn delete_prefix(&self, prefix: &str) -> Result<usize, CacheError>;
}

/// Builds the two namespaced keys kept per mapping.
#[derive(Debug, Clone)]
pub struct CacheKeys {
    prefix: String,
}

impl CacheKeys {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    /// Common prefix of every key belonging to `entity_type`.
    pub fn region(&self, entity_type: EntityType) -> String {
        format!("{}:{}:", self.prefix, entity_type.as_str())
    }

    /// Key whose value is the internal id.
    pub fn external(&self, entity_type: EntityType, external_id: &str) -> String {
        format!("{}ext:{}", self.region(entity_type), external_id)
    }

    /// Key whose value is the external id.
    pub fn internal(&self, entity_type: EntityType, internal_id: &str) -> String {
        format!("{}int:{}", self.region(entity_type), internal_id)
    }
}

struct CacheEntry {
    value: String,
    expires_at: Instant,
}

/// In-process LRU cache honouring per-key expiry.
pub struct LruMappingCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
}

impl LruMappingCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self { entries: Mutex::new(LruCache::new(capacity)) }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, LruCache<String, CacheEntry>>, CacheError> {
        self.entries.lock().map_err(|e| CacheError::Unavailable(format!("cache lock poisoned: {}", e)))
    }

    pub fn len(&self) -> usize {
        self.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MappingCache for LruMappingCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut cache = self.lock()?;
        let now = Instant::now();
        let expired = match cache.get(key) {
            Some(entry) if entry.expires_at > now => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            cache.pop(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut cache = self.lock()?;
        cache.put(key.to_string(), CacheEntry { value: value.to_string(), expires_at: Instant::now() + ttl });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.lock()?.pop(key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize, CacheError> {
        let mut cache = self.lock()?;
        let doomed: Vec<String> = cache.iter().filter(|(k, _)| k.starts_with(prefix)).map(|(k, _)| k.clone()).collect();
        for key in &doomed {
            cache.pop(key);
        }
        Ok(doomed.len())
    }
}
