//! Shared fixtures and test doubles.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use crate::config::{AppConfig, DatabaseConfig, MappingConfig, ServerConfig};
use crate::db;
use crate::mapping::{
    CacheError, EntityExistence, EntityOracles, LookupKey, LruMappingCache, MappingCache, MappingError, MappingManager,
    MappingResult, MappingStore, MappingUpdate, SqliteMappingStore,
};
use crate::metrics::Metrics;
use crate::types::{EntityType, GroupStats, Mapping};

pub fn test_mapping_config() -> MappingConfig {
    MappingConfig { enable_cleanup: false, batch_size: 2, ..MappingConfig::default() }
}

pub fn test_config(db_url: &str) -> AppConfig {
    AppConfig {
        server: ServerConfig { host: "127.0.0.1".to_string(), port: 8080 },
        database: DatabaseConfig { url: db_url.to_string(), max_connections: 1 },
        mapping: test_mapping_config(),
    }
}

/// Single-connection in-memory database with the schema applied.
pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    db::init_db(&pool).await.unwrap();
    pool
}

pub async fn insert_domain_row(pool: &SqlitePool, entity_type: EntityType, id: &str) {
    sqlx::query(&format!("INSERT INTO {} (id) VALUES (?1)", entity_type.table()))
        .bind(id)
        .execute(pool)
        .await
        .unwrap();
}

/// Initialized manager over SQLite, the LRU cache and SQL oracles.
pub async fn sqlite_manager(pool: &SqlitePool, config: MappingConfig) -> Arc<MappingManager> {
    let manager = Arc::new(MappingManager::new(
        Arc::new(SqliteMappingStore::new(pool.clone())),
        Arc::new(LruMappingCache::new(config.cache_capacity)),
        EntityOracles::sqlite(pool),
        config,
        Metrics::new(),
    ));
    manager.initialize().await.unwrap();
    manager
}

/// In-memory store counting its lookups. Enforces no uniqueness, so it can
/// hold duplicates the way out-of-band inserts would.
#[derive(Default)]
pub struct CountingStore {
    pub rows: Mutex<Vec<Mapping>>,
    pub find_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
    pub fail_deletes_for: Option<EntityType>,
    /// Added latency for `find_active`, to push it past the store timeout.
    pub find_delay: Option<Duration>,
    pub delete_delay: Option<Duration>,
}

impl CountingStore {
    pub fn find_calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn access_count(&self, entity_type: EntityType, external_id: &str) -> i64 {
        let rows = self.rows.lock().unwrap();
        rows.iter()
            .filter(|m| m.entity_type == entity_type && m.external_id == external_id)
            .map(|m| m.access_count)
            .sum()
    }

    pub fn push(&self, mapping: Mapping) {
        self.rows.lock().unwrap().push(mapping);
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    fn matches(m: &Mapping, entity_type: EntityType, key: LookupKey<'_>) -> bool {
        m.entity_type == entity_type
            && m.is_active
            && match key {
                LookupKey::External(id) => m.external_id == id,
                LookupKey::Internal(id) => m.internal_id == id,
            }
    }
}

#[async_trait]
impl MappingStore for CountingStore {
    async fn find_active(&self, entity_type: EntityType, key: LookupKey<'_>) -> MappingResult<Option<Mapping>> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.find_delay {
            tokio::time::sleep(delay).await;
        }
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().rev().find(|m| Self::matches(m, entity_type, key)).cloned())
    }

    async fn insert(&self, mapping: &Mapping) -> MappingResult<()> {
        self.push(mapping.clone());
        Ok(())
    }

    async fn update_fields(
        &self,
        entity_type: EntityType,
        external_id: &str,
        update: &MappingUpdate,
    ) -> MappingResult<Option<Mapping>> {
        let mut rows = self.rows.lock().unwrap();
        let mut updated = None;
        for m in rows.iter_mut().filter(|m| Self::matches(m, entity_type, LookupKey::External(external_id))) {
            m.internal_id = update.internal_id.clone();
            m.metadata = update.metadata.clone();
            m.updated_at = Utc::now();
            updated = Some(m.clone());
        }
        Ok(updated)
    }

    async fn record_access(&self, entity_type: EntityType, key: LookupKey<'_>) -> MappingResult<()> {
        let mut rows = self.rows.lock().unwrap();
        for m in rows.iter_mut().filter(|m| Self::matches(m, entity_type, key)) {
            m.access_count += 1;
            m.last_accessed = m.last_accessed.max(Utc::now());
        }
        Ok(())
    }

    async fn deactivate(&self, entity_type: EntityType, external_id: &str) -> MappingResult<bool> {
        let mut rows = self.rows.lock().unwrap();
        let mut changed = false;
        for m in rows.iter_mut().filter(|m| Self::matches(m, entity_type, LookupKey::External(external_id))) {
            m.is_active = false;
            changed = true;
        }
        Ok(changed)
    }

    async fn delete_stale(&self, entity_type: EntityType, threshold: DateTime<Utc>) -> MappingResult<u64> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delete_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_deletes_for == Some(entity_type) {
            return Err(MappingError::Store("simulated delete failure".to_string()));
        }
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|m| !(m.entity_type == entity_type && m.is_active && m.last_accessed < threshold));
        Ok((before - rows.len()) as u64)
    }

    async fn group_stats(&self, entity_type: EntityType, stale_before: DateTime<Utc>) -> MappingResult<GroupStats> {
        let rows = self.rows.lock().unwrap();
        let of_type: Vec<&Mapping> = rows.iter().filter(|m| m.entity_type == entity_type).collect();
        let total = of_type.len() as i64;
        let active = of_type.iter().filter(|m| m.is_active).count() as i64;
        let sum: i64 = of_type.iter().map(|m| m.access_count).sum();
        Ok(GroupStats {
            total,
            active,
            inactive: total - active,
            avg_access_count: if total == 0 { 0.0 } else { sum as f64 / total as f64 },
            stale: of_type.iter().filter(|m| m.last_accessed < stale_before).count() as i64,
            last_accessed: of_type.iter().map(|m| m.last_accessed).max(),
            last_created: of_type.iter().map(|m| m.created_at).max(),
        })
    }

    async fn most_accessed(&self, entity_type: EntityType, limit: usize) -> MappingResult<Vec<Mapping>> {
        let rows = self.rows.lock().unwrap();
        let mut of_type: Vec<Mapping> = rows.iter().filter(|m| m.entity_type == entity_type).cloned().collect();
        of_type.sort_by(|a, b| b.access_count.cmp(&a.access_count));
        of_type.truncate(limit);
        Ok(of_type)
    }

    async fn find_many(&self, entity_type: EntityType, include_inactive: bool) -> MappingResult<Vec<Mapping>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|m| m.entity_type == entity_type && (include_inactive || m.is_active))
            .cloned()
            .collect())
    }
}

/// Cache whose every call fails.
pub struct FailingCache;

#[async_trait]
impl MappingCache for FailingCache {
    async fn connect(&self) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("connection refused".to_string()))
    }

    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Err(CacheError::Unavailable("connection refused".to_string()))
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("connection refused".to_string()))
    }

    async fn delete(&self, _key: &str) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("connection refused".to_string()))
    }

    async fn delete_prefix(&self, _prefix: &str) -> Result<usize, CacheError> {
        Err(CacheError::Unavailable("connection refused".to_string()))
    }
}

/// Cache that answers every call, but only after `delay`.
pub struct SlowCache {
    pub delay: Duration,
}

#[async_trait]
impl MappingCache for SlowCache {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        tokio::time::sleep(self.delay).await;
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), CacheError> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }

    async fn delete(&self, _key: &str) -> Result<(), CacheError> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }

    async fn delete_prefix(&self, _prefix: &str) -> Result<usize, CacheError> {
        tokio::time::sleep(self.delay).await;
        Ok(0)
    }
}

/// Existence oracle over a fixed id set; only implements the single-id check.
#[derive(Default)]
pub struct SetOracle {
    pub ids: Mutex<HashSet<String>>,
}

impl SetOracle {
    pub fn with_ids(ids: &[&str]) -> Self {
        Self { ids: Mutex::new(ids.iter().map(|s| s.to_string()).collect()) }
    }
}

#[async_trait]
impl EntityExistence for SetOracle {
    async fn exists(&self, internal_id: &str) -> MappingResult<bool> {
        Ok(self.ids.lock().unwrap().contains(internal_id))
    }
}

/// Initialized manager over the given doubles.
pub async fn double_manager(
    store: Arc<CountingStore>,
    cache: Arc<dyn MappingCache>,
    oracles: EntityOracles,
    config: MappingConfig,
) -> Arc<MappingManager> {
    let manager = Arc::new(MappingManager::new(store, cache, oracles, config, Metrics::new()));
    manager.initialize().await.unwrap();
    manager
}
