use std::sync::Arc;

use crate::config::AppConfig;
use crate::mapping::{EntityOracles, LruMappingCache, MappingManager, SqliteMappingStore};
use crate::metrics::Metrics;

/// The shared application state.
///
/// Cloned into every Axum handler. The mapping manager is constructed here
/// and handed around explicitly rather than living in a global.
#[derive(Clone)]
pub struct AppState {
    /// The database connection pool, used directly by the readiness probe.
    pub db: sqlx::SqlitePool,
    pub config: Arc<AppConfig>,
    pub metrics: Metrics,
    /// The id-mapping service. Callers must run `initialize()` before serving.
    pub mappings: Arc<MappingManager>,
}

impl AppState {
    /// Wires the SQLite store, the in-process LRU cache and SQL-backed
    /// existence oracles for every entity kind into a fresh manager.
    pub fn new(db: sqlx::SqlitePool, config: AppConfig) -> Self {
        let metrics = Metrics::new();
        let mappings = MappingManager::new(
            Arc::new(SqliteMappingStore::new(db.clone())),
            Arc::new(LruMappingCache::new(config.mapping.cache_capacity)),
            EntityOracles::sqlite(&db),
            config.mapping.clone(),
            metrics.clone(),
        );

        Self { db, config: Arc::new(config), metrics, mappings: Arc::new(mappings) }
    }

    /// Uses a pre-built manager, e.g. one backed by test doubles.
    pub fn with_manager(db: sqlx::SqlitePool, config: AppConfig, mappings: Arc<MappingManager>) -> Self {
        let metrics = mappings.metrics().clone();
        Self { db, config: Arc::new(config), metrics, mappings }
    }
}
