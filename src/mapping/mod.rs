//! Bidirectional, cached translation between external identifiers and
//! internal storage keys.
//!
//! [`MappingManager`] is the only component with business logic. Reads go
//! through the cache first and fall back to the [`MappingStore`]; writes land
//! in the store and then refresh both cache directions. The cache is
//! best-effort: any cache failure is logged and treated as a miss.
//!
//! ## Lifecycle
//!
//! [`MappingManager::initialize`] must run before any other operation. It
//! connects the cache and, when enabled, starts the [`CleanupScheduler`].
//! [`MappingManager::disconnect`] stops the scheduler and is idempotent.

pub mod cache;
pub mod cleanup;
pub mod error;
pub mod oracle;
pub mod store;
pub mod validation;

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

pub use cache::{CacheError, CacheKeys, LruMappingCache, MappingCache};
pub use cleanup::{run_cleanup_pass, CleanupReport, CleanupScheduler};
pub use error::{MappingError, MappingResult};
pub use oracle::{EntityExistence, EntityOracles, TableExistence};
pub use store::{LookupKey, MappingStore, MappingUpdate, SqliteMappingStore};

use crate::config::MappingConfig;
use crate::metrics::Metrics;
use crate::types::{
    BulkMappingError, BulkMappingItem, BulkMappingResult, EntityType, Mapping, MappingStats, ValidationResult,
};

fn require_id(field: &str, value: &str) -> MappingResult<()> {
    if value.trim().is_empty() {
        return Err(MappingError::validation(field, format!("{} must not be empty", field)));
    }
    Ok(())
}

pub struct MappingManager {
    store: Arc<dyn MappingStore>,
    cache: Arc<dyn MappingCache>,
    oracles: EntityOracles,
    keys: CacheKeys,
    config: MappingConfig,
    metrics: Metrics,
    initialized: AtomicBool,
    scheduler: Mutex<Option<CleanupScheduler>>,
}

impl MappingManager {
    pub fn new(
        store: Arc<dyn MappingStore>,
        cache: Arc<dyn MappingCache>,
        oracles: EntityOracles,
        config: MappingConfig,
        metrics: Metrics,
    ) -> Self {
        Self {
            store,
            cache,
            oracles,
            keys: CacheKeys::new(config.cache_prefix.clone()),
            config,
            metrics,
            initialized: AtomicBool::new(false),
            scheduler: Mutex::new(None),
        }
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn config(&self) -> &MappingConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Connects the cache and starts the cleanup scheduler if configured.
    pub async fn initialize(self: &Arc<Self>) -> MappingResult<()> {
        let mut scheduler = self.scheduler.lock().await;
        if self.is_initialized() {
            debug!("Mapping manager already initialized");
            return Ok(());
        }

        if self.cache_call("connect", self.cache.connect()).await.is_none() {
            warn!("Cache unavailable at startup; lookups will fall back to the store");
        }

        if self.config.enable_cleanup {
            *scheduler = Some(CleanupScheduler::start(
                Arc::downgrade(self),
                self.config.cleanup_interval(),
                chrono::Duration::days(self.config.cleanup_max_age_days),
            ));
        }
        self.initialized.store(true, Ordering::Release);
        info!(
            cleanup = self.config.enable_cleanup,
            cleanup_interval_secs = self.config.cleanup_interval_secs,
            cache_ttl_secs = self.config.cache_ttl_secs,
            "Mapping manager initialized"
        );
        Ok(())
    }

    /// Stops the cleanup scheduler and marks the manager uninitialized.
    pub async fn disconnect(&self) {
        let mut scheduler = self.scheduler.lock().await;
        // Scheduler must be gone before the manager reports uninitialized
        if let Some(s) = scheduler.take() {
            s.shutdown().await;
        }
        let was_initialized = self.initialized.swap(false, Ordering::AcqRel);
        if was_initialized {
            info!("Mapping manager disconnected");
        }
    }

    pub async fn has_running_scheduler(&self) -> bool {
        self.scheduler.lock().await.as_ref().map(|s| s.is_running()).unwrap_or(false)
    }

    fn ensure_initialized(&self) -> MappingResult<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(MappingError::NotInitialized)
        }
    }

    async fn store_call<T, F>(&self, op: &'static str, fut: F) -> MappingResult<T>
    where
        F: Future<Output = MappingResult<T>>,
    {
        match tokio::time::timeout(self.config.store_timeout(), fut).await {
            Ok(res) => res,
            Err(_) => {
                error!(op, timeout_ms = self.config.store_timeout_ms, "Store call timed out");
                Err(MappingError::Timeout(op))
            }
        }
    }

    async fn cache_call<T, F>(&self, op: &'static str, fut: F) -> Option<T>
    where
        F: Future<Output = Result<T, CacheError>>,
    {
        let err = match tokio::time::timeout(self.config.cache_timeout(), fut).await {
            Ok(Ok(v)) => return Some(v),
            Ok(Err(e)) => e,
            Err(_) => CacheError::Timeout,
        };
        self.metrics.inc_cache_errors();
        warn!(op, error = %err, "Cache call failed; continuing without cache");
        None
    }

    async fn cache_pair(&self, entity_type: EntityType, external_id: &str, internal_id: &str) {
        let ttl = self.config.cache_ttl();
        let ext_key = self.keys.external(entity_type, external_id);
        let int_key = self.keys.internal(entity_type, internal_id);
        self.cache_call("set", self.cache.set(&ext_key, internal_id, ttl)).await;
        self.cache_call("set", self.cache.set(&int_key, external_id, ttl)).await;
    }

    /// Records the access against the single resolved row, keyed by its
    /// active external id. Never fails the lookup that triggered it.
    async fn touch(&self, entity_type: EntityType, external_id: &str) {
        let key = LookupKey::External(external_id);
        if let Err(e) = self.store_call("record_access", self.store.record_access(entity_type, key)).await {
            warn!(entity_type = %entity_type, external_id, error = %e, "Failed to record mapping access");
        }
    }

    /// Creates the mapping, or updates it in place if one is already active.
    pub async fn create_mapping(
        &self,
        entity_type: EntityType,
        external_id: &str,
        internal_id: &str,
        metadata: Option<serde_json::Value>,
    ) -> MappingResult<Mapping> {
        self.ensure_initialized()?;
        require_id("external_id", external_id)?;
        require_id("internal_id", internal_id)?;
        let start = Instant::now();

        let result = self.upsert(entity_type, external_id, internal_id, metadata).await;
        match &result {
            Ok(m) => {
                self.cache_pair(entity_type, &m.external_id, &m.internal_id).await;
                info!(
                    entity_type = %entity_type,
                    external_id,
                    internal_id,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Mapping stored"
                );
            }
            Err(e) => error!(entity_type = %entity_type, external_id, error = %e, "Failed to store mapping"),
        }
        result
    }

    async fn upsert(
        &self,
        entity_type: EntityType,
        external_id: &str,
        internal_id: &str,
        metadata: Option<serde_json::Value>,
    ) -> MappingResult<Mapping> {
        let existing = self
            .store_call("find_active", self.store.find_active(entity_type, LookupKey::External(external_id)))
            .await?;
        if let Some(existing) = existing {
            return self.update_existing(existing, internal_id, metadata).await;
        }

        let mapping = Mapping::new(entity_type, external_id, internal_id, metadata.clone());
        match self.store_call("insert", self.store.insert(&mapping)).await {
            Ok(()) => {
                self.metrics.inc_created();
                Ok(mapping)
            }
            Err(MappingError::Conflict(msg)) => {
                // Lost a race with a concurrent create; the winner's row is updated instead.
                debug!(entity_type = %entity_type, external_id, "Insert conflicted ({}); updating", msg);
                let winner = self
                    .store_call("find_active", self.store.find_active(entity_type, LookupKey::External(external_id)))
                    .await?
                    .ok_or_else(|| MappingError::Store(format!("mapping '{}' vanished after conflict", external_id)))?;
                self.update_existing(winner, internal_id, metadata).await
            }
            Err(e) => Err(e),
        }
    }

    async fn update_existing(
        &self,
        existing: Mapping,
        internal_id: &str,
        metadata: Option<serde_json::Value>,
    ) -> MappingResult<Mapping> {
        let entity_type = existing.entity_type;
        let update = MappingUpdate { internal_id: internal_id.to_string(), metadata };
        let updated = self
            .store_call("update_fields", self.store.update_fields(entity_type, &existing.external_id, &update))
            .await?
            .ok_or_else(|| {
                MappingError::Store(format!("mapping '{}' vanished during update", existing.external_id))
            })?;

        if existing.internal_id != updated.internal_id {
            let stale = self.keys.internal(entity_type, &existing.internal_id);
            self.cache_call("delete", self.cache.delete(&stale)).await;
        }
        self.metrics.inc_updated();
        Ok(updated)
    }

    /// Resolves an external id to its internal id; `None` when unmapped.
    pub async fn get_internal_id(&self, entity_type: EntityType, external_id: &str) -> MappingResult<Option<String>> {
        self.ensure_initialized()?;
        require_id("external_id", external_id)?;
        self.lookup(entity_type, LookupKey::External(external_id)).await
    }

    /// Resolves an internal id back to its external id; `None` when unmapped.
    pub async fn get_external_id(&self, entity_type: EntityType, internal_id: &str) -> MappingResult<Option<String>> {
        self.ensure_initialized()?;
        require_id("internal_id", internal_id)?;
        self.lookup(entity_type, LookupKey::Internal(internal_id)).await
    }

    async fn lookup(&self, entity_type: EntityType, key: LookupKey<'_>) -> MappingResult<Option<String>> {
        self.metrics.inc_lookups();
        let cache_key = match key {
            LookupKey::External(id) => self.keys.external(entity_type, id),
            LookupKey::Internal(id) => self.keys.internal(entity_type, id),
        };

        if let Some(Some(hit)) = self.cache_call("get", self.cache.get(&cache_key)).await {
            self.metrics.inc_cache_hits();
            let external_id = match key {
                LookupKey::External(id) => id,
                LookupKey::Internal(_) => hit.as_str(),
            };
            self.touch(entity_type, external_id).await;
            return Ok(Some(hit));
        }
        self.metrics.inc_cache_misses();

        self.metrics.inc_store_reads();
        let found = self
            .store_call("find_active", self.store.find_active(entity_type, key))
            .await
            .inspect_err(|e| error!(entity_type = %entity_type, key = ?key, error = %e, "Mapping lookup failed"))?;

        let Some(mapping) = found else {
            debug!(entity_type = %entity_type, key = ?key, "No active mapping");
            return Ok(None);
        };
        self.cache_pair(entity_type, &mapping.external_id, &mapping.internal_id).await;
        self.touch(entity_type, &mapping.external_id).await;
        Ok(Some(match key {
            LookupKey::External(_) => mapping.internal_id,
            LookupKey::Internal(_) => mapping.external_id,
        }))
    }

    /// Full active record for `external_id`, read straight from the store.
    pub async fn get_mapping(&self, entity_type: EntityType, external_id: &str) -> MappingResult<Option<Mapping>> {
        self.ensure_initialized()?;
        require_id("external_id", external_id)?;
        self.store_call("find_active", self.store.find_active(entity_type, LookupKey::External(external_id))).await
    }

    pub async fn list_mappings(&self, entity_type: EntityType, include_inactive: bool) -> MappingResult<Vec<Mapping>> {
        self.ensure_initialized()?;
        self.store_call("find_many", self.store.find_many(entity_type, include_inactive)).await
    }

    /// Logically deletes the active mapping, keeping the row for audit.
    pub async fn deactivate_mapping(&self, entity_type: EntityType, external_id: &str) -> MappingResult<bool> {
        self.ensure_initialized()?;
        require_id("external_id", external_id)?;
        let existing = self
            .store_call("find_active", self.store.find_active(entity_type, LookupKey::External(external_id)))
            .await?;
        let Some(existing) = existing else {
            return Ok(false);
        };
        let deactivated =
            self.store_call("deactivate", self.store.deactivate(entity_type, external_id)).await?;

        let ext_key = self.keys.external(entity_type, external_id);
        let int_key = self.keys.internal(entity_type, &existing.internal_id);
        self.cache_call("delete", self.cache.delete(&ext_key)).await;
        self.cache_call("delete", self.cache.delete(&int_key)).await;
        info!(entity_type = %entity_type, external_id, "Mapping deactivated");
        Ok(deactivated)
    }

    /// Creates every item independently, in batches of `batch_size`.
    ///
    /// Per-item failures are collected into the result instead of aborting.
    pub async fn bulk_create_mappings(
        &self,
        entity_type: EntityType,
        items: &[BulkMappingItem],
    ) -> MappingResult<BulkMappingResult> {
        self.ensure_initialized()?;
        let start = Instant::now();
        let mut result = BulkMappingResult::default();

        for batch in items.chunks(self.config.batch_size.max(1)) {
            let outcomes = join_all(batch.iter().map(|item| {
                self.create_mapping(entity_type, &item.external_id, &item.internal_id, item.metadata.clone())
            }))
            .await;
            for (item, outcome) in batch.iter().zip(outcomes) {
                match outcome {
                    Ok(_) => result.success += 1,
                    Err(e) => {
                        result.failed += 1;
                        result.errors.push(BulkMappingError { external_id: item.external_id.clone(), error: e.to_string() });
                    }
                }
            }
        }

        result.duration_ms = start.elapsed().as_millis() as u64;
        self.metrics.add_bulk_failures(result.failed as u64);
        info!(
            entity_type = %entity_type,
            success = result.success,
            failed = result.failed,
            duration_ms = result.duration_ms,
            "Bulk mapping ingestion finished"
        );
        Ok(result)
    }

    pub async fn get_mapping_stats(&self, entity_type: EntityType) -> MappingResult<MappingStats> {
        self.ensure_initialized()?;
        let stale_before = Utc::now() - chrono::Duration::days(self.config.stale_after_days);
        let group = self.store_call("group_stats", self.store.group_stats(entity_type, stale_before)).await?;
        let most_accessed = self
            .store_call("most_accessed", self.store.most_accessed(entity_type, self.config.top_accessed_limit))
            .await?;

        Ok(MappingStats {
            entity_type,
            total_mappings: group.total,
            active_mappings: group.active,
            inactive_mappings: group.inactive,
            average_access_count: group.avg_access_count,
            most_accessed,
            stale_mappings: group.stale,
            last_accessed: group.last_accessed,
            last_created: group.last_created,
        })
    }

    /// Checks every mapping of `entity_type` (active or not) for duplicates
    /// and orphans.
    pub async fn validate_mappings(&self, entity_type: EntityType) -> MappingResult<ValidationResult> {
        self.ensure_initialized()?;
        let start = Instant::now();
        let mappings = self.store_call("find_many", self.store.find_many(entity_type, true)).await?;

        let mut issues = validation::find_duplicates(&mappings);
        let has_duplicates = !issues.is_empty();

        let (valid, invalid) = match self.oracles.get(entity_type) {
            Some(oracle) => {
                let ids = validation::distinct_internal_ids(&mappings);
                let existing = self
                    .store_call("existence_check", oracle.existing(&ids))
                    .await
                    .inspect_err(|e| error!(entity_type = %entity_type, error = %e, "Existence check failed"))?;
                let report = validation::find_orphans(&mappings, &existing);
                issues.extend(report.issues);
                (report.valid, report.invalid)
            }
            None => {
                warn!(entity_type = %entity_type, "No existence oracle registered; skipping orphan check");
                (mappings.len(), 0)
            }
        };

        let result = ValidationResult {
            entity_type,
            is_valid: !has_duplicates && invalid == 0,
            total_mappings: mappings.len(),
            valid_mappings: valid,
            invalid_mappings: invalid,
            issues,
        };
        info!(
            entity_type = %entity_type,
            total = result.total_mappings,
            invalid = result.invalid_mappings,
            issues = result.issues.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Mapping validation finished"
        );
        Ok(result)
    }

    /// Deletes active mappings last accessed before `older_than` and drops the
    /// entity type's cache region.
    pub async fn cleanup_stale_mappings(
        &self,
        entity_type: EntityType,
        older_than: DateTime<Utc>,
    ) -> MappingResult<u64> {
        self.ensure_initialized()?;
        let deleted = self
            .store_call("delete_stale", self.store.delete_stale(entity_type, older_than))
            .await
            .inspect_err(|e| error!(entity_type = %entity_type, error = %e, "Failed to delete stale mappings"))?;

        let region = self.keys.region(entity_type);
        self.cache_call("delete_prefix", self.cache.delete_prefix(&region)).await;
        self.metrics.add_deleted(deleted);
        info!(entity_type = %entity_type, deleted, older_than = %older_than, "Stale mappings cleaned up");
        Ok(deleted)
    }
}
