//! Durable record of id mappings.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use super::error::{MappingError, MappingResult};
use crate::types::{EntityType, GroupStats, Mapping};

/// Which side of a mapping a lookup was keyed by.
#[derive(Debug, Clone, Copy)]
pub enum LookupKey<'a> {
    External(&'a str),
    Internal(&'a str),
}

/// Fields replaced when an existing mapping is re-created.
#[derive(Debug, Clone)]
pub struct MappingUpdate {
    pub internal_id: String,
    pub metadata: Option<serde_json::Value>,
}

#[async_trait]
pub trait MappingStore: Send + Sync {
    async fn find_active(&self, entity_type: EntityType, key: LookupKey<'_>) -> MappingResult<Option<Mapping>>;

    /// Inserts a new row. A second active row for the same external id must be
    /// rejected with [`MappingError::Conflict`] if the store enforces uniqueness.
    async fn insert(&self, mapping: &Mapping) -> MappingResult<()>;

    /// Updates the active mapping for `external_id` and returns the new row.
    async fn update_fields(
        &self,
        entity_type: EntityType,
        external_id: &str,
        update: &MappingUpdate,
    ) -> MappingResult<Option<Mapping>>;

    /// Bumps `access_count` and `last_accessed` of the active mapping.
    async fn record_access(&self, entity_type: EntityType, key: LookupKey<'_>) -> MappingResult<()>;

    async fn deactivate(&self, entity_type: EntityType, external_id: &str) -> MappingResult<bool>;

    /// Hard-deletes active mappings last accessed before `threshold`.
    async fn delete_stale(&self, entity_type: EntityType, threshold: DateTime<Utc>) -> MappingResult<u64>;

    async fn group_stats(&self, entity_type: EntityType, stale_before: DateTime<Utc>) -> MappingResult<GroupStats>;

    async fn most_accessed(&self, entity_type: EntityType, limit: usize) -> MappingResult<Vec<Mapping>>;

    async fn find_many(&self, entity_type: EntityType, include_inactive: bool) -> MappingResult<Vec<Mapping>>;
}

pub(crate) fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

pub(crate) fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

const MAPPING_COLUMNS: &str = "id, entity_type, external_id, internal_id, created_at, updated_at, \
     last_accessed, access_count, is_active, metadata";

/// SQLite-backed [`MappingStore`] over the `id_mappings` table.
#[derive(Clone)]
pub struct SqliteMappingStore {
    pool: SqlitePool,
}

impl SqliteMappingStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_mapping(row: &SqliteRow) -> MappingResult<Mapping> {
        let entity_type: String = row.try_get("entity_type")?;
        let metadata: Option<String> = row.try_get("metadata")?;
        let metadata = match metadata {
            Some(raw) => Some(
                serde_json::from_str(&raw).map_err(|e| MappingError::Store(format!("corrupt metadata: {}", e)))?,
            ),
            None => None,
        };
        Ok(Mapping {
            id: row.try_get("id")?,
            entity_type: entity_type.parse()?,
            external_id: row.try_get("external_id")?,
            internal_id: row.try_get("internal_id")?,
            created_at: from_millis(row.try_get("created_at")?),
            updated_at: from_millis(row.try_get("updated_at")?),
            last_accessed: from_millis(row.try_get("last_accessed")?),
            access_count: row.try_get("access_count")?,
            is_active: row.try_get::<i64, _>("is_active")? != 0,
            metadata,
        })
    }

    fn encode_metadata(metadata: &Option<serde_json::Value>) -> MappingResult<Option<String>> {
        metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| MappingError::Store(format!("failed to encode metadata: {}", e)))
    }
}

#[async_trait]
impl MappingStore for SqliteMappingStore {
    async fn find_active(&self, entity_type: EntityType, key: LookupKey<'_>) -> MappingResult<Option<Mapping>> {
        let (column, value) = match key {
            LookupKey::External(v) => ("external_id", v),
            LookupKey::Internal(v) => ("internal_id", v),
        };
        let sql = format!(
            "SELECT {} FROM id_mappings WHERE entity_type = ?1 AND {} = ?2 AND is_active = 1 \
             ORDER BY updated_at DESC LIMIT 1",
            MAPPING_COLUMNS, column
        );
        let row = sqlx::query(&sql).bind(entity_type.as_str()).bind(value).fetch_optional(&self.pool).await?;
        row.as_ref().map(Self::row_to_mapping).transpose()
    }

    async fn insert(&self, mapping: &Mapping) -> MappingResult<()> {
        let metadata = Self::encode_metadata(&mapping.metadata)?;
        sqlx::query(
            r#"INSERT INTO id_mappings (id, entity_type, external_id, internal_id, created_at, updated_at,
                   last_accessed, access_count, is_active, metadata)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"#,
        )
        .bind(&mapping.id)
        .bind(mapping.entity_type.as_str())
        .bind(&mapping.external_id)
        .bind(&mapping.internal_id)
        .bind(to_millis(mapping.created_at))
        .bind(to_millis(mapping.updated_at))
        .bind(to_millis(mapping.last_accessed))
        .bind(mapping.access_count)
        .bind(if mapping.is_active { 1i64 } else { 0i64 })
        .bind(metadata)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_fields(
        &self,
        entity_type: EntityType,
        external_id: &str,
        update: &MappingUpdate,
    ) -> MappingResult<Option<Mapping>> {
        let metadata = Self::encode_metadata(&update.metadata)?;
        let result = sqlx::query(
            r#"UPDATE id_mappings SET internal_id = ?1, metadata = ?2, updated_at = ?3
               WHERE entity_type = ?4 AND external_id = ?5 AND is_active = 1"#,
        )
        .bind(&update.internal_id)
        .bind(metadata)
        .bind(to_millis(Utc::now()))
        .bind(entity_type.as_str())
        .bind(external_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_active(entity_type, LookupKey::External(external_id)).await
    }

    async fn record_access(&self, entity_type: EntityType, key: LookupKey<'_>) -> MappingResult<()> {
        let (column, value) = match key {
            LookupKey::External(v) => ("external_id", v),
            LookupKey::Internal(v) => ("internal_id", v),
        };
        // MAX keeps last_accessed monotonic under clock skew
        let sql = format!(
            "UPDATE id_mappings SET access_count = access_count + 1, last_accessed = MAX(last_accessed, ?1) \
             WHERE entity_type = ?2 AND {} = ?3 AND is_active = 1",
            column
        );
        sqlx::query(&sql)
            .bind(to_millis(Utc::now()))
            .bind(entity_type.as_str())
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn deactivate(&self, entity_type: EntityType, external_id: &str) -> MappingResult<bool> {
        let result = sqlx::query(
            r#"UPDATE id_mappings SET is_active = 0, updated_at = ?1
               WHERE entity_type = ?2 AND external_id = ?3 AND is_active = 1"#,
        )
        .bind(to_millis(Utc::now()))
        .bind(entity_type.as_str())
        .bind(external_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_stale(&self, entity_type: EntityType, threshold: DateTime<Utc>) -> MappingResult<u64> {
        let result = sqlx::query(
            "DELETE FROM id_mappings WHERE entity_type = ?1 AND is_active = 1 AND last_accessed < ?2",
        )
        .bind(entity_type.as_str())
        .bind(to_millis(threshold))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn group_stats(&self, entity_type: EntityType, stale_before: DateTime<Utc>) -> MappingResult<GroupStats> {
        let row = sqlx::query(
            r#"SELECT COUNT(*) AS total,
                      COALESCE(SUM(is_active), 0) AS active,
                      COALESCE(AVG(access_count), 0.0) AS avg_access,
                      COALESCE(SUM(CASE WHEN last_accessed < ?2 THEN 1 ELSE 0 END), 0) AS stale,
                      MAX(last_accessed) AS last_accessed,
                      MAX(created_at) AS last_created
               FROM id_mappings WHERE entity_type = ?1"#,
        )
        .bind(entity_type.as_str())
        .bind(to_millis(stale_before))
        .fetch_one(&self.pool)
        .await?;

        let total: i64 = row.try_get("total")?;
        let active: i64 = row.try_get("active")?;
        Ok(GroupStats {
            total,
            active,
            inactive: total - active,
            avg_access_count: row.try_get("avg_access")?,
            stale: row.try_get("stale")?,
            last_accessed: row.try_get::<Option<i64>, _>("last_accessed")?.map(from_millis),
            last_created: row.try_get::<Option<i64>, _>("last_created")?.map(from_millis),
        })
    }

    async fn most_accessed(&self, entity_type: EntityType, limit: usize) -> MappingResult<Vec<Mapping>> {
        let sql = format!(
            "SELECT {} FROM id_mappings WHERE entity_type = ?1 ORDER BY access_count DESC, last_accessed DESC LIMIT ?2",
            MAPPING_COLUMNS
        );
        let rows = sqlx::query(&sql).bind(entity_type.as_str()).bind(limit as i64).fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_mapping).collect()
    }

    async fn find_many(&self, entity_type: EntityType, include_inactive: bool) -> MappingResult<Vec<Mapping>> {
        let sql = format!(
            "SELECT {} FROM id_mappings WHERE entity_type = ?1 AND (?2 = 1 OR is_active = 1) ORDER BY created_at",
            MAPPING_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(entity_type.as_str())
            .bind(if include_inactive { 1i64 } else { 0i64 })
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_mapping).collect()
    }
}
