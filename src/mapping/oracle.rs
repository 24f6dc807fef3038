//! Existence checks against the domain tables, used by validation.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use super::error::MappingResult;
use crate::types::EntityType;

#[async_trait]
pub trait EntityExistence: Send + Sync {
    async fn exists(&self, internal_id: &str) -> MappingResult<bool>;

    /// Returns the subset of `internal_ids` that currently exist.
    async fn existing(&self, internal_ids: &[String]) -> MappingResult<HashSet<String>> {
        let mut found = HashSet::new();
        for id in internal_ids {
            if self.exists(id).await? {
                found.insert(id.clone());
            }
        }
        Ok(found)
    }
}

/// Checks ids against the `id` column of a domain table.
#[derive(Clone)]
pub struct TableExistence {
    pool: SqlitePool,
    table: &'static str,
}

impl TableExistence {
    pub fn new(pool: SqlitePool, entity_type: EntityType) -> Self {
        Self { pool, table: entity_type.table() }
    }
}

// SQLite's default bound-parameter limit
const SQLITE_MAX_VARS: usize = 999;

#[async_trait]
impl EntityExistence for TableExistence {
    async fn exists(&self, internal_id: &str) -> MappingResult<bool> {
        let sql = format!("SELECT 1 FROM {} WHERE id = ?1 LIMIT 1", self.table);
        let row = sqlx::query(&sql).bind(internal_id).fetch_optional(&self.pool).await?;
        Ok(row.is_some())
    }

    async fn existing(&self, internal_ids: &[String]) -> MappingResult<HashSet<String>> {
        let mut found = HashSet::with_capacity(internal_ids.len());
        for chunk in internal_ids.chunks(SQLITE_MAX_VARS) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!("SELECT id FROM {} WHERE id IN (", self.table));
            let mut separated = qb.separated(", ");
            for id in chunk {
                separated.push_bind(id.as_str());
            }
            separated.push_unseparated(")");
            let ids: Vec<String> = qb.build_query_scalar::<String>().fetch_all(&self.pool).await?;
            found.extend(ids);
        }
        Ok(found)
    }
}

/// One existence oracle per entity kind.
#[derive(Clone, Default)]
pub struct EntityOracles {
    oracles: HashMap<EntityType, Arc<dyn EntityExistence>>,
}

impl EntityOracles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Oracles for every entity kind backed by the domain tables in `pool`.
    pub fn sqlite(pool: &SqlitePool) -> Self {
        EntityType::ALL.iter().fold(Self::new(), |oracles, et| {
            oracles.with(*et, Arc::new(TableExistence::new(pool.clone(), *et)))
        })
    }

    pub fn with(mut self, entity_type: EntityType, oracle: Arc<dyn EntityExistence>) -> Self {
        self.oracles.insert(entity_type, oracle);
        self
    }

    pub fn get(&self, entity_type: EntityType) -> Option<&Arc<dyn EntityExistence>> {
        self.oracles.get(&entity_type)
    }
}
