use sqlx::SqlitePool;

use crate::types::EntityType;

pub async fn init_db(pool: &SqlitePool) -> anyhow::Result<()> {
    // Pragmas for better durability/performance (best-effort)
    if let Err(e) = sqlx::query("PRAGMA journal_mode=WAL;").execute(pool).await {
        tracing::warn!("Failed to set WAL journal mode: {}", e);
    }
    if let Err(e) = sqlx::query("PRAGMA synchronous=NORMAL;").execute(pool).await {
        tracing::warn!("Failed to set synchronous mode: {}", e);
    }
    if let Err(e) = sqlx::query("PRAGMA busy_timeout=10000;").execute(pool).await {
        tracing::warn!("Failed to set busy_timeout: {}", e);
    }
    if let Err(e) = sqlx::query("PRAGMA temp_store=MEMORY;").execute(pool).await {
        tracing::warn!("Failed to set temp_store: {}", e);
    }

    // id_mappings table; timestamps are UTC epoch milliseconds
    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS id_mappings (
            id TEXT PRIMARY KEY,
            entity_type TEXT NOT NULL,
            external_id TEXT NOT NULL,
            internal_id TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            last_accessed INTEGER NOT NULL,
            access_count INTEGER NOT NULL DEFAULT 0,
            is_active INTEGER NOT NULL DEFAULT 1,
            metadata TEXT NULL
        )"#,
    )
    .execute(pool)
    .await?;

    // Domain tables are owned by the rest of the application; only their ids
    // matter here, as existence targets for validation.
    for entity_type in EntityType::ALL {
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
            )",
            entity_type.table()
        );
        sqlx::query(&ddl).execute(pool).await?;
    }

    // At most one active mapping per (entity_type, external_id)
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_mappings_active_external \
         ON id_mappings(entity_type, external_id) WHERE is_active = 1",
    )
    .execute(pool)
    .await?;

    let indexes = [
        ("idx_mappings_internal", "CREATE INDEX IF NOT EXISTS idx_mappings_internal ON id_mappings(entity_type, internal_id)"),
        ("idx_mappings_last_accessed", "CREATE INDEX IF NOT EXISTS idx_mappings_last_accessed ON id_mappings(entity_type, last_accessed)"),
        ("idx_mappings_access_count", "CREATE INDEX IF NOT EXISTS idx_mappings_access_count ON id_mappings(entity_type, access_count DESC)"),
    ];

    for (name, query) in indexes {
        if let Err(e) = sqlx::query(query).execute(pool).await {
            match &e {
                sqlx::Error::Database(db_err) => {
                    let msg = db_err.message().to_lowercase();
                    if msg.contains("already exists") || msg.contains("duplicate") {
                        tracing::debug!("Index {} already exists, skipping", name);
                    } else {
                        tracing::warn!("Failed to create index {}: {}", name, e);
                    }
                }
                _ => {
                    tracing::warn!("Failed to create index {}: {}", name, e);
                }
            }
        }
    }

    Ok(())
}
