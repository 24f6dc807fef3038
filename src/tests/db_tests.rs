#[cfg(test)]
mod tests {
    use sqlx::migrate::MigrateDatabase;
    use sqlx::sqlite::SqlitePoolOptions;
    use tempfile::NamedTempFile;

    use crate::db;
    use crate::mapping::{MappingError, MappingStore, SqliteMappingStore};
    use crate::types::{EntityType, Mapping};

    async fn setup_test_db() -> (sqlx::SqlitePool, NamedTempFile) {
        let temp_db = NamedTempFile::new().unwrap();
        let db_url = format!("sqlite:{}", temp_db.path().display());

        sqlx::Sqlite::create_database(&db_url).await.unwrap();

        let pool = SqlitePoolOptions::new().max_connections(1).connect(&db_url).await.unwrap();
        db::init_db(&pool).await.unwrap();

        (pool, temp_db)
    }

    #[tokio::test]
    async fn test_init_db() {
        let (pool, _file) = setup_test_db().await;

        let tables: Vec<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
                .fetch_all(&pool)
                .await
                .unwrap();

        assert!(tables.contains(&"id_mappings".to_string()));
        for et in EntityType::ALL {
            assert!(tables.contains(&et.table().to_string()), "missing table {}", et.table());
        }
    }

    #[tokio::test]
    async fn test_init_db_is_idempotent() {
        let (pool, _file) = setup_test_db().await;
        db::init_db(&pool).await.unwrap();

        let indexes: Vec<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type='index' AND tbl_name='id_mappings'")
                .fetch_all(&pool)
                .await
                .unwrap();
        assert!(indexes.contains(&"idx_mappings_active_external".to_string()));
        assert!(indexes.contains(&"idx_mappings_internal".to_string()));
    }

    #[tokio::test]
    async fn test_second_active_row_is_rejected() {
        let (pool, _file) = setup_test_db().await;
        let store = SqliteMappingStore::new(pool.clone());

        store.insert(&Mapping::new(EntityType::Book, "ACC-1", "b-1", None)).await.unwrap();
        let err = store.insert(&Mapping::new(EntityType::Book, "ACC-1", "b-2", None)).await.unwrap_err();
        assert!(matches!(err, MappingError::Conflict(_)), "unexpected error: {:?}", err);

        // Same external id under another entity type is fine
        store.insert(&Mapping::new(EntityType::Student, "ACC-1", "s-1", None)).await.unwrap();
    }

    #[tokio::test]
    async fn test_inactive_rows_do_not_block_new_active_row() {
        let (pool, _file) = setup_test_db().await;
        let store = SqliteMappingStore::new(pool.clone());

        store.insert(&Mapping::new(EntityType::Book, "ACC-1", "b-1", None)).await.unwrap();
        assert!(store.deactivate(EntityType::Book, "ACC-1").await.unwrap());
        store.insert(&Mapping::new(EntityType::Book, "ACC-1", "b-2", None)).await.unwrap();

        let all = store.find_many(EntityType::Book, true).await.unwrap();
        assert_eq!(all.len(), 2);
        let active = store.find_many(EntityType::Book, false).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].internal_id, "b-2");
    }

    #[tokio::test]
    async fn test_mapping_row_round_trips_fields() {
        let (pool, _file) = setup_test_db().await;
        let store = SqliteMappingStore::new(pool.clone());
        let original =
            Mapping::new(EntityType::Equipment, "EQ-1", "e-1", Some(serde_json::json!({ "room": "B12", "qty": 3 })));
        store.insert(&original).await.unwrap();

        let loaded = store
            .find_active(EntityType::Equipment, crate::mapping::LookupKey::Internal("e-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.id, original.id);
        assert_eq!(loaded.external_id, "EQ-1");
        assert_eq!(loaded.metadata, original.metadata);
        assert_eq!(loaded.created_at.timestamp_millis(), original.created_at.timestamp_millis());
        assert!(loaded.is_active);
        assert_eq!(loaded.access_count, 0);
    }
}
