#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::mapping::{CacheKeys, LruMappingCache, MappingCache};
    use crate::types::EntityType;

    #[test]
    fn keys_are_namespaced_by_prefix_and_entity_type() {
        let keys = CacheKeys::new("idmap");
        assert_eq!(keys.region(EntityType::Book), "idmap:book:");
        assert_eq!(keys.external(EntityType::Book, "ACC-1"), "idmap:book:ext:ACC-1");
        assert_eq!(keys.internal(EntityType::Book, "row-1"), "idmap:book:int:row-1");
        assert!(keys.external(EntityType::Student, "X").starts_with(&keys.region(EntityType::Student)));
    }

    #[tokio::test]
    async fn set_get_delete() {
        let cache = LruMappingCache::new(16);
        cache.set("k", "v", Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some("v".to_string()));

        cache.delete("k").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn entries_expire_after_their_ttl() {
        let cache = LruMappingCache::new(16);
        cache.set("short", "1", Duration::from_millis(20)).await.unwrap();
        cache.set("long", "2", Duration::from_secs(60)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(cache.get("short").await.unwrap(), None);
        assert_eq!(cache.get("long").await.unwrap(), Some("2".to_string()));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn delete_prefix_drops_only_that_region() {
        let keys = CacheKeys::new("idmap");
        let cache = LruMappingCache::new(16);
        let ttl = Duration::from_secs(60);
        cache.set(&keys.external(EntityType::Book, "A"), "1", ttl).await.unwrap();
        cache.set(&keys.internal(EntityType::Book, "1"), "A", ttl).await.unwrap();
        cache.set(&keys.external(EntityType::Student, "A"), "s1", ttl).await.unwrap();

        let dropped = cache.delete_prefix(&keys.region(EntityType::Book)).await.unwrap();
        assert_eq!(dropped, 2);
        assert_eq!(cache.get(&keys.external(EntityType::Book, "A")).await.unwrap(), None);
        assert_eq!(cache.get(&keys.external(EntityType::Student, "A")).await.unwrap(), Some("s1".to_string()));
    }

    #[tokio::test]
    async fn least_recently_used_entry_is_evicted() {
        let cache = LruMappingCache::new(2);
        let ttl = Duration::from_secs(60);
        cache.set("a", "1", ttl).await.unwrap();
        cache.set("b", "2", ttl).await.unwrap();
        // touch "a" so "b" becomes the eviction candidate
        cache.get("a").await.unwrap();
        cache.set("c", "3", ttl).await.unwrap();

        assert_eq!(cache.get("b").await.unwrap(), None);
        assert_eq!(cache.get("a").await.unwrap(), Some("1".to_string()));
        assert_eq!(cache.get("c").await.unwrap(), Some("3".to_string()));
    }
}
