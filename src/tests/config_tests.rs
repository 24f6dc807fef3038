#[cfg(test)]
mod tests {
    use crate::config::{self, AppConfig};
    use std::env;
    use std::fs;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.url, "sqlite://data/idmap.db");
        assert_eq!(config.mapping.cache_prefix, "idmap");
        assert_eq!(config.mapping.cache_ttl_secs, 86400);
        assert_eq!(config.mapping.cleanup_interval_secs, 3600);
        assert_eq!(config.mapping.cleanup_max_age_days, 30);
        assert_eq!(config.mapping.stale_after_days, 30);
        assert!(config.mapping.enable_cleanup);
        assert!(config::validate(&config).is_ok());
    }

    #[test]
    fn test_mapping_defaults_match_embedded_toml() {
        let embedded = AppConfig::default().mapping;
        let coded = crate::config::MappingConfig::default();
        assert_eq!(embedded.cache_ttl_secs, coded.cache_ttl_secs);
        assert_eq!(embedded.batch_size, coded.batch_size);
        assert_eq!(embedded.top_accessed_limit, coded.top_accessed_limit);
        assert_eq!(embedded.store_timeout_ms, coded.store_timeout_ms);
        assert_eq!(embedded.cache_timeout_ms, coded.cache_timeout_ms);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut cfg = AppConfig::default();
        cfg.server.port = 0;
        assert!(config::validate(&cfg).unwrap_err().to_string().contains("invalid server.port"));

        let mut cfg = AppConfig::default();
        cfg.mapping.cache_prefix = "  ".to_string();
        assert!(config::validate(&cfg).is_err());

        let mut cfg = AppConfig::default();
        cfg.mapping.batch_size = 0;
        assert!(config::validate(&cfg).unwrap_err().to_string().contains("batch_size"));

        let mut cfg = AppConfig::default();
        cfg.mapping.cleanup_interval_secs = 0;
        assert!(config::validate(&cfg).is_err());

        let mut cfg = AppConfig::default();
        cfg.mapping.cache_timeout_ms = 0;
        assert!(config::validate(&cfg).is_err());
    }

    #[test]
    fn test_config_from_file() {
        let config_content = r#"
[server]
host = "192.168.1.1"
port = 9000

[mapping]
cache_prefix = "lib"
cache_ttl_secs = 600
enable_cleanup = false
"#;
        let temp_file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        fs::write(temp_file.path(), config_content).unwrap();

        env::set_var("IDMAP_CONFIG", temp_file.path());
        let result = config::load();
        env::remove_var("IDMAP_CONFIG");

        let config = result.unwrap();
        assert_eq!(config.server.host, "192.168.1.1");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.mapping.cache_prefix, "lib");
        assert_eq!(config.mapping.cache_ttl_secs, 600);
        assert!(!config.mapping.enable_cleanup);
        // Untouched keys keep their defaults
        assert_eq!(config.mapping.batch_size, 100);
    }

    #[test]
    fn test_durations() {
        let m = AppConfig::default().mapping;
        assert_eq!(m.cache_ttl().as_secs(), 24 * 60 * 60);
        assert_eq!(m.cleanup_interval().as_secs(), 60 * 60);
        assert_eq!(m.store_timeout().as_millis(), 5000);
        assert_eq!(m.cache_timeout().as_millis(), 1000);
    }
}
