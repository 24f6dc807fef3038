use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Tuning knobs for the id-mapping layer.
#[derive(Debug, Clone, Deserialize)]
pub struct MappingConfig {
    /// Namespace prepended to every cache key.
    pub cache_prefix: String,
    pub cache_ttl_secs: u64,
    /// Upper bound of entries held by the in-process cache.
    pub cache_capacity: usize,
    /// Items per batch in bulk ingestion.
    pub batch_size: usize,
    pub top_accessed_limit: usize,
    /// Window after which a mapping counts as stale in statistics.
    pub stale_after_days: i64,
    pub enable_cleanup: bool,
    pub cleanup_interval_secs: u64,
    /// Mappings not accessed within this many days are deleted by the scheduler.
    pub cleanup_max_age_days: i64,
    pub store_timeout_ms: u64,
    pub cache_timeout_ms: u64,
}

impl MappingConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn cache_timeout(&self) -> Duration {
        Duration::from_millis(self.cache_timeout_ms)
    }
}

impl Default for MappingConfig {
    fn default() -> Self {
        // Mirror defaults from config/default.toml
        Self {
            cache_prefix: "idmap".to_string(),
            cache_ttl_secs: 24 * 60 * 60,
            cache_capacity: 100_000,
            batch_size: 100,
            top_accessed_limit: 10,
            stale_after_days: 30,
            enable_cleanup: true,
            cleanup_interval_secs: 60 * 60,
            cleanup_max_age_days: 30,
            store_timeout_ms: 5000,
            cache_timeout_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub mapping: MappingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        // Fallback: parse the embedded default TOML
        let defaults: &str = include_str!("../config/default.toml");
        match ::config::Config::builder()
            .add_source(::config::File::from_str(defaults, ::config::FileFormat::Toml))
            .build()
        {
            Ok(cfg) => match cfg.try_deserialize() {
                Ok(app_cfg) => app_cfg,
                Err(e) => {
                    eprintln!("FATAL: Failed to deserialize default config: {}", e);
                    panic!("Failed to deserialize default config: {}", e);
                }
            },
            Err(e) => {
                eprintln!("FATAL: Failed to parse default config: {}", e);
                panic!("Failed to parse default config: {}", e);
            }
        }
    }
}

pub fn load() -> anyhow::Result<AppConfig> {
    // Load .env first (optional)
    let _ = dotenvy::dotenv();

    let defaults: &str = include_str!("../config/default.toml");
    let mut builder = ::config::Config::builder()
        .add_source(::config::File::from_str(defaults, ::config::FileFormat::Toml))
        // Optional local file: idmap.toml (in CWD)
        .add_source(::config::File::with_name("idmap").required(false));

    if let Ok(custom_path) = std::env::var("IDMAP_CONFIG") {
        builder = builder.add_source(::config::File::with_name(&custom_path).required(false));
    }
    // Environment variables last to have highest precedence
    builder = builder.add_source(::config::Environment::with_prefix("IDMAP").separator("__"));

    let cfg = builder.build()?;
    let app_cfg: AppConfig = cfg.try_deserialize()?;
    validate(&app_cfg)?;
    Ok(app_cfg)
}

pub fn validate(cfg: &AppConfig) -> anyhow::Result<()> {
    // Server
    if cfg.server.port == 0 {
        return Err(anyhow::anyhow!("invalid server.port: {}", cfg.server.port));
    }
    #[cfg(unix)]
    if cfg.server.port < 1024 {
        tracing::warn!("Using privileged port {} - may require elevated permissions", cfg.server.port);
    }

    if cfg.database.max_connections == 0 {
        return Err(anyhow::anyhow!("database.max_connections must be > 0"));
    }

    // Mapping layer
    let m = &cfg.mapping;
    if m.cache_prefix.trim().is_empty() {
        return Err(anyhow::anyhow!("mapping.cache_prefix must not be empty"));
    }
    if m.cache_ttl_secs == 0 {
        return Err(anyhow::anyhow!("mapping.cache_ttl_secs must be > 0"));
    }
    if m.cache_capacity == 0 {
        return Err(anyhow::anyhow!("mapping.cache_capacity must be > 0"));
    }
    if m.batch_size == 0 {
        return Err(anyhow::anyhow!("mapping.batch_size must be > 0"));
    }
    if m.stale_after_days <= 0 || m.cleanup_max_age_days <= 0 {
        return Err(anyhow::anyhow!("mapping.stale_after_days and mapping.cleanup_max_age_days must be > 0"));
    }
    if m.cleanup_interval_secs == 0 {
        return Err(anyhow::anyhow!("mapping.cleanup_interval_secs must be > 0"));
    }
    if m.store_timeout_ms == 0 || m.cache_timeout_ms == 0 {
        return Err(anyhow::anyhow!("mapping timeouts must be > 0"));
    }

    Ok(())
}

pub fn ensure_sqlite_parent_dir(url: &str) -> anyhow::Result<()> {
    if let Some(path) = url.strip_prefix("sqlite://") {
        // On Windows, handle URLs like sqlite:///C:/... by stripping the leading '/'
        #[cfg(windows)]
        let path = {
            let bytes = path.as_bytes();
            if bytes.len() >= 3 && bytes[0] == b'/' && bytes[2] == b':' && bytes[1].is_ascii_alphabetic() {
                &path[1..]
            } else {
                path
            }
        };
        let p = Path::new(path);
        if let Some(parent) = p.parent() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
