//! Unit and integration tests for the idmap service.
//!
//! - **support**: fixtures and test doubles (counting store, failing cache, set oracle)
//! - **mapping_tests**: manager behaviour (cache-aside reads, upserts, bulk, stats, validation)
//! - **cleanup_tests**: cleanup passes and the background scheduler
//! - **cache_tests**: LRU cache with per-key TTL
//! - **validation_tests**: duplicate and orphan detection
//! - **db_tests**: schema bootstrap and store constraints
//! - **config_tests**: configuration loading and validation
//! - **error_tests**: error conversion and HTTP error responses
//! - **api_tests**, **health_api_tests**: HTTP endpoints

pub mod support;

pub mod cache_tests;
pub mod config_tests;
pub mod db_tests;
