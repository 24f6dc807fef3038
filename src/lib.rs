//! # idmap Backend Library
//!
//! Core library of the id-mapping service used by the library/equipment
//! management backend. It translates externally visible identifiers
//! (barcodes, import keys, legacy ids) to internal storage keys for students,
//! books, equipment, users and checkouts.
//!
//! ## Architecture
//!
//! - **Axum**: HTTP surface over the mapping manager
//! - **SQLx**: Asynchronous persistence with SQLite
//! - **Tokio**: Async runtime and the background cleanup task
//! - **LRU**: In-process cache with per-key TTL
//!
//! ## Core Components
//!
//! - [`config`]: Layered configuration (embedded defaults, file, env)
//! - [`db`]: Database schema initialization
//! - [`error`]: HTTP error type and JSON error responses
//! - [`mapping`]: Mapping manager, store, cache, validation and cleanup
//! - [`metrics`]: Lookup, cache and cleanup counters
//! - [`routes`]: HTTP API endpoint handlers
//! - [`state`]: Shared application state
//! - [`types`]: Domain types and data transfer objects

pub mod config;
pub mod db;
pub mod error;
pub mod mapping;
pub mod metrics;
pub mod routes;
pub mod state;
pub mod types;

#[cfg(test)]
mod tests;
