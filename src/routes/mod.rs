//! HTTP route handlers for the idmap API.
//!
//! - `health`: liveness, readiness, metrics and version endpoints
//! - `mappings`: thin request shaping over the [`crate::mapping::MappingManager`]

pub mod health;
pub mod mappings;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .route("/metrics", get(health::metrics))
        .route("/metrics/prometheus", get(health::metrics_prometheus))
        .route("/version", get(health::version))
        .route("/mappings", post(mappings::create_mapping))
        .route("/mappings/{entity_type}", get(mappings::list_mappings))
        .route("/mappings/{entity_type}/bulk", post(mappings::bulk_create))
        .route(
            "/mappings/{entity_type}/external/{external_id}",
            get(mappings::resolve_external).delete(mappings::deactivate_mapping),
        )
        .route("/mappings/{entity_type}/internal/{internal_id}", get(mappings::resolve_internal))
        .route("/mappings/{entity_type}/stats", get(mappings::mapping_stats))
        .route("/mappings/{entity_type}/validate", get(mappings::validate_mappings))
        .route("/mappings/{entity_type}/cleanup", post(mappings::cleanup_mappings))
        .with_state(state)
}
