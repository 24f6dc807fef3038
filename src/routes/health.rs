use crate::state::AppState;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};

// Health check endpoint - lightweight
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

// Readiness probe: DB reachable and mapping manager initialized
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    if !state.mappings.is_initialized() {
        return (StatusCode::SERVICE_UNAVAILABLE, "not ready: mapping service not initialized").into_response();
    }
    let query = sqlx::query("SELECT 1").fetch_one(&state.db);
    match tokio::time::timeout(std::time::Duration::from_secs(5), query).await {
        Ok(Ok(_)) => (StatusCode::OK, "ready").into_response(),
        Ok(Err(e)) => (StatusCode::SERVICE_UNAVAILABLE, format!("not ready: {}", e)).into_response(),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "not ready: timeout").into_response(),
    }
}

// Metrics endpoint: returns JSON snapshot
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.get_snapshot())
}

// Prometheus-compatible text exposition format
pub async fn metrics_prometheus(State(state): State<AppState>) -> impl IntoResponse {
    let m = state.metrics.get_snapshot();
    let counters = [
        ("idmap_lookups", "Mapping lookups", m.lookups),
        ("idmap_cache_hits", "Lookups served from cache", m.cache_hits),
        ("idmap_cache_misses", "Lookups that missed the cache", m.cache_misses),
        ("idmap_cache_errors", "Failed cache calls", m.cache_errors),
        ("idmap_store_reads", "Lookups that read the store", m.store_reads),
        ("idmap_mappings_created", "Mappings inserted", m.mappings_created),
        ("idmap_mappings_updated", "Mappings updated in place", m.mappings_updated),
        ("idmap_bulk_items_failed", "Failed bulk items", m.bulk_items_failed),
        ("idmap_cleanup_runs", "Scheduled cleanup passes", m.cleanup_runs),
        ("idmap_cleanup_failures", "Entity types that failed a scheduled cleanup", m.cleanup_failures),
        ("idmap_mappings_deleted", "Stale mappings deleted", m.mappings_deleted),
    ];
    let mut body = String::new();
    for (name, help, value) in counters {
        body.push_str(&format!("# HELP {name} {help}\n# TYPE {name} counter\n{name} {value}\n"));
    }
    body.push_str(&format!(
        "# HELP idmap_uptime_seconds Uptime seconds\n# TYPE idmap_uptime_seconds gauge\nidmap_uptime_seconds {}\n",
        m.uptime_seconds
    ));
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}

// Version/Build info endpoint (JSON)
pub async fn version() -> impl IntoResponse {
    let body = serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "package": {
            "description": env!("CARGO_PKG_DESCRIPTION"),
            "authors": env!("CARGO_PKG_AUTHORS"),
            "license": env!("CARGO_PKG_LICENSE"),
        },
        "build": {
            "profile": if cfg!(debug_assertions) { "debug" } else { "release" },
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
        }
    });
    (StatusCode::OK, Json(body))
}
