use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::{
    error::{AppError, AppResult, OptionExt},
    state::AppState,
    types::{
        BulkMappingRequest, CleanupRequest, CleanupResponse, CreateMappingRequest, EntityType, LookupResponse,
    },
};

// Upper bound on items accepted by one bulk request
const MAX_BULK_ITEMS: usize = 10_000;

fn parse_entity_type(raw: &str) -> AppResult<EntityType> {
    raw.parse::<EntityType>().map_err(AppError::from)
}

pub async fn create_mapping(
    State(state): State<AppState>,
    Json(req): Json<CreateMappingRequest>,
) -> AppResult<impl IntoResponse> {
    let entity_type = parse_entity_type(&req.entity_type)?;
    let mapping = state
        .mappings
        .create_mapping(entity_type, req.external_id.trim(), req.internal_id.trim(), req.metadata)
        .await?;
    Ok((StatusCode::CREATED, Json(mapping)))
}

pub async fn bulk_create(
    State(state): State<AppState>,
    Path(entity_type): Path<String>,
    Json(req): Json<BulkMappingRequest>,
) -> AppResult<impl IntoResponse> {
    let entity_type = parse_entity_type(&entity_type)?;
    if req.items.len() > MAX_BULK_ITEMS {
        return Err(AppError::BadRequest(format!(
            "too many items: {} (max {})",
            req.items.len(),
            MAX_BULK_ITEMS
        )));
    }
    let result = state.mappings.bulk_create_mappings(entity_type, &req.items).await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

pub async fn list_mappings(
    State(state): State<AppState>,
    Path(entity_type): Path<String>,
    Query(q): Query<ListQuery>,
) -> AppResult<impl IntoResponse> {
    let entity_type = parse_entity_type(&entity_type)?;
    let mappings = state.mappings.list_mappings(entity_type, q.include_inactive).await?;
    Ok(Json(mappings))
}

pub async fn resolve_external(
    State(state): State<AppState>,
    Path((entity_type, external_id)): Path<(String, String)>,
) -> AppResult<impl IntoResponse> {
    let entity_type = parse_entity_type(&entity_type)?;
    let internal_id = state
        .mappings
        .get_internal_id(entity_type, &external_id)
        .await?
        .ok_or_not_found(&format!("{} mapping for external id '{}'", entity_type, external_id))?;
    Ok(Json(LookupResponse { entity_type, external_id, internal_id }))
}

pub async fn resolve_internal(
    State(state): State<AppState>,
    Path((entity_type, internal_id)): Path<(String, String)>,
) -> AppResult<impl IntoResponse> {
    let entity_type = parse_entity_type(&entity_type)?;
    let external_id = state
        .mappings
        .get_external_id(entity_type, &internal_id)
        .await?
        .ok_or_not_found(&format!("{} mapping for internal id '{}'", entity_type, internal_id))?;
    Ok(Json(LookupResponse { entity_type, external_id, internal_id }))
}

pub async fn deactivate_mapping(
    State(state): State<AppState>,
    Path((entity_type, external_id)): Path<(String, String)>,
) -> AppResult<impl IntoResponse> {
    let entity_type = parse_entity_type(&entity_type)?;
    if !state.mappings.deactivate_mapping(entity_type, &external_id).await? {
        return Err(AppError::NotFound(format!("{} mapping for external id '{}' not found", entity_type, external_id)));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn mapping_stats(
    State(state): State<AppState>,
    Path(entity_type): Path<String>,
) -> AppResult<impl IntoResponse> {
    let entity_type = parse_entity_type(&entity_type)?;
    Ok(Json(state.mappings.get_mapping_stats(entity_type).await?))
}

pub async fn validate_mappings(
    State(state): State<AppState>,
    Path(entity_type): Path<String>,
) -> AppResult<impl IntoResponse> {
    let entity_type = parse_entity_type(&entity_type)?;
    Ok(Json(state.mappings.validate_mappings(entity_type).await?))
}

pub async fn cleanup_mappings(
    State(state): State<AppState>,
    Path(entity_type): Path<String>,
    Json(req): Json<CleanupRequest>,
) -> AppResult<impl IntoResponse> {
    let entity_type = parse_entity_type(&entity_type)?;
    let deleted = state.mappings.cleanup_stale_mappings(entity_type, req.older_than).await?;
    Ok(Json(CleanupResponse { entity_type, deleted }))
}
