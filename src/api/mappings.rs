use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};

use super::types::{ApiResponse, MappingDto, MappingSearchQuery};
use super::{ApiError, AppState};
use crate::models::mapping::Mapping;

pub async fn search_mappings(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MappingSearchQuery>,
) -> Result<Json<ApiResponse<Vec<MappingDto>>>, ApiError> {
    let ids = state.store.search_mapping_titles(&query.q).await?;
    let mut mappings = Vec::new();
    for id in ids {
        if let Some(m) = state.store.get_mapping(id).await? {
            mappings.push(to_dto(&m));
        }
    }
    Ok(Json(ApiResponse::success(mappings)))
}

pub async fn upsert_mapping(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(mut overlay): Json<Mapping>,
) -> Result<Json<ApiResponse<MappingDto>>, ApiError> {
    overlay.anilist_id = id;
    overlay.custom = true;

    // A posted mapping is a shallow overlay, not a full replacement: merge
    // it onto whatever row already exists rather than blind-overwriting
    // fields the caller never mentioned.
    let merged = match state.store.get_mapping(id).await? {
        Some(mut base) => {
            base.merge_overlay(overlay);
            base
        }
        None => overlay,
    };

    state.store.upsert_mapping(&merged).await?;
    Ok(Json(ApiResponse::success(to_dto(&merged))))
}

pub async fn delete_mapping(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let Some(mut mapping) = state.store.get_mapping(id).await? else {
        return Err(ApiError::NotFound(format!("mapping {id} not found")));
    };
    mapping.custom = false;
    // A "delete" on a custom mapping just removes the override; the next
    // database-sync run reinstates whatever the authoritative source says.
    state.store.upsert_mapping(&mapping).await?;
    Ok(Json(ApiResponse::success(())))
}

fn to_dto(mapping: &Mapping) -> MappingDto {
    MappingDto {
        anilist_id: mapping.anilist_id,
        title: mapping.title.clone(),
        year: mapping.year,
        custom: mapping.custom,
    }
}
