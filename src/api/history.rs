use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;

use super::types::{ApiResponse, HistoryEventDto, HistoryQuery};
use super::{ApiError, AppState};

pub async fn list_history(
    State(state): State<Arc<AppState>>,
    Path(profile): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<ApiResponse<Vec<HistoryEventDto>>>, ApiError> {
    state.require_profile(&profile)?;
    let events = state.store.list_history(&profile, query.limit, query.offset).await?;
    Ok(Json(ApiResponse::success(events.iter().map(to_dto).collect())))
}

pub async fn undo_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let event = state
        .store
        .get_history_event(id)
        .await?
        .ok_or_else(|| ApiError::history_not_found(id))?;
    let (undo, destructive_sync) = state.undo_service_for(&event.profile)?;
    undo.undo(id, destructive_sync).await?;
    Ok(Json(ApiResponse::success(())))
}

/// Purges a history record from the audit trail without reversing its
/// AniList write. Use `undo_event` to reverse the write itself.
pub async fn delete_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state
        .store
        .get_history_event(id)
        .await?
        .ok_or_else(|| ApiError::history_not_found(id))?;
    state.store.delete_history_event(id).await?;
    Ok(Json(ApiResponse::success(())))
}

fn to_dto(event: &crate::models::history::HistoryEvent) -> HistoryEventDto {
    HistoryEventDto {
        id: event.id,
        anilist_id: event.anilist_id,
        plex_rating_key: event.plex_rating_key,
        kind: format!("{:?}", event.kind),
        outcome: format!("{:?}", event.outcome),
        changed_fields: event.changed_fields.clone(),
        reason: event.reason.clone(),
        error: event.error.clone(),
        created_at: event.created_at.to_rfc3339(),
        undone_at: event.undone_at.map(|t| t.to_rfc3339()),
        undoable: event.is_undoable(),
    }
}
