use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};

use super::types::{ApiResponse, BackupDto};
use super::{ApiError, AppState};

pub async fn list_backups(
    State(state): State<Arc<AppState>>,
    Path(profile): Path<String>,
) -> Result<Json<ApiResponse<Vec<BackupDto>>>, ApiError> {
    let backups = state.backup_service_for(&profile)?.list_backups(&profile).await?;
    Ok(Json(ApiResponse::success(
        backups
            .into_iter()
            .map(|b| BackupDto {
                id: b.id,
                created_at: b.created_at.to_rfc3339(),
                entry_count: b.entry_count,
                reason: b.reason,
            })
            .collect(),
    )))
}

pub async fn restore_backup(
    State(state): State<Arc<AppState>>,
    Path((profile, id)): Path<(String, i64)>,
) -> Result<Json<ApiResponse<usize>>, ApiError> {
    let restored = state.backup_service_for(&profile)?.restore_backup(id).await?;
    Ok(Json(ApiResponse::success(restored)))
}
