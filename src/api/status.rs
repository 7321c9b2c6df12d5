use std::sync::Arc;

use axum::Json;
use axum::extract::State;

use super::types::{ApiResponse, ProfileStatusDto, StatusDto};
use super::{ApiError, AppState};

pub async fn status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<StatusDto>>, ApiError> {
    let watermarks = state.store.list_watermarks().await?;
    let mut profiles = Vec::new();

    for name in state.profile_names() {
        let watermark = watermarks.iter().find(|w| w.profile == name);
        let runtime_state = state.profile_state_label(&name).await;

        profiles.push(ProfileStatusDto {
            name,
            state: runtime_state,
            last_run_at: watermark.and_then(|w| w.last_run_at).map(|t| t.to_rfc3339()),
            last_success_at: watermark.and_then(|w| w.last_success_at).map(|t| t.to_rfc3339()),
            last_error: watermark.and_then(|w| w.last_error.clone()),
            last_applied: watermark.map_or(0, |w| w.last_applied),
            last_skipped: watermark.map_or(0, |w| w.last_skipped),
            last_failed: watermark.map_or(0, |w| w.last_failed),
        });
    }

    Ok(Json(ApiResponse::success(StatusDto {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        profiles,
    })))
}
