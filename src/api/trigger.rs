use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};

use super::types::{ApiResponse, TriggerRequest};
use super::{ApiError, AppState};
use crate::scheduler::TriggerKind;

pub async fn trigger(
    State(state): State<Arc<AppState>>,
    Path(profile): Path<String>,
    body: Option<Json<TriggerRequest>>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let handle = state.trigger_handle_for(&profile)?;
    let full = body.map(|Json(req)| req.full).unwrap_or(false);
    let kind = if full { TriggerKind::Full } else { TriggerKind::Webhook };
    handle.trigger(kind).await;
    Ok(Json(ApiResponse::success(())))
}
