use std::collections::HashMap;
use std::sync::Arc;

use axum::Router;
use axum::http::HeaderValue;
use axum::routing::{delete, get, post, put};
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

mod backups;
mod error;
pub mod events;
mod history;
mod mappings;
mod observability;
mod status;
mod trigger;
mod types;

pub use error::ApiError;

use crate::clients::anilist::AnilistClient;
use crate::config::Config;
use crate::db::Store;
use crate::domain::events::NotificationEvent;
use crate::scheduler::{ProfileHandle, ProfileState};
use crate::services::{BackupService, UndoService};

/// Everything the API needs for one configured profile, mirroring the
/// teacher's one-struct-per-concern wiring but keyed by profile name.
pub struct ProfileRuntime {
    pub handle: ProfileHandle,
    pub state: Arc<RwLock<ProfileState>>,
    pub anilist: AnilistClient,
    pub destructive_sync: bool,
}

pub struct AppState {
    pub store: Store,
    pub events: tokio::sync::broadcast::Sender<NotificationEvent>,
    pub profiles: HashMap<String, ProfileRuntime>,
    pub start_time: std::time::Instant,
    pub prometheus_handle: Option<metrics_exporter_prometheus::PrometheusHandle>,
}

impl AppState {
    pub fn profile_names(&self) -> Vec<String> {
        self.profiles.keys().cloned().collect()
    }

    pub fn require_profile(&self, name: &str) -> Result<(), ApiError> {
        if self.profiles.contains_key(name) {
            Ok(())
        } else {
            Err(ApiError::profile_not_found(name))
        }
    }

    pub async fn profile_state_label(&self, name: &str) -> String {
        match self.profiles.get(name) {
            Some(runtime) => format!("{:?}", *runtime.state.read().await),
            None => "unknown".to_string(),
        }
    }

    pub fn trigger_handle_for(&self, name: &str) -> Result<&ProfileHandle, ApiError> {
        self.profiles
            .get(name)
            .map(|r| &r.handle)
            .ok_or_else(|| ApiError::profile_not_found(name))
    }

    pub fn backup_service_for(&self, name: &str) -> Result<BackupService, ApiError> {
        let runtime = self
            .profiles
            .get(name)
            .ok_or_else(|| ApiError::profile_not_found(name))?;
        Ok(BackupService::new(self.store.clone(), runtime.anilist.clone()))
    }

    pub fn undo_service_for(&self, name: &str) -> Result<(UndoService, bool), ApiError> {
        let runtime = self
            .profiles
            .get(name)
            .ok_or_else(|| ApiError::profile_not_found(name))?;
        Ok((
            UndoService::new(self.store.clone(), runtime.anilist.clone()),
            runtime.destructive_sync,
        ))
    }
}

pub async fn router(state: Arc<AppState>, config: &Config) -> Router {
    let cors_origins = &config.server.cors_allowed_origins;
    let cors_layer = if cors_origins.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    let api_router = Router::new()
        .route("/status", get(status::status))
        .route("/profiles/{name}/history", get(history::list_history))
        .route("/profiles/{name}/trigger", post(trigger::trigger))
        .route("/history/{id}/undo", post(history::undo_event))
        .route("/history/{id}", delete(history::delete_history))
        .route("/profiles/{name}/backups", get(backups::list_backups))
        .route(
            "/profiles/{name}/backups/{id}/restore",
            post(backups::restore_backup),
        )
        .route("/mappings/search", get(mappings::search_mappings))
        .route("/mappings/{id}", put(mappings::upsert_mapping))
        .route("/mappings/{id}", delete(mappings::delete_mapping))
        .route("/metrics", get(observability::get_metrics))
        .merge(events::router())
        .with_state(state)
        .layer(axum::middleware::from_fn(observability::logging_middleware))
        .layer(axum::middleware::from_fn(
            observability::security_headers_middleware,
        ));

    Router::new()
        .nest("/api", api_router)
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
}
