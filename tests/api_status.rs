//! Smoke test for the web API surface against an in-memory database.

use std::collections::HashMap;
use std::sync::Arc;

use http_body_util::BodyExt;
use tower::ServiceExt;

use plexanibridge::api::{self, AppState};
use plexanibridge::config::Config;
use plexanibridge::db::Store;

#[tokio::test]
async fn status_endpoint_reports_no_configured_profiles() {
    let store = Store::new("sqlite::memory:").await.expect("in-memory store");
    let (events, _rx) = tokio::sync::broadcast::channel(16);

    let state = Arc::new(AppState {
        store,
        events,
        profiles: HashMap::new(),
        start_time: std::time::Instant::now(),
        prometheus_handle: None,
    });

    let config = Config::default();
    let app = api::router(state, &config).await;

    let response = app
        .oneshot(
            axum::http::Request::builder()
                .uri("/api/status")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), axum::http::StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed["data"]["profiles"].as_array().unwrap().len(), 0);
}
