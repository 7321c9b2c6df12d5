//! SSE endpoint for real-time sync notifications.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use futures::stream::{self, Stream};
use tokio::sync::broadcast;
use tracing::warn;

use super::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/events", get(sse_handler))
}

async fn sse_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.events.subscribe();

    let stream = stream::unfold(rx, |mut rx| async move {
        match rx.recv().await {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => Some((Ok(Event::default().data(json)), rx)),
                Err(err) => {
                    warn!(?err, "failed to serialize SSE event, skipping");
                    Some((Ok(Event::default().event("error").data("serialization failed")), rx))
                }
            },
            Err(broadcast::error::RecvError::Lagged(count)) => {
                warn!(count, "SSE client lagged");
                Some((Ok(Event::default().event("warning").data("missed some events")), rx))
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
