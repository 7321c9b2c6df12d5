use std::fmt;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::types::ApiResponse;

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    ValidationError(String),
    ExternalApiError { service: String, message: String },
    InternalError(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::ValidationError(msg) => write!(f, "validation error: {msg}"),
            Self::ExternalApiError { service, message } => write!(f, "{service} error: {message}"),
            Self::InternalError(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::ExternalApiError { service, message } => {
                tracing::warn!(service, message, "upstream request failed");
                (StatusCode::BAD_GATEWAY, format!("{service} is unavailable"))
            }
            Self::InternalError(msg) => {
                tracing::error!(msg, "internal api error");
                (StatusCode::INTERNAL_SERVER_ERROR, "an internal error occurred".to_string())
            }
        };

        (status, Json(ApiResponse::<()>::error(message))).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::InternalError(err.to_string())
    }
}

impl ApiError {
    pub fn profile_not_found(name: &str) -> Self {
        Self::NotFound(format!("profile '{name}' not found"))
    }

    pub fn history_not_found(id: i64) -> Self {
        Self::NotFound(format!("history event {id} not found"))
    }
}
