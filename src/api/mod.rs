pub mod admin;
pub mod ask;
pub mod feedback;
pub mod sessions;
pub mod workflows;

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::error::CoreError;
use crate::state::AppState;

/// Error wrapper for axum handlers: maps core error kinds onto status
/// codes and a structured JSON body.
#[derive(Debug)]
pub enum ApiError {
    Core(CoreError),
    Unauthorized,
}

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        ApiError::Core(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "missing or invalid admin key".to_string(),
            ),
            ApiError::Core(e) => {
                let status = match &e {
                    CoreError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                    CoreError::NotFound(_) => StatusCode::NOT_FOUND,
                    CoreError::AlreadyFinalised(_) => StatusCode::CONFLICT,
                    CoreError::Provider(_) => StatusCode::BAD_GATEWAY,
                    CoreError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                    CoreError::Store(_) | CoreError::Internal(_) => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                if status.is_server_error() {
                    tracing::error!("request failed: {e}");
                }
                (status, e.kind(), e.to_string())
            }
        };

        let body = Json(serde_json::json!({
            "error": { "kind": kind, "message": message }
        }));
        (status, body).into_response()
    }
}

/// Admin guard: the X-Admin-Key header must match the configured key.
pub fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    match headers.get("x-admin-key").and_then(|v| v.to_str().ok()) {
        Some(key) if key == state.config.admin_key => Ok(()),
        _ => Err(ApiError::Unauthorized),
    }
}
