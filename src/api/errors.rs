use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::errors::EngineError;

/// Maps the engine's error taxonomy (§7) onto HTTP status codes for the
/// minimal external-interface wiring this crate ships (§[AMBIENT] 15).
impl IntoResponse for EngineError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            EngineError::Config(_) | EngineError::OutputValidation(_) => StatusCode::BAD_REQUEST,
            EngineError::Credential(_) => StatusCode::UNAUTHORIZED,
            EngineError::Cancelled(_) => StatusCode::CONFLICT,
            EngineError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub struct ApiError(pub StatusCode, pub String);

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.0, Json(json!({ "error": self.1 }))).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        let status = match &e {
            EngineError::Config(_) | EngineError::OutputValidation(_) => StatusCode::BAD_REQUEST,
            EngineError::Credential(_) => StatusCode::UNAUTHORIZED,
            EngineError::Cancelled(_) => StatusCode::CONFLICT,
            EngineError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError(status, e.to_string())
    }
}
