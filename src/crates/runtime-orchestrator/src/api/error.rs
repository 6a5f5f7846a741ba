//! Maps `RuntimeError` onto HTTP status codes and a JSON error body for
//! the Axum handlers in [`crate::api::routes`].

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::RuntimeError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    pub error: String,
    pub message: String,
    pub code: String,
}

impl ApiErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            code: code.into(),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Wraps a `RuntimeError` for `IntoResponse`; caller mistakes (ErrGraphNotFound,
/// ErrEntryPointNotFound, ErrSessionNotFound, ErrStreamBusy) map to 4xx, and
/// the rest fall back to 500 since they represent server-side execution faults.
#[derive(Debug)]
pub struct ApiError(pub RuntimeError);

impl From<RuntimeError> for ApiError {
    fn from(err: RuntimeError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            RuntimeError::GraphNotFound(_) => StatusCode::NOT_FOUND,
            RuntimeError::EntryPointNotFound(_, _) => StatusCode::NOT_FOUND,
            RuntimeError::CannotRemovePrimary => StatusCode::CONFLICT,
            RuntimeError::CredentialUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            RuntimeError::WebhookUnauthorized => StatusCode::UNAUTHORIZED,
            RuntimeError::Config(_) => StatusCode::BAD_REQUEST,
            RuntimeError::Stream(runtime_core::StreamError::Busy) => StatusCode::CONFLICT,
            RuntimeError::Stream(runtime_core::StreamError::Store(runtime_core::StoreError::SessionNotFound(_))) => {
                StatusCode::NOT_FOUND
            }
            RuntimeError::Stream(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RuntimeError::Graph(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match &self.0 {
            RuntimeError::GraphNotFound(_) => "GRAPH_NOT_FOUND",
            RuntimeError::EntryPointNotFound(_, _) => "ENTRY_POINT_NOT_FOUND",
            RuntimeError::CannotRemovePrimary => "CANNOT_REMOVE_PRIMARY",
            RuntimeError::CredentialUnavailable(_) => "CREDENTIAL_UNAVAILABLE",
            RuntimeError::WebhookUnauthorized => "WEBHOOK_UNAUTHORIZED",
            RuntimeError::Config(_) => "CONFIG_ERROR",
            RuntimeError::Stream(runtime_core::StreamError::Busy) => "STREAM_BUSY",
            RuntimeError::Stream(runtime_core::StreamError::Store(runtime_core::StoreError::SessionNotFound(_))) => {
                "SESSION_NOT_FOUND"
            }
            RuntimeError::Stream(_) => "STREAM_ERROR",
            RuntimeError::Graph(_) => "GRAPH_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let body = ApiErrorResponse::new(code, self.0.to_string(), code);
        tracing::error!(error = %self.0, code, "api error");
        (status, Json(body)).into_response()
    }
}
