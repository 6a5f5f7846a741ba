//! Convenience helpers for consistent JSON response shapes across the
//! Runtime RPC surface's HTTP handlers.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> SuccessResponse<T> {
    pub fn new(data: T) -> Self {
        Self { success: true, data }
    }
}

pub fn ok<T: Serialize>(data: T) -> impl IntoResponse {
    (StatusCode::OK, Json(SuccessResponse::new(data)))
}

pub fn created<T: Serialize>(data: T) -> impl IntoResponse {
    (StatusCode::CREATED, Json(SuccessResponse::new(data)))
}

pub fn no_content() -> impl IntoResponse {
    StatusCode::NO_CONTENT
}

pub fn bad_request(message: impl Into<String>) -> impl IntoResponse {
    let err = ErrorResponse::new("BadRequest", message.into(), "BAD_REQUEST");
    (StatusCode::BAD_REQUEST, Json(err))
}

pub fn not_found(message: impl Into<String>) -> impl IntoResponse {
    let err = ErrorResponse::new("NotFound", message.into(), "NOT_FOUND");
    (StatusCode::NOT_FOUND, Json(err))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub message: String,
    pub code: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            message: message.into(),
            code: code.into(),
        }
    }
}
