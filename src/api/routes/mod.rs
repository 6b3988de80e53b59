pub mod app;
pub mod state;
pub mod subscriptions;
pub mod transactions;
pub mod upload;

use axum::{http::StatusCode, Json};
use serde::Serialize;

/// Error response structure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Response structure for successful mutations
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn api_error(status: StatusCode, message: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
}
