//! API route handlers

pub mod balance;
pub mod trade;

use axum::{http::StatusCode, Json};
use serde::Serialize;

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub(crate) fn error(status: StatusCode, detail: impl ToString) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            detail: detail.to_string(),
        }),
    )
}
