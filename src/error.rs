//! Error types for the shop service
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == App Error Enum ==
/// Unified error type shared by the ledger and detection endpoints.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppError {
    /// Request data failed validation
    #[error("{0}")]
    Validation(String),

    /// Referenced row or resource does not exist
    #[error("{0}")]
    NotFound(String),

    /// Request conflicts with existing data (duplicates, dependent rows)
    #[error("{0}")]
    Conflict(String),

    /// Anything else: persistence, inference, task failures
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status code this error maps to.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("{}", self);
        }

        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the shop service.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        let test_cases = vec![
            (AppError::Validation("bad".to_string()), StatusCode::BAD_REQUEST),
            (AppError::NotFound("missing".to_string()), StatusCode::NOT_FOUND),
            (AppError::Conflict("dup".to_string()), StatusCode::CONFLICT),
            (
                AppError::Internal("boom".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected_status) in test_cases {
            let response = error.into_response();
            assert_eq!(response.status(), expected_status);
        }
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            AppError::NotFound("Customer not found".to_string()).to_string(),
            "Customer not found"
        );
        assert_eq!(
            AppError::Internal("disk full".to_string()).to_string(),
            "Internal error: disk full"
        );
    }
}
