// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use crate::{models::quiz::QuestionError, services::payment::PaymentError, store::StoreError};

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request
    BadRequest(String),

    // 400 Bad Request, names the offending question (1-based)
    Validation { index: usize, reason: String },

    // 401 Unauthorized
    AuthError(String),

    // 403 Forbidden (authenticated, but not allowed)
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict (e.g., duplicate slug)
    Conflict(String),

    // 400 Bad Request, payment signature mismatch
    InvalidSignature,

    // 500, atomic commit aborted
    TransactionFailed(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::InternalServerError(msg) => write!(f, "internal error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "bad request: {}", msg),
            AppError::Validation { index, reason } => write!(f, "question #{} {}", index, reason),
            AppError::AuthError(msg) => write!(f, "unauthorized: {}", msg),
            AppError::Forbidden(msg) => write!(f, "forbidden: {}", msg),
            AppError::NotFound(msg) => write!(f, "not found: {}", msg),
            AppError::Conflict(msg) => write!(f, "conflict: {}", msg),
            AppError::InvalidSignature => f.write_str("invalid payment signature"),
            AppError::TransactionFailed(msg) => write!(f, "transaction failed: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
/// Internal causes are logged here and never sent to the client.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::TransactionFailed(msg) => {
                tracing::error!("Transaction aborted: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Transaction failed".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Validation { index, reason } => (
                StatusCode::BAD_REQUEST,
                format!("question #{} {}", index, reason),
            ),
            AppError::AuthError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::InvalidSignature => {
                (StatusCode::BAD_REQUEST, "Invalid signature".to_string())
            }
        };
        let body = Json(json!({
            "success": false,
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Store failures surface as 500 unless they are a known unique-key collision.
impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(constraint) if constraint.contains("slug") => {
                AppError::Conflict("slug_already_in_use".to_string())
            }
            StoreError::Duplicate(constraint) => {
                AppError::Conflict(format!("duplicate value for {}", constraint))
            }
            StoreError::NotFound => AppError::NotFound("not_found".to_string()),
            other => AppError::InternalServerError(other.to_string()),
        }
    }
}

impl From<QuestionError> for AppError {
    fn from(err: QuestionError) -> Self {
        AppError::Validation {
            index: err.index,
            reason: err.reason,
        }
    }
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::MissingParams => AppError::BadRequest("Missing parameters".to_string()),
            PaymentError::CourseNotFound => AppError::NotFound("Course not found".to_string()),
            PaymentError::CourseNotFoundForVerification => {
                AppError::BadRequest("Course not found".to_string())
            }
            PaymentError::InvalidPrice => {
                AppError::BadRequest("Course has no price set".to_string())
            }
            PaymentError::InvalidSignature => AppError::InvalidSignature,
            PaymentError::PaymentOwnedByAnotherUser => AppError::Conflict(
                "Payment already recorded for another account".to_string(),
            ),
            PaymentError::GatewayUnavailable => AppError::InternalServerError(
                "payment gateway is not configured".to_string(),
            ),
            PaymentError::Gateway(e) => {
                AppError::InternalServerError(format!("Could not create order: {}", e))
            }
            PaymentError::TransactionFailed(msg) => AppError::TransactionFailed(msg),
            PaymentError::Store(e) => AppError::InternalServerError(e.to_string()),
        }
    }
}
