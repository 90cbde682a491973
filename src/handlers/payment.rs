// src/handlers/payment.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{payment::VerifyPaymentRequest, user::AuthUser},
    services::payment::{PaymentError, PaymentService},
    utils::extract::ApiJson,
};

/// Opens a gateway order for a course purchase.
///
/// The amount always comes from the stored course price; the request body is ignored.
pub async fn create_order(
    State(payments): State<Arc<PaymentService>>,
    user: AuthUser,
    Path(course_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let course_id = Uuid::parse_str(course_id.trim()).map_err(|_| PaymentError::CourseNotFound)?;
    let order = payments.create_order(course_id, user.id).await?;

    Ok(Json(json!({ "order": order })))
}

/// Checkout callback: verifies the signature, records the payment and enrolls the payer.
pub async fn verify_payment(
    State(payments): State<Arc<PaymentService>>,
    user: AuthUser,
    ApiJson(req): ApiJson<VerifyPaymentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let verification = payments.verify(&req, user.id).await?;

    let message = if verification.already_processed {
        "Payment already processed"
    } else {
        "Payment verified, recorded and user enrolled"
    };

    Ok(Json(json!({
        "success": true,
        "message": message,
        "payment": verification.payment,
    })))
}
