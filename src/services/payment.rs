// src/services/payment.rs

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use super::gateway::{Gateway, GatewayError};
use crate::{
    config::PaymentConfig,
    models::{
        course::Course,
        payment::{GatewayOrder, OrderNotes, OrderRequest, Payment, PaymentStatus, VerifyPaymentRequest},
    },
    store::{Store, StoreError},
    utils::signature::verify_checkout,
};

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("missing parameters")]
    MissingParams,

    #[error("course not found")]
    CourseNotFound,

    /// Course lookup failed while verifying a callback (reported as 400).
    #[error("course not found for verification")]
    CourseNotFoundForVerification,

    #[error("course has no price set")]
    InvalidPrice,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("payment already recorded for another user")]
    PaymentOwnedByAnotherUser,

    #[error("payment gateway unavailable")]
    GatewayUnavailable,

    #[error(transparent)]
    Gateway(GatewayError),

    #[error("transaction failed: {0}")]
    TransactionFailed(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<GatewayError> for PaymentError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Unavailable => PaymentError::GatewayUnavailable,
            other => PaymentError::Gateway(other),
        }
    }
}

/// Outcome of a verification call.
#[derive(Debug)]
pub struct Verification {
    pub payment: Payment,
    /// The payment id had already been recorded; nothing was written.
    pub already_processed: bool,
}

/// Order creation and callback verification against the configured gateway.
pub struct PaymentService {
    store: Arc<dyn Store>,
    gateway: Gateway,
    config: PaymentConfig,
}

impl PaymentService {
    pub fn new(store: Arc<dyn Store>, gateway: Gateway, config: PaymentConfig) -> Self {
        Self {
            store,
            gateway,
            config,
        }
    }

    /// Opens a gateway order for the course at its stored price.
    pub async fn create_order(
        &self,
        course_id: Uuid,
        user_id: Uuid,
    ) -> Result<GatewayOrder, PaymentError> {
        let course = self
            .store
            .get_course(course_id)
            .await?
            .ok_or(PaymentError::CourseNotFound)?;
        if course.is_free() {
            return Err(PaymentError::InvalidPrice);
        }

        let now = Utc::now().timestamp_millis();
        let request = OrderRequest {
            amount: course.price,
            currency: self.config.currency.clone(),
            receipt: format!("rcpt_{}", now),
            notes: OrderNotes {
                course_id: course.id.to_string(),
                user_id: user_id.to_string(),
            },
        };

        let order = match &self.gateway {
            Gateway::Live(gateway) => {
                let order = gateway.create_order(&request).await?;
                info!("Gateway order {} created for course {}", order.id, course.id);
                order
            }
            Gateway::Unavailable if self.config.allow_dev_fallback => {
                let order = stub_order(&request, now);
                warn!("Payment gateway not configured, issuing stub order {}", order.id);
                order
            }
            Gateway::Unavailable => return Err(PaymentError::GatewayUnavailable),
        };

        let created_at = Utc::now();
        let pending = Payment {
            id: Uuid::new_v4(),
            user_id,
            course_id: course.id,
            gateway_order_id: order.id.clone(),
            gateway_payment_id: None,
            gateway_signature: None,
            amount: course.price,
            currency: request.currency.clone(),
            status: PaymentStatus::Created,
            raw: None,
            receipt: request.receipt.clone(),
            created_at,
            updated_at: created_at,
        };
        self.store.insert_payment(&pending).await?;

        Ok(order)
    }

    /// Verifies a checkout callback and, on success, records the payment and
    /// enrolls the user in a single commit.
    ///
    /// Replays of an already recorded payment id return the stored record
    /// without writing anything.
    pub async fn verify(
        &self,
        req: &VerifyPaymentRequest,
        user_id: Uuid,
    ) -> Result<Verification, PaymentError> {
        if req.has_missing_params() {
            return Err(PaymentError::MissingParams);
        }
        let payment_id = req.payment_id.trim();
        let order_id = req.order_id.trim();

        if let Some(existing) = self.store.find_payment_by_gateway_id(payment_id).await? {
            return self.replay(existing, user_id);
        }

        let course = match Uuid::parse_str(req.course_id.trim()) {
            Ok(id) => self.store.get_course(id).await?,
            Err(_) => None,
        }
        .ok_or(PaymentError::CourseNotFoundForVerification)?;

        match self.config.signing_secret() {
            Some(secret) => {
                if !verify_checkout(secret, order_id, payment_id, &req.signature) {
                    warn!("Signature mismatch for order {} payment {}", order_id, payment_id);
                    return Err(PaymentError::InvalidSignature);
                }
            }
            None if self.config.allow_dev_fallback => {
                warn!(
                    "No gateway secret configured, skipping signature check for payment {}",
                    payment_id
                );
            }
            None => return Err(PaymentError::GatewayUnavailable),
        }

        let amount = self.authoritative_amount(order_id, &course).await;

        let now = Utc::now();
        let payment = Payment {
            id: Uuid::new_v4(),
            user_id,
            course_id: course.id,
            gateway_order_id: order_id.to_string(),
            gateway_payment_id: Some(payment_id.to_string()),
            gateway_signature: Some(req.signature.clone()),
            amount,
            currency: self.config.currency.clone(),
            status: PaymentStatus::Paid,
            raw: serde_json::to_value(req).ok(),
            receipt: format!("rcpt_{}", now.timestamp_millis()),
            created_at: now,
            updated_at: now,
        };

        match self.store.commit_verified_payment(&payment).await {
            Ok(stored) => {
                info!(
                    "Payment {} recorded, user {} enrolled in course {}",
                    payment_id, user_id, course.id
                );
                Ok(Verification {
                    payment: stored,
                    already_processed: false,
                })
            }
            // A concurrent verification won the race on the unique payment id.
            Err(StoreError::Duplicate(_)) => match self
                .store
                .find_payment_by_gateway_id(payment_id)
                .await?
            {
                Some(existing) => self.replay(existing, user_id),
                None => Err(PaymentError::TransactionFailed(format!(
                    "payment {} collided but was not found",
                    payment_id
                ))),
            },
            Err(e) => Err(PaymentError::TransactionFailed(e.to_string())),
        }
    }

    fn replay(&self, existing: Payment, user_id: Uuid) -> Result<Verification, PaymentError> {
        if existing.user_id != user_id {
            return Err(PaymentError::PaymentOwnedByAnotherUser);
        }
        info!("Payment {:?} already processed", existing.gateway_payment_id);
        Ok(Verification {
            payment: existing,
            already_processed: true,
        })
    }

    /// Gateway-reported order amount, else the course's current price.
    async fn authoritative_amount(&self, order_id: &str, course: &Course) -> i64 {
        let Some(gateway) = self.gateway.live() else {
            return course.price;
        };
        match gateway.fetch_order(order_id).await {
            Ok(order) if order.amount > 0 => order.amount,
            Ok(order) => {
                warn!("Gateway order {} reports no amount, using course price", order.id);
                course.price
            }
            Err(e) => {
                warn!("Failed to fetch order {} from gateway: {}", order_id, e);
                course.price
            }
        }
    }
}

fn stub_order(request: &OrderRequest, now_millis: i64) -> GatewayOrder {
    let suffix = Uuid::new_v4().simple().to_string();
    GatewayOrder {
        id: format!("order_stub_{}_{}", now_millis, &suffix[..8]),
        amount: request.amount,
        currency: request.currency.clone(),
        receipt: Some(request.receipt.clone()),
        status: "created".to_string(),
    }
}
