// src/services/gateway.rs

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use tracing::info;

use crate::{
    config::{GatewayCredentials, PaymentConfig},
    models::payment::{GatewayOrder, OrderRequest},
};

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("payment gateway is not configured")]
    Unavailable,
}

/// Remote order API of the payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_order(&self, request: &OrderRequest) -> Result<GatewayOrder, GatewayError>;
    async fn fetch_order(&self, order_id: &str) -> Result<GatewayOrder, GatewayError>;
}

/// Gateway handle injected into the payment service.
#[derive(Clone)]
pub enum Gateway {
    Live(Arc<dyn PaymentGateway>),
    Unavailable,
}

impl Gateway {
    /// A live Razorpay client when credentials are present, `Unavailable` otherwise.
    pub fn from_config(config: &PaymentConfig) -> Result<Self, GatewayError> {
        match &config.credentials {
            Some(credentials) => {
                let client = RazorpayClient::new(credentials.clone(), config)?;
                info!("Payment gateway configured at {}", config.api_base);
                Ok(Gateway::Live(Arc::new(client)))
            }
            None => {
                info!("Payment gateway credentials missing, running without a gateway");
                Ok(Gateway::Unavailable)
            }
        }
    }

    pub fn live(&self) -> Option<&Arc<dyn PaymentGateway>> {
        match self {
            Gateway::Live(gateway) => Some(gateway),
            Gateway::Unavailable => None,
        }
    }
}

pub struct RazorpayClient {
    client: Client,
    base: String,
    credentials: GatewayCredentials,
}

impl RazorpayClient {
    pub fn new(credentials: GatewayCredentials, config: &PaymentConfig) -> Result<Self, GatewayError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base: config.api_base.as_str().trim_end_matches('/').to_string(),
            credentials,
        })
    }
}

#[async_trait]
impl PaymentGateway for RazorpayClient {
    async fn create_order(&self, request: &OrderRequest) -> Result<GatewayOrder, GatewayError> {
        let order = self
            .client
            .post(format!("{}/orders", self.base))
            .basic_auth(&self.credentials.key_id, Some(&self.credentials.key_secret))
            .json(request)
            .send()
            .await?
            .error_for_status()?
            .json::<GatewayOrder>()
            .await?;
        Ok(order)
    }

    async fn fetch_order(&self, order_id: &str) -> Result<GatewayOrder, GatewayError> {
        let order = self
            .client
            .get(format!("{}/orders/{}", self.base, order_id))
            .basic_auth(&self.credentials.key_id, Some(&self.credentials.key_secret))
            .send()
            .await?
            .error_for_status()?
            .json::<GatewayOrder>()
            .await?;
        Ok(order)
    }
}
