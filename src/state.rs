// src/state.rs

use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    config::Config,
    services::{gateway::Gateway, payment::PaymentService},
    store::Store,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Config,
    pub payments: Arc<PaymentService>,
}

impl AppState {
    /// Wires the payment service to the same store the handlers use.
    pub fn new(store: Arc<dyn Store>, config: Config, gateway: Gateway) -> Self {
        let payments = Arc::new(PaymentService::new(
            store.clone(),
            gateway,
            config.payment.clone(),
        ));
        Self {
            store,
            config,
            payments,
        }
    }
}

impl FromRef<AppState> for Arc<dyn Store> {
    fn from_ref(state: &AppState) -> Self {
        state.store.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Arc<PaymentService> {
    fn from_ref(state: &AppState) -> Self {
        state.payments.clone()
    }
}
