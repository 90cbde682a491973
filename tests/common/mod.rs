// tests/common/mod.rs

#![allow(dead_code)]

use std::{
    sync::{
        Arc,
        atomic::{AtomicI64, Ordering},
    },
    time::Duration,
};

use academy_backend::{
    config::{Config, Environment, GatewayCredentials, PaymentConfig},
    models::{
        course::Course,
        payment::{GatewayOrder, OrderRequest},
        user::Role,
    },
    routes,
    services::gateway::{Gateway, GatewayError, PaymentGateway},
    state::AppState,
    store::{MemoryStore, Store},
    utils::jwt::sign_jwt,
};
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

pub const JWT_SECRET: &str = "test_secret_for_integration_tests";
pub const GATEWAY_SECRET: &str = "rzp_test_secret";

/// Gateway double. `fetch_order` reports `order_amount` when set,
/// otherwise fails so the caller falls back to the course price.
#[derive(Default)]
pub struct FakeGateway {
    pub order_amount: AtomicI64,
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_order(&self, request: &OrderRequest) -> Result<GatewayOrder, GatewayError> {
        Ok(GatewayOrder {
            id: format!("order_{}", Uuid::new_v4().simple()),
            amount: request.amount,
            currency: request.currency.clone(),
            receipt: Some(request.receipt.clone()),
            status: "created".to_string(),
        })
    }

    async fn fetch_order(&self, order_id: &str) -> Result<GatewayOrder, GatewayError> {
        match self.order_amount.load(Ordering::SeqCst) {
            0 => Err(GatewayError::Unavailable),
            amount => Ok(GatewayOrder {
                id: order_id.to_string(),
                amount,
                currency: "INR".to_string(),
                receipt: None,
                status: "paid".to_string(),
            }),
        }
    }
}

pub struct TestApp {
    pub address: String,
    pub store: Arc<MemoryStore>,
    pub gateway: Arc<FakeGateway>,
    pub client: reqwest::Client,
}

pub enum GatewayMode {
    /// Credentials configured, fake gateway answering.
    Live,
    /// Development without credentials: stub orders, unsigned verification.
    DevUnavailable,
}

fn test_config(mode: &GatewayMode) -> Config {
    let (credentials, environment) = match mode {
        GatewayMode::Live => (
            Some(GatewayCredentials {
                key_id: "rzp_test_key".to_string(),
                key_secret: GATEWAY_SECRET.to_string(),
            }),
            Environment::Production,
        ),
        GatewayMode::DevUnavailable => (None, Environment::Development),
    };

    Config {
        database_url: "memory".to_string(),
        jwt_secret: JWT_SECRET.to_string(),
        rust_log: "error".to_string(),
        environment,
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        cors_origins: vec!["http://localhost:5173".to_string()],
        payment: PaymentConfig {
            credentials,
            api_base: "http://127.0.0.1:9/v1".parse().unwrap(),
            currency: "INR".to_string(),
            timeout: Duration::from_secs(1),
            allow_dev_fallback: environment == Environment::Development,
        },
    }
}

/// Spawns the app on a random port, backed by an in-memory store.
pub async fn spawn_app() -> TestApp {
    spawn_app_with(GatewayMode::Live).await
}

pub async fn spawn_app_with(mode: GatewayMode) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let fake = Arc::new(FakeGateway::default());
    let gateway = match mode {
        GatewayMode::Live => Gateway::Live(fake.clone()),
        GatewayMode::DevUnavailable => Gateway::Unavailable,
    };

    let state = AppState::new(store.clone(), test_config(&mode), gateway);
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        store,
        gateway: fake,
        client: reqwest::Client::new(),
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    /// A fresh user id and a bearer token for it.
    pub fn login(&self, role: Role) -> (Uuid, String) {
        let id = Uuid::new_v4();
        let token = sign_jwt(id, role, JWT_SECRET, 600).unwrap();
        (id, token)
    }

    pub async fn seed_course(&self, price: i64, lesson_count: i32) -> Course {
        let course = Course {
            id: Uuid::new_v4(),
            title: "Rust for Backend Engineers".to_string(),
            description: String::new(),
            created_by: Uuid::new_v4(),
            price,
            lesson_count,
            students: Vec::new(),
            created_at: Utc::now(),
        };
        self.store.insert_course(&course).await.unwrap();
        course
    }

    pub async fn course(&self, id: Uuid) -> Course {
        self.store.get_course(id).await.unwrap().unwrap()
    }
}
