// src/config.rs

use std::{env, net::SocketAddr, time::Duration};

use dotenvy::dotenv;
use url::Url;

const DEFAULT_GATEWAY_BASE: &str = "https://api.razorpay.com/v1";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("RAZORPAY_KEY_ID and RAZORPAY_KEY_SECRET are required when APP_ENV=production")]
    MissingGatewayCredentials,

    #[error("the in-memory store cannot be used when APP_ENV=production")]
    MemoryStoreInProduction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

/// Key pair issued by the payment gateway. The secret also signs checkout callbacks.
#[derive(Clone)]
pub struct GatewayCredentials {
    pub key_id: String,
    pub key_secret: String,
}

impl std::fmt::Debug for GatewayCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayCredentials")
            .field("key_id", &self.key_id)
            .field("key_secret", &"<redacted>")
            .finish()
    }
}

/// Everything the payment order and verification steps need.
/// Built once at startup and injected; there is no global gateway client.
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub credentials: Option<GatewayCredentials>,
    pub api_base: Url,
    pub currency: String,
    pub timeout: Duration,
    /// Stub orders and unsigned verification are allowed only when this is set.
    pub allow_dev_fallback: bool,
}

impl PaymentConfig {
    pub fn signing_secret(&self) -> Option<&str> {
        self.credentials.as_ref().map(|c| c.key_secret.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub rust_log: String,
    pub environment: Environment,
    pub bind_addr: SocketAddr,
    pub cors_origins: Vec<String>,
    pub payment: PaymentConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &'static str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let jwt_secret = get("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        let rust_log = get("RUST_LOG").unwrap_or_else(|| "info".to_string());

        let environment = match get("APP_ENV").as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("development") | Some("dev") => Environment::Development,
            Some("production") | Some("prod") => Environment::Production,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "APP_ENV",
                    reason: format!("unknown environment '{}'", other),
                });
            }
        };

        let bind_addr = get("BIND_ADDR")
            .unwrap_or_else(|| "0.0.0.0:3000".to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                name: "BIND_ADDR",
                reason: e.to_string(),
            })?;

        let cors_origins = get("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173,http://localhost:3000".to_string())
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();

        let credentials = match (get("RAZORPAY_KEY_ID"), get("RAZORPAY_KEY_SECRET")) {
            (Some(key_id), Some(key_secret)) => Some(GatewayCredentials { key_id, key_secret }),
            _ => None,
        };

        let api_base = Url::parse(
            &get("RAZORPAY_API_BASE").unwrap_or_else(|| DEFAULT_GATEWAY_BASE.to_string()),
        )
        .map_err(|e| ConfigError::Invalid {
            name: "RAZORPAY_API_BASE",
            reason: e.to_string(),
        })?;

        let timeout_secs = match get("GATEWAY_TIMEOUT_SECS") {
            Some(raw) => raw.parse::<u64>().map_err(|e| ConfigError::Invalid {
                name: "GATEWAY_TIMEOUT_SECS",
                reason: e.to_string(),
            })?,
            None => 10,
        };

        let currency = get("PAYMENT_CURRENCY").unwrap_or_else(|| "INR".to_string());

        if environment == Environment::Production {
            if credentials.is_none() {
                return Err(ConfigError::MissingGatewayCredentials);
            }
            if database_url == "memory" {
                return Err(ConfigError::MemoryStoreInProduction);
            }
        }

        Ok(Self {
            database_url,
            jwt_secret,
            rust_log,
            environment,
            bind_addr,
            cors_origins,
            payment: PaymentConfig {
                credentials,
                api_base,
                currency,
                timeout: Duration::from_secs(timeout_secs),
                allow_dev_fallback: environment == Environment::Development,
            },
        })
    }
}
