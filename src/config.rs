//! Environment-driven server configuration.

use thiserror::Error;

const DEFAULT_API_URL: &str = "https://payments.yoco.com/api/checkouts";
const DEFAULT_MAX_AMOUNT: f64 = 100_000.0;
const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),
    #[error("invalid value for environment variable {0}")]
    InvalidVar(&'static str),
}

/// Deployment mode. Sandbox surfaces gateway error detail to callers; live
/// redacts it to a generic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    Sandbox,
    Live,
}

impl AppMode {
    pub fn is_live(self) -> bool {
        matches!(self, Self::Live)
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bearer key for the outbound gateway API call.
    pub gateway_secret_key: String,
    /// Checkout-intent endpoint of the gateway.
    pub gateway_api_url: String,
    /// Shared webhook secret. Absent means signature verification is skipped,
    /// an explicit operator opt-out for non-production use.
    pub webhook_secret: Option<String>,
    /// Maximum accepted payment amount in major currency units.
    pub max_amount: f64,
    pub mode: AppMode,
    /// CORS allow-list; `None` means all origins are allowed.
    pub allowed_origins: Option<Vec<String>>,
    /// Optional Redis backend for webhook event dedup.
    pub redis_url: Option<String>,
    pub port: u16,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let gateway_secret_key = std::env::var("YOCO_SECRET_KEY")
            .map_err(|_| ConfigError::MissingVar("YOCO_SECRET_KEY"))?;

        let gateway_api_url =
            std::env::var("YOCO_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());

        let webhook_secret = std::env::var("YOCO_WEBHOOK_SECRET")
            .ok()
            .filter(|s| !s.is_empty());

        let max_amount = match std::env::var("MAX_PAYMENT_AMOUNT") {
            Ok(raw) => raw
                .parse::<f64>()
                .ok()
                .filter(|v| *v > 0.0)
                .ok_or(ConfigError::InvalidVar("MAX_PAYMENT_AMOUNT"))?,
            Err(_) => DEFAULT_MAX_AMOUNT,
        };

        let port = match std::env::var("PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidVar("PORT"))?,
            Err(_) => DEFAULT_PORT,
        };

        let mode = match std::env::var("APP_MODE").as_deref() {
            Ok("live") | Ok("production") => AppMode::Live,
            _ => AppMode::Sandbox,
        };

        let allowed_origins = std::env::var("ALLOWED_ORIGINS")
            .ok()
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|v| !v.is_empty());

        Ok(Self {
            gateway_secret_key,
            gateway_api_url,
            webhook_secret,
            max_amount,
            mode,
            allowed_origins,
            redis_url: std::env::var("REDIS_URL").ok(),
            port,
        })
    }
}

#[cfg(test)]
impl ServerConfig {
    pub(crate) fn for_tests() -> Self {
        Self {
            gateway_secret_key: "sk_test_key".to_string(),
            gateway_api_url: "http://127.0.0.1:0/checkouts".to_string(),
            webhook_secret: None,
            max_amount: DEFAULT_MAX_AMOUNT,
            mode: AppMode::Sandbox,
            allowed_origins: None,
            redis_url: None,
            port: 0,
        }
    }
}
