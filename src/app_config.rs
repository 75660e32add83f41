// Centralized configuration management for the Aspirant backend
// Load ALL env vars ONCE at startup

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Global application configuration loaded once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(|| {
    // For tests, load .env file first
    #[cfg(test)]
    dotenv::dotenv().ok();

    AppConfig::from_env().expect("Failed to load configuration")
});

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    // Server
    pub bind_address: String,
    pub port: u16,
    pub environment: Environment,
    pub rust_log: String,

    // Database
    pub database_url: String,
    pub database_max_connections: u32,
    pub database_min_connections: u32,
    pub database_connect_timeout: u64,
    pub database_idle_timeout: u64,
    pub database_max_lifetime: u64,
    pub disable_embedded_migrations: bool,

    // Payment gateway
    pub razorpay_key_id: String,
    pub razorpay_key_secret: String,
    pub razorpay_api_base_url: String,
    pub payment_currency: String,
    pub gateway_retry_attempts: u32,
    pub gateway_retry_delay_ms: u64,

    // Free tier quota defaults
    pub free_daily_pyq_limit: u32,
    pub free_weekly_mock_limit: u32,
    pub free_daily_reel_limit: u32,
    pub free_daily_ai_chat_limit: u32,

    // Background work
    pub subscription_sweep_interval_secs: u64,

    // Security
    pub cors_allowed_origins: Vec<String>,

    // Nested configs
    pub jwt: JwtConfig,
}

/// Environment type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Environment {
    Development,
    Test,
    Staging,
    Production,
}

impl From<String> for Environment {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Environment::Development,
            "test" => Environment::Test,
            "staging" | "stage" => Environment::Staging,
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Staging => write!(f, "staging"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// JWT configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub access_secret: String,
    pub access_expiry: u64,
    pub audience: String,
    pub issuer: String,
    pub key_version: u32,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Helper function to get required env var
        let get_required = |key: &str| -> Result<String, ConfigError> {
            env::var(key).map_err(|_| ConfigError::MissingVar(key.to_string()))
        };

        // Helper function to get optional env var with default
        let get_or_default = |key: &str, default: &str| -> String {
            env::var(key).unwrap_or_else(|_| default.to_string())
        };

        // Helper function to parse env var with default
        let parse_or_default = |key: &str, default: &str| -> Result<u32, ConfigError> {
            get_or_default(key, default).parse().map_err(|_| {
                ConfigError::InvalidValue(key.to_string(), "not a valid u32".to_string())
            })
        };

        let parse_u64_or_default = |key: &str, default: &str| -> Result<u64, ConfigError> {
            get_or_default(key, default).parse().map_err(|_| {
                ConfigError::InvalidValue(key.to_string(), "not a valid u64".to_string())
            })
        };

        let parse_bool_or_default = |key: &str, default: &str| -> bool {
            get_or_default(key, default).to_lowercase() == "true"
        };

        // Quota ceilings must be finite and positive
        let parse_limit = |key: &str, default: &str| -> Result<u32, ConfigError> {
            let value = parse_or_default(key, default)?;
            if value == 0 {
                return Err(ConfigError::InvalidValue(
                    key.to_string(),
                    "limit must be greater than zero".to_string(),
                ));
            }
            Ok(value)
        };

        // Parse bind address to extract port
        let bind_address = get_or_default("BIND_ADDRESS", "0.0.0.0:8080");
        let port = bind_address
            .rsplit(':')
            .next()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let environment = Environment::from(get_or_default("ENVIRONMENT", "development"));
        let rust_log = get_or_default("RUST_LOG", "info");

        // JWT secret validation
        let jwt_access_secret = get_required("JWT_ACCESS_SECRET")?;
        if jwt_access_secret.len() < 32 {
            return Err(ConfigError::InvalidValue(
                "JWT_ACCESS_SECRET".to_string(),
                "Secret must be at least 32 characters long".to_string(),
            ));
        }

        let jwt = JwtConfig {
            access_secret: jwt_access_secret,
            access_expiry: parse_u64_or_default("JWT_ACCESS_EXPIRY", "3600")?,
            audience: get_or_default("JWT_AUDIENCE", "aspirant.app"),
            issuer: get_or_default("JWT_ISSUER", "aspirant.app"),
            key_version: parse_or_default("JWT_KEY_VERSION", "1")?,
        };

        // The key secret doubles as the settlement signature secret
        let razorpay_key_secret = get_required("RAZORPAY_KEY_SECRET")?;
        if razorpay_key_secret.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "RAZORPAY_KEY_SECRET".to_string(),
                "Secret must not be empty".to_string(),
            ));
        }

        let payment_currency = get_or_default("PAYMENT_CURRENCY", "INR").to_uppercase();
        if payment_currency.len() != 3 {
            return Err(ConfigError::InvalidValue(
                "PAYMENT_CURRENCY".to_string(),
                "expected a 3-letter ISO currency code".to_string(),
            ));
        }

        let cors_allowed_origins: Vec<String> = get_or_default("CORS_ALLOWED_ORIGINS", "*")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            bind_address,
            port,
            environment,
            rust_log,
            database_url: get_required("DATABASE_URL")?,
            database_max_connections: parse_or_default("DATABASE_MAX_CONNECTIONS", "20")?,
            database_min_connections: parse_or_default("DATABASE_MIN_CONNECTIONS", "2")?,
            database_connect_timeout: parse_u64_or_default("DATABASE_CONNECT_TIMEOUT", "30")?,
            database_idle_timeout: parse_u64_or_default("DATABASE_IDLE_TIMEOUT", "600")?,
            database_max_lifetime: parse_u64_or_default("DATABASE_MAX_LIFETIME", "1800")?,
            disable_embedded_migrations: parse_bool_or_default(
                "DISABLE_EMBEDDED_MIGRATIONS",
                "false",
            ),
            razorpay_key_id: get_or_default("RAZORPAY_KEY_ID", ""),
            razorpay_key_secret,
            razorpay_api_base_url: get_or_default(
                "RAZORPAY_API_BASE_URL",
                "https://api.razorpay.com/v1",
            ),
            payment_currency,
            gateway_retry_attempts: parse_or_default("GATEWAY_RETRY_ATTEMPTS", "3")?,
            gateway_retry_delay_ms: parse_u64_or_default("GATEWAY_RETRY_DELAY_MS", "200")?,
            free_daily_pyq_limit: parse_limit("FREE_DAILY_PYQ_LIMIT", "10")?,
            free_weekly_mock_limit: parse_limit("FREE_WEEKLY_MOCK_LIMIT", "1")?,
            free_daily_reel_limit: parse_limit("FREE_DAILY_REEL_LIMIT", "10")?,
            free_daily_ai_chat_limit: parse_limit("FREE_DAILY_AI_CHAT_LIMIT", "5")?,
            subscription_sweep_interval_secs: parse_u64_or_default(
                "SUBSCRIPTION_SWEEP_INTERVAL_SECS",
                "0",
            )?,
            cors_allowed_origins,
            jwt,
        })
    }
}

/// Get the global configuration instance
/// This is the primary way to access configuration throughout the app
pub fn config() -> &'static AppConfig {
    &CONFIG
}
