// Payment gateway client
// Only order creation goes out to the gateway; confirmations are verified locally

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GatewayError {
    #[error("Gateway credentials not configured")]
    NotConfigured,

    #[error("Gateway request failed: {0}")]
    Http(String),

    #[error("Gateway error {status}: {code} - {description}")]
    Api {
        status: u16,
        code: String,
        description: String,
    },

    #[error("Malformed gateway response: {0}")]
    Decode(String),
}

impl GatewayError {
    /// Transport failures and gateway-side 5xx are worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Http(_) => true,
            GatewayError::Api { status, .. } => *status >= 500,
            GatewayError::NotConfigured | GatewayError::Decode(_) => false,
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(error: reqwest::Error) -> Self {
        GatewayError::Http(error.to_string())
    }
}

/// Order as returned by the gateway
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatewayOrder {
    pub id: String,
    /// Minor currency units
    pub amount: i64,
    pub currency: String,
    pub receipt: Option<String>,
    pub status: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates an order for `amount` minor units
    async fn create_order(
        &self,
        amount: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, GatewayError>;

    /// Public key id handed to the checkout client
    fn key_id(&self) -> &str;
}

#[derive(Debug, Clone)]
pub struct RazorpayConfig {
    pub key_id: String,
    pub key_secret: String,
    pub api_base_url: String,
    pub timeout: Duration,
}

impl RazorpayConfig {
    pub fn from_config() -> Self {
        let config = crate::app_config::config();
        Self {
            key_id: config.razorpay_key_id.clone(),
            key_secret: config.razorpay_key_secret.clone(),
            api_base_url: config.razorpay_api_base_url.clone(),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Serialize)]
struct CreateOrderRequest<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
}

#[derive(Debug, Deserialize)]
struct RazorpayErrorBody {
    error: RazorpayErrorDetail,
}

#[derive(Debug, Deserialize)]
struct RazorpayErrorDetail {
    code: String,
    description: String,
}

#[derive(Clone)]
pub struct RazorpayClient {
    client: Client,
    config: RazorpayConfig,
}

impl RazorpayClient {
    pub fn new(config: RazorpayConfig) -> Result<Self, GatewayError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    pub fn is_configured(&self) -> bool {
        !self.config.key_id.is_empty() && !self.config.key_secret.is_empty()
    }
}

#[async_trait]
impl PaymentGateway for RazorpayClient {
    async fn create_order(
        &self,
        amount: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, GatewayError> {
        if !self.is_configured() {
            return Err(GatewayError::NotConfigured);
        }

        let url = format!("{}/orders", self.config.api_base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .json(&CreateOrderRequest {
                amount,
                currency,
                receipt,
            })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        debug!(status = %status, "Gateway create_order response");

        if status.is_success() {
            let order: GatewayOrder =
                serde_json::from_str(&body).map_err(|e| GatewayError::Decode(e.to_string()))?;
            info!(
                order_id = %order.id,
                amount = order.amount,
                currency = %order.currency,
                "Gateway order created"
            );
            Ok(order)
        } else {
            let (code, description) = serde_json::from_str::<RazorpayErrorBody>(&body)
                .map(|e| (e.error.code, e.error.description))
                .unwrap_or_else(|_| ("UNKNOWN".to_string(), body.clone()));
            error!(code = %code, description = %description, "Gateway order creation failed");
            Err(GatewayError::Api {
                status: status.as_u16(),
                code,
                description,
            })
        }
    }

    fn key_id(&self) -> &str {
        &self.config.key_id
    }
}
