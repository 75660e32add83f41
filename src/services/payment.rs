// Payment Settlement and order creation
// Settlement verifies the gateway signature, then commits the payment transition and
// the new subscription window together

use rand::{thread_rng, Rng};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{error, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::models::{NewPayment, NewPaymentPlan, Payment, PaymentPlan, PaymentSettlement};
use crate::services::clock::Clock;
use crate::services::razorpay::{GatewayError, GatewayOrder, PaymentGateway};
use crate::services::signature::SignatureVerifier;
use crate::services::subscription::{SubscriptionError, SubscriptionManager};
use crate::store::{Store, StoreError};
use crate::utils::audit_logger::{AuditAction, AuditLogger};

const MAX_RETRY_DELAY: Duration = Duration::from_secs(5);

// =============================================================================
// ERROR TYPES
// =============================================================================

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("No pending payment for order {0}")]
    OrderNotFound(String),

    #[error("Payment plan not found: {0}")]
    PlanNotFound(Uuid),

    #[error("User not found: {0}")]
    UserNotFound(Uuid),

    #[error("Invalid payment signature")]
    InvalidSignature,

    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Payment gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for PaymentError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Unavailable(msg) => PaymentError::StoreUnavailable(msg),
            other => PaymentError::Store(other),
        }
    }
}

impl From<SubscriptionError> for PaymentError {
    fn from(error: SubscriptionError) -> Self {
        match error {
            SubscriptionError::PlanNotFound(id) => PaymentError::PlanNotFound(id),
            SubscriptionError::Store(e) => e.into(),
        }
    }
}

// =============================================================================
// SETTINGS
// =============================================================================

/// Bounded retry with exponential backoff for gateway calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retry_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_attempts: 3,
            retry_delay: Duration::from_millis(200),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PaymentSettings {
    pub currency: String,
    pub retry: RetryPolicy,
}

impl PaymentSettings {
    pub fn from_config() -> Self {
        let config = crate::app_config::config();
        Self {
            currency: config.payment_currency.clone(),
            retry: RetryPolicy {
                retry_attempts: config.gateway_retry_attempts,
                retry_delay: Duration::from_millis(config.gateway_retry_delay_ms),
            },
        }
    }
}

// =============================================================================
// RESPONSES
// =============================================================================

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PlanSummary {
    pub id: Uuid,
    pub name: String,
    pub price: i32,
    pub duration_days: i32,
}

/// What the checkout client needs to open the gateway's payment sheet
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OrderSummary {
    pub order_id: String,
    pub amount: i64,
    pub currency: String,
    pub receipt: String,
    pub key_id: String,
    pub plan: PlanSummary,
}

// =============================================================================
// SERVICE
// =============================================================================

pub struct PaymentService {
    store: Arc<dyn Store>,
    gateway: Arc<dyn PaymentGateway>,
    verifier: SignatureVerifier,
    subscriptions: Arc<SubscriptionManager>,
    clock: Arc<dyn Clock>,
    settings: PaymentSettings,
}

impl PaymentService {
    pub fn new(
        store: Arc<dyn Store>,
        gateway: Arc<dyn PaymentGateway>,
        verifier: SignatureVerifier,
        subscriptions: Arc<SubscriptionManager>,
        clock: Arc<dyn Clock>,
        settings: PaymentSettings,
    ) -> Self {
        Self {
            store,
            gateway,
            verifier,
            subscriptions,
            clock,
            settings,
        }
    }

    /// Opens a gateway order for the plan and records a PENDING payment
    pub async fn create_order(
        &self,
        user_id: Uuid,
        plan_id: Uuid,
    ) -> Result<OrderSummary, PaymentError> {
        if self.store.find_user(user_id).await?.is_none() {
            return Err(PaymentError::UserNotFound(user_id));
        }

        let plan = self
            .store
            .find_plan(plan_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or(PaymentError::PlanNotFound(plan_id))?;

        let now = self.clock.now();
        let receipt = format!("receipt_{}_{:08x}", now.timestamp(), thread_rng().gen::<u32>());
        let amount = i64::from(plan.price);

        let order = self
            .create_gateway_order(amount, &self.settings.currency, &receipt)
            .await?;

        let payment = self
            .store
            .insert_payment(NewPayment {
                user_id,
                plan_id: plan.id,
                gateway_order_id: order.id.clone(),
                amount: plan.price,
                currency: self.settings.currency.clone(),
                receipt_number: receipt.clone(),
                created_at: now,
            })
            .await?;

        info!(
            user_id = %user_id,
            order_id = %payment.gateway_order_id,
            amount = payment.amount,
            "Payment order created"
        );
        AuditLogger::log_payment_action(
            AuditAction::OrderCreated,
            Some(user_id),
            &payment.gateway_order_id,
            Some(format!("plan {} amount {}", plan.name, payment.amount)),
        );

        Ok(OrderSummary {
            order_id: order.id,
            amount,
            currency: self.settings.currency.clone(),
            receipt,
            key_id: self.gateway.key_id().to_string(),
            plan: PlanSummary {
                id: plan.id,
                name: plan.name,
                price: plan.price,
                duration_days: plan.duration_days,
            },
        })
    }

    /// Confirms a gateway payment and opens the subscription it paid for.
    ///
    /// Rejects a bad signature before touching the store. The payment moves to
    /// COMPLETED only together with its subscription.
    pub async fn settle_payment(
        &self,
        order_id: &str,
        payment_id: &str,
        signature: &str,
        method: Option<String>,
    ) -> Result<Payment, PaymentError> {
        if !self.verifier.verify(order_id, payment_id, signature) {
            warn!(
                order_id = %order_id,
                payment_id = %payment_id,
                "Payment signature verification failed"
            );
            AuditLogger::log_payment_action(
                AuditAction::PaymentRejected,
                None,
                order_id,
                Some(format!("invalid signature for payment {}", payment_id)),
            );
            return Err(PaymentError::InvalidSignature);
        }

        let payment = self
            .store
            .find_payment_by_order(order_id)
            .await?
            .filter(|p| p.is_pending())
            .ok_or_else(|| PaymentError::OrderNotFound(order_id.to_string()))?;

        let subscription = self.subscriptions.open_subscription(&payment).await?;
        let settlement = PaymentSettlement {
            gateway_order_id: order_id.to_string(),
            gateway_payment_id: payment_id.to_string(),
            gateway_signature: signature.to_string(),
            payment_method: method,
            settled_at: self.clock.now(),
        };

        match self.store.settle_payment(settlement, subscription).await {
            Ok((payment, subscription)) => {
                info!(
                    user_id = %payment.user_id,
                    order_id = %order_id,
                    subscription_id = %subscription.id,
                    end_date = %subscription.end_date,
                    "Payment settled"
                );
                AuditLogger::log_payment_action(
                    AuditAction::PaymentSettled,
                    Some(payment.user_id),
                    order_id,
                    Some(format!(
                        "payment {} opened subscription {} until {}",
                        payment_id, subscription.id, subscription.end_date
                    )),
                );
                Ok(payment)
            },
            // Another settlement for the same order committed first
            Err(StoreError::NotFound) => Err(PaymentError::OrderNotFound(order_id.to_string())),
            Err(e) => {
                error!(order_id = %order_id, "Payment settlement failed: {}", e);
                AuditLogger::log_payment_action(
                    AuditAction::PaymentSettlementFailed,
                    Some(payment.user_id),
                    order_id,
                    Some(e.to_string()),
                );
                Err(e.into())
            },
        }
    }

    pub async fn list_plans(&self) -> Result<Vec<PaymentPlan>, PaymentError> {
        Ok(self.store.list_active_plans().await?)
    }

    pub async fn find_plan(&self, plan_id: Uuid) -> Result<PaymentPlan, PaymentError> {
        self.store
            .find_plan(plan_id)
            .await?
            .ok_or(PaymentError::PlanNotFound(plan_id))
    }

    pub async fn create_plan(&self, plan: NewPaymentPlan) -> Result<PaymentPlan, PaymentError> {
        plan.validate()
            .map_err(|e| PaymentError::InvalidPlan(e.to_string()))?;
        let plan = self.store.insert_plan(plan, self.clock.now()).await?;
        info!(plan_id = %plan.id, name = %plan.name, "Payment plan created");
        Ok(plan)
    }

    async fn create_gateway_order(
        &self,
        amount: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, GatewayError> {
        let retry = self.settings.retry;
        let mut retry_count = 0;
        let mut delay = retry.retry_delay;

        loop {
            match self.gateway.create_order(amount, currency, receipt).await {
                Ok(order) => return Ok(order),
                Err(e) if e.is_retryable() && retry_count < retry.retry_attempts => {
                    warn!(
                        "Gateway order creation failed (attempt {}/{}): {}",
                        retry_count + 1,
                        retry.retry_attempts,
                        e
                    );

                    sleep(delay).await;

                    // Exponential backoff with jitter and maximum delay cap
                    let jitter = thread_rng().gen_range(0..100);
                    delay =
                        std::cmp::min(delay * 2 + Duration::from_millis(jitter), MAX_RETRY_DELAY);
                    retry_count += 1;
                },
                Err(e) => {
                    error!(
                        "Gateway order creation failed after {} attempts: {}",
                        retry_count + 1,
                        e
                    );
                    return Err(e);
                },
            }
        }
    }
}
