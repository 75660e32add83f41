// Audit trail for quota denials, settlements and tier changes
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AuditAction {
    UsageDenied,
    OrderCreated,
    PaymentSettled,
    PaymentRejected,
    PaymentSettlementFailed,
    TierChanged,
    SubscriptionsExpired,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: Uuid,
    pub action: AuditAction,
    pub user_id: Option<Uuid>,
    pub resource_id: Option<String>,
    pub resource_type: String,
    pub details: Option<String>,
    pub timestamp: DateTime<Utc>,
}

pub struct AuditLogger;

impl AuditLogger {
    /// Quota denial: who, which feature, why
    pub fn log_usage_denied(user_id: Uuid, feature: &str, reason: &str) {
        Self::emit(AuditLog {
            id: Uuid::new_v4(),
            action: AuditAction::UsageDenied,
            user_id: Some(user_id),
            resource_id: Some(feature.to_string()),
            resource_type: "feature".to_string(),
            details: Some(reason.to_string()),
            timestamp: Utc::now(),
        });
    }

    /// Payment lifecycle events keyed by gateway order id
    pub fn log_payment_action(
        action: AuditAction,
        user_id: Option<Uuid>,
        order_id: &str,
        details: Option<String>,
    ) {
        Self::emit(AuditLog {
            id: Uuid::new_v4(),
            action,
            user_id,
            resource_id: Some(order_id.to_string()),
            resource_type: "payment".to_string(),
            details,
            timestamp: Utc::now(),
        });
    }

    pub fn log_tier_change(user_id: Uuid, tier: &str, details: Option<String>) {
        Self::emit(AuditLog {
            id: Uuid::new_v4(),
            action: AuditAction::TierChanged,
            user_id: Some(user_id),
            resource_id: Some(tier.to_string()),
            resource_type: "tier".to_string(),
            details,
            timestamp: Utc::now(),
        });
    }

    pub fn log_subscriptions_expired(count: u64) {
        Self::emit(AuditLog {
            id: Uuid::new_v4(),
            action: AuditAction::SubscriptionsExpired,
            user_id: None,
            resource_id: None,
            resource_type: "subscription".to_string(),
            details: Some(format!("{} subscriptions deactivated", count)),
            timestamp: Utc::now(),
        });
    }

    fn emit(audit_log: AuditLog) {
        let json_log = serde_json::to_string(&audit_log).unwrap_or_else(|e| {
            warn!("Failed to serialize audit log: {}", e);
            format!("{:?}", audit_log)
        });

        info!(target: "audit", "{}", json_log);
    }
}
