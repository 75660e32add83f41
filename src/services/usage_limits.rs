// Limit Evaluator
// Decides whether a user may consume a metered feature. Fails closed on any store error.

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::models::{Ceiling, FeatureKind, Tier};
use crate::services::clock::Clock;
use crate::services::subscription::SubscriptionManager;
use crate::services::tier_store::{TierError, TierStore};
use crate::services::usage_ledger::UsageLedger;
use crate::store::StoreError;
use crate::utils::audit_logger::AuditLogger;

// =============================================================================
// DECISIONS
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    LimitReached,
    StoreUnavailable,
    UserNotFound,
}

/// Outcome of a quota check. `remaining` serializes as -1 when unlimited.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UsageDecision {
    pub allowed: bool,
    pub remaining: Ceiling,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub denial: Option<DenialReason>,
}

impl UsageDecision {
    pub fn unlimited() -> Self {
        Self {
            allowed: true,
            remaining: Ceiling::Unlimited,
            reason: "Unlimited access".to_string(),
            denial: None,
        }
    }

    pub fn granted(remaining: Ceiling) -> Self {
        Self {
            allowed: true,
            remaining,
            reason: "Access granted".to_string(),
            denial: None,
        }
    }

    pub fn limit_reached(feature: FeatureKind, ceiling: Ceiling) -> Self {
        Self {
            allowed: false,
            remaining: Ceiling::Limited(0),
            reason: format!(
                "{} limit reached ({}/{}). Upgrade to Pro for unlimited access!",
                feature.quota_label(),
                ceiling,
                feature.window().unit()
            ),
            denial: Some(DenialReason::LimitReached),
        }
    }

    pub fn unknown_user() -> Self {
        Self {
            allowed: false,
            remaining: Ceiling::Limited(0),
            reason: "User not found".to_string(),
            denial: Some(DenialReason::UserNotFound),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            allowed: false,
            remaining: Ceiling::Limited(0),
            reason: "Error checking limits".to_string(),
            denial: Some(DenialReason::StoreUnavailable),
        }
    }
}

// =============================================================================
// STATUS
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct FeatureStatus {
    pub used: u32,
    pub limit: Ceiling,
    pub remaining: Ceiling,
}

/// Per-feature usage snapshot plus the derived tier label
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LimitsStatus {
    pub tier: Tier,
    pub pyq: FeatureStatus,
    pub mock_tests: FeatureStatus,
    pub reels: FeatureStatus,
    pub ai_chat: FeatureStatus,
}

impl LimitsStatus {
    pub fn feature(&self, feature: FeatureKind) -> &FeatureStatus {
        match feature {
            FeatureKind::Pyq => &self.pyq,
            FeatureKind::MockTest => &self.mock_tests,
            FeatureKind::ReelScroll => &self.reels,
            FeatureKind::AiChat => &self.ai_chat,
        }
    }
}

#[derive(Debug, Error)]
pub enum LimitError {
    #[error(transparent)]
    Tier(#[from] TierError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LimitError {
    pub fn is_unavailable(&self) -> bool {
        match self {
            LimitError::Tier(e) => e.is_unavailable(),
            LimitError::Store(e) => e.is_unavailable(),
        }
    }

    pub fn is_user_not_found(&self) -> bool {
        matches!(
            self,
            LimitError::Tier(TierError::UserNotFound(_)) | LimitError::Store(StoreError::NotFound)
        )
    }

    /// Fail-closed decision for an evaluation that could not complete
    fn denial(&self) -> UsageDecision {
        if self.is_user_not_found() {
            UsageDecision::unknown_user()
        } else {
            UsageDecision::unavailable()
        }
    }
}

// =============================================================================
// SERVICE
// =============================================================================

pub struct UsageLimitService {
    tiers: Arc<TierStore>,
    ledger: Arc<UsageLedger>,
    subscriptions: Arc<SubscriptionManager>,
    clock: Arc<dyn Clock>,
}

impl UsageLimitService {
    pub fn new(
        tiers: Arc<TierStore>,
        ledger: Arc<UsageLedger>,
        subscriptions: Arc<SubscriptionManager>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            tiers,
            ledger,
            subscriptions,
            clock,
        }
    }

    /// Read-only quota check. Does not consume a unit.
    pub async fn check_usage(&self, user_id: Uuid, feature: FeatureKind) -> UsageDecision {
        let decision = match self.evaluate(user_id, feature).await {
            Ok(decision) => decision,
            Err(e) => {
                error!(user_id = %user_id, feature = %feature, "Limit check failed: {}", e);
                e.denial()
            },
        };

        self.audit_denial(user_id, feature, &decision);
        decision
    }

    /// Atomic check-and-consume.
    ///
    /// FREE users get the unit only if the window total stays within the ceiling, and
    /// `remaining` reflects the unit just consumed. PRO usage is always recorded.
    pub async fn check_and_record(&self, user_id: Uuid, feature: FeatureKind) -> UsageDecision {
        let decision = match self.consume(user_id, feature).await {
            Ok(decision) => decision,
            Err(e) => {
                error!(user_id = %user_id, feature = %feature, "Usage recording failed: {}", e);
                e.denial()
            },
        };

        self.audit_denial(user_id, feature, &decision);
        decision
    }

    /// Unconditional +1, for callers that already checked
    pub async fn record_usage(&self, user_id: Uuid, feature: FeatureKind) -> bool {
        match self
            .ledger
            .record(user_id, feature, self.clock.today())
            .await
        {
            Ok(count) => {
                debug!(user_id = %user_id, feature = %feature, count, "Usage recorded");
                true
            },
            Err(e) => {
                error!(user_id = %user_id, feature = %feature, "Failed to record usage: {}", e);
                false
            },
        }
    }

    pub async fn get_limits_status(&self, user_id: Uuid) -> Result<LimitsStatus, LimitError> {
        let tier = self.subscriptions.effective_tier(user_id).await?;
        let today = self.clock.today();

        let ceilings = match tier {
            Tier::Pro => None,
            Tier::Free => Some(self.tiers.free_ceilings(user_id).await?),
        };

        let mut statuses = Vec::with_capacity(FeatureKind::ALL.len());
        for feature in FeatureKind::ALL {
            let used = self.ledger.usage_in_window(user_id, feature, today).await?;
            let limit = ceilings
                .map(|c| c.for_feature(feature))
                .unwrap_or(Ceiling::Unlimited);
            statuses.push(FeatureStatus {
                used,
                limit,
                remaining: limit.remaining_after(used),
            });
        }

        Ok(LimitsStatus {
            tier,
            pyq: statuses[0],
            mock_tests: statuses[1],
            reels: statuses[2],
            ai_chat: statuses[3],
        })
    }

    async fn evaluate(
        &self,
        user_id: Uuid,
        feature: FeatureKind,
    ) -> Result<UsageDecision, LimitError> {
        let tier = self.subscriptions.effective_tier(user_id).await?;
        if tier.is_pro() {
            return Ok(UsageDecision::unlimited());
        }

        // Subscription state decides PRO/FREE; the stored record supplies FREE ceilings
        let ceiling = self.tiers.free_ceilings(user_id).await?.for_feature(feature);
        let used = self
            .ledger
            .usage_in_window(user_id, feature, self.clock.today())
            .await?;

        Ok(if ceiling.admits(used) {
            UsageDecision::granted(ceiling.remaining_after(used))
        } else {
            UsageDecision::limit_reached(feature, ceiling)
        })
    }

    async fn consume(
        &self,
        user_id: Uuid,
        feature: FeatureKind,
    ) -> Result<UsageDecision, LimitError> {
        let today = self.clock.today();
        let tier = self.subscriptions.effective_tier(user_id).await?;
        if tier.is_pro() {
            self.ledger.record(user_id, feature, today).await?;
            return Ok(UsageDecision::unlimited());
        }

        let ceiling = self.tiers.free_ceilings(user_id).await?.for_feature(feature);

        Ok(
            match self
                .ledger
                .record_within(user_id, feature, today, ceiling)
                .await?
            {
                Some(total) => UsageDecision::granted(ceiling.remaining_after(total)),
                None => UsageDecision::limit_reached(feature, ceiling),
            },
        )
    }

    fn audit_denial(&self, user_id: Uuid, feature: FeatureKind, decision: &UsageDecision) {
        if decision.allowed {
            return;
        }
        warn!(
            user_id = %user_id,
            feature = %feature,
            reason = %decision.reason,
            "Usage denied"
        );
        AuditLogger::log_usage_denied(user_id, feature.as_str(), &decision.reason);
    }
}
