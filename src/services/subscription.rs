// Subscription Manager
// Derives the effective tier from paid subscription windows

use chrono::Duration;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{NewSubscription, Payment, Subscription, SubscriptionView, Tier};
use crate::services::clock::Clock;
use crate::store::{Store, StoreError};
use crate::utils::audit_logger::AuditLogger;

// =============================================================================
// ERROR TYPES
// =============================================================================

#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("Payment plan not found: {0}")]
    PlanNotFound(Uuid),

    #[error(transparent)]
    Store(#[from] StoreError),
}

// =============================================================================
// SUBSCRIPTION MANAGER
// =============================================================================

pub struct SubscriptionManager {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl SubscriptionManager {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// The entitled subscription that expires last.
    ///
    /// Several subscriptions may be active at once (stacked purchases). Ties on end
    /// date go to the most recently created one, then to the larger id.
    pub async fn current_subscription(
        &self,
        user_id: Uuid,
    ) -> Result<Option<Subscription>, StoreError> {
        let now = self.clock.now();
        let entitled = self.store.entitled_subscriptions(user_id, now).await?;

        Ok(entitled
            .into_iter()
            .filter(|s| s.is_entitled_at(now))
            .max_by(|a, b| {
                a.end_date
                    .cmp(&b.end_date)
                    .then_with(|| a.created_at.cmp(&b.created_at))
                    .then_with(|| a.id.cmp(&b.id))
            }))
    }

    /// PRO iff an active, unexpired subscription exists
    pub async fn effective_tier(&self, user_id: Uuid) -> Result<Tier, StoreError> {
        let tier = match self.current_subscription(user_id).await? {
            Some(_) => Tier::Pro,
            None => Tier::Free,
        };
        debug!(user_id = %user_id, tier = %tier, "Derived effective tier");
        Ok(tier)
    }

    /// Builds the subscription window opened by a completed payment.
    ///
    /// Starts now and lasts the plan's duration. The returned record is committed by
    /// the settlement transaction together with the payment transition.
    pub async fn open_subscription(
        &self,
        payment: &Payment,
    ) -> Result<NewSubscription, SubscriptionError> {
        let plan = self
            .store
            .find_plan(payment.plan_id)
            .await?
            .ok_or(SubscriptionError::PlanNotFound(payment.plan_id))?;

        let start = self.clock.now();
        Ok(NewSubscription {
            id: Uuid::new_v4(),
            user_id: payment.user_id,
            plan_id: plan.id,
            payment_id: payment.id,
            start_date: start,
            end_date: start + Duration::days(i64::from(plan.duration_days)),
            is_active: true,
            created_at: start,
            updated_at: start,
        })
    }

    /// Current subscription joined with its plan
    pub async fn subscription_view(
        &self,
        user_id: Uuid,
    ) -> Result<Option<SubscriptionView>, SubscriptionError> {
        let Some(subscription) = self.current_subscription(user_id).await? else {
            return Ok(None);
        };

        let plan = self
            .store
            .find_plan(subscription.plan_id)
            .await?
            .ok_or(SubscriptionError::PlanNotFound(subscription.plan_id))?;

        Ok(Some(SubscriptionView {
            id: subscription.id,
            plan_name: plan.name,
            start_date: subscription.start_date,
            end_date: subscription.end_date,
            is_active: subscription.is_active,
            days_remaining: subscription.days_remaining(self.clock.now()),
        }))
    }

    /// Clears the active flag on lapsed subscriptions.
    /// Entitlement is decided at read time, so this only tidies stored state.
    pub async fn expire_lapsed(&self) -> Result<u64, StoreError> {
        let expired = self
            .store
            .deactivate_lapsed_subscriptions(self.clock.now())
            .await?;

        if expired > 0 {
            info!("Deactivated {} lapsed subscriptions", expired);
            AuditLogger::log_subscriptions_expired(expired);
        }
        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewPayment, NewPaymentPlan, NewUser, PaymentSettlement};
    use crate::services::clock::ManualClock;
    use crate::store::InMemoryStore;
    use chrono::{TimeZone, Utc};

    async fn settle_plan(
        store: &InMemoryStore,
        manager: &SubscriptionManager,
        user_id: Uuid,
        duration_days: i32,
        order: &str,
    ) -> Subscription {
        let plan = store
            .insert_plan(
                NewPaymentPlan {
                    name: format!("Plan {}", duration_days),
                    description: None,
                    price: 9900,
                    duration_days,
                    features: vec![],
                    is_active: true,
                },
                Utc::now(),
            )
            .await
            .unwrap();
        let payment = store
            .insert_payment(NewPayment {
                user_id,
                plan_id: plan.id,
                gateway_order_id: order.to_string(),
                amount: plan.price,
                currency: "INR".to_string(),
                receipt_number: format!("receipt_{}", order),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        let new_subscription = manager.open_subscription(&payment).await.unwrap();
        let settlement = PaymentSettlement {
            gateway_order_id: order.to_string(),
            gateway_payment_id: format!("pay_{}", order),
            gateway_signature: "sig".to_string(),
            payment_method: None,
            settled_at: Utc::now(),
        };
        store
            .settle_payment(settlement, new_subscription)
            .await
            .unwrap()
            .1
    }

    #[tokio::test]
    async fn test_current_subscription_prefers_latest_expiry() {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
        ));
        let manager = SubscriptionManager::new(store.clone(), clock.clone());
        let user = store
            .insert_user(NewUser::new("a@example.com", "aspirant", Utc::now()))
            .await
            .unwrap();

        assert_eq!(manager.effective_tier(user.id).await.unwrap(), Tier::Free);

        settle_plan(&store, &manager, user.id, 30, "order_a").await;
        let longer = settle_plan(&store, &manager, user.id, 90, "order_b").await;

        let current = manager.current_subscription(user.id).await.unwrap().unwrap();
        assert_eq!(current.id, longer.id);
        assert_eq!(manager.effective_tier(user.id).await.unwrap(), Tier::Pro);
    }

    #[tokio::test]
    async fn test_expired_subscription_is_filtered_at_read_and_swept() {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
        ));
        let manager = SubscriptionManager::new(store.clone(), clock.clone());
        let user = store
            .insert_user(NewUser::new("b@example.com", "sweeper", Utc::now()))
            .await
            .unwrap();

        settle_plan(&store, &manager, user.id, 7, "order_c").await;
        assert_eq!(manager.effective_tier(user.id).await.unwrap(), Tier::Pro);

        clock.advance(Duration::days(8));
        assert_eq!(manager.effective_tier(user.id).await.unwrap(), Tier::Free);
        assert!(manager.subscription_view(user.id).await.unwrap().is_none());

        assert_eq!(manager.expire_lapsed().await.unwrap(), 1);
        assert_eq!(manager.expire_lapsed().await.unwrap(), 0);
        assert!(!store.all_subscriptions().await[0].is_active);
    }
}
