// In-memory store for tests and local development
// A single mutex over all tables gives every operation the same atomicity as a transaction

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{DateSpan, Store, StoreError};
use crate::models::{
    Ceiling, FeatureKind, NewPayment, NewPaymentPlan, NewSubscription, NewTierRecord, NewUser,
    Payment, PaymentPlan, PaymentSettlement, PaymentStatus, Subscription, Tier, TierRecord,
    UsageKey, UsageRecord, User,
};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    tiers: HashMap<Uuid, TierRecord>,
    usage: BTreeMap<UsageKey, UsageRecord>,
    plans: HashMap<Uuid, PaymentPlan>,
    payments: HashMap<Uuid, Payment>,
    subscriptions: Vec<Subscription>,
}

impl Tables {
    fn require_user(&self, user_id: Uuid) -> Result<(), StoreError> {
        if self.users.contains_key(&user_id) {
            Ok(())
        } else {
            Err(StoreError::NotFound)
        }
    }

    fn window_total(&self, user_id: Uuid, feature: FeatureKind, span: DateSpan) -> u32 {
        self.usage
            .values()
            .filter(|r| r.user_id == user_id && r.feature == feature && span.contains(r.usage_date))
            .fold(0u32, |acc, r| acc.saturating_add(r.count))
    }

    fn bump_bucket(&mut self, key: UsageKey, now: DateTime<Utc>) -> u32 {
        let record = self.usage.entry(key).or_insert_with(|| UsageRecord {
            id: Uuid::new_v4(),
            user_id: key.user_id,
            feature: key.feature,
            usage_date: key.day,
            count: 0,
            created_at: now,
            updated_at: now,
        });
        record.count = record.count.saturating_add(1);
        record.updated_at = now;
        record.count
    }
}

/// Store backed by process memory.
///
/// Supports two fault switches: `set_available(false)` makes every call fail with
/// `Unavailable`, and `fail_subscription_inserts(true)` makes settlement fail at the
/// subscription step.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
    unavailable: AtomicBool,
    fail_subscription_inserts: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    pub fn fail_subscription_inserts(&self, fail: bool) {
        self.fail_subscription_inserts.store(fail, Ordering::SeqCst);
    }

    /// All subscriptions regardless of state, oldest first
    pub async fn all_subscriptions(&self) -> Vec<Subscription> {
        self.tables.lock().await.subscriptions.clone()
    }

    /// Bucket count for one (user, feature, day)
    pub async fn bucket_count(&self, key: UsageKey) -> u32 {
        self.tables
            .lock()
            .await
            .usage
            .get(&key)
            .map(|r| r.count)
            .unwrap_or(0)
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("in-memory store switched off".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;

        if tables
            .users
            .values()
            .any(|u| u.email == user.email || u.username == user.username)
        {
            return Err(StoreError::Conflict(format!(
                "user {} / {} already exists",
                user.email, user.username
            )));
        }

        let user = User {
            id: user.id,
            email: user.email,
            username: user.username,
            created_at: user.created_at,
            updated_at: user.updated_at,
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        self.check_available()?;
        Ok(self.tables.lock().await.users.get(&user_id).cloned())
    }

    async fn users_without_tier(&self) -> Result<Vec<Uuid>, StoreError> {
        self.check_available()?;
        let tables = self.tables.lock().await;

        let mut missing: Vec<&User> = tables
            .users
            .values()
            .filter(|u| !tables.tiers.contains_key(&u.id))
            .collect();
        missing.sort_by_key(|u| (u.created_at, u.id));
        Ok(missing.into_iter().map(|u| u.id).collect())
    }

    async fn find_tier_record(&self, user_id: Uuid) -> Result<Option<TierRecord>, StoreError> {
        self.check_available()?;
        Ok(self.tables.lock().await.tiers.get(&user_id).cloned())
    }

    async fn insert_tier_record(&self, record: NewTierRecord) -> Result<TierRecord, StoreError> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        tables.require_user(record.user_id)?;

        if tables.tiers.contains_key(&record.user_id) {
            return Err(StoreError::Conflict(format!(
                "tier record for user {} already exists",
                record.user_id
            )));
        }

        let stored = TierRecord {
            id: Uuid::new_v4(),
            user_id: record.user_id,
            tier: record.tier,
            ceilings: record.ceilings,
            created_at: record.now,
            updated_at: record.now,
        };
        tables.tiers.insert(record.user_id, stored.clone());
        Ok(stored)
    }

    async fn upsert_tier_record(&self, record: NewTierRecord) -> Result<TierRecord, StoreError> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        tables.require_user(record.user_id)?;

        let stored = tables
            .tiers
            .entry(record.user_id)
            .and_modify(|existing| {
                existing.tier = record.tier;
                existing.ceilings = record.ceilings;
                existing.updated_at = record.now;
            })
            .or_insert_with(|| TierRecord {
                id: Uuid::new_v4(),
                user_id: record.user_id,
                tier: record.tier,
                ceilings: record.ceilings,
                created_at: record.now,
                updated_at: record.now,
            });
        Ok(stored.clone())
    }

    async fn count_tiers(&self) -> Result<Vec<(Tier, i64)>, StoreError> {
        self.check_available()?;
        let tables = self.tables.lock().await;

        let mut counts: BTreeMap<&'static str, (Tier, i64)> = BTreeMap::new();
        for record in tables.tiers.values() {
            counts.entry(record.tier.as_str()).or_insert((record.tier, 0)).1 += 1;
        }
        Ok(counts.into_values().collect())
    }

    async fn usage_between(
        &self,
        user_id: Uuid,
        feature: FeatureKind,
        span: DateSpan,
    ) -> Result<u32, StoreError> {
        self.check_available()?;
        Ok(self.tables.lock().await.window_total(user_id, feature, span))
    }

    async fn increment_usage(&self, key: UsageKey, now: DateTime<Utc>) -> Result<u32, StoreError> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        tables.require_user(key.user_id)?;
        Ok(tables.bump_bucket(key, now))
    }

    async fn increment_usage_within(
        &self,
        key: UsageKey,
        window: DateSpan,
        ceiling: Ceiling,
        now: DateTime<Utc>,
    ) -> Result<Option<u32>, StoreError> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        tables.require_user(key.user_id)?;

        let used = tables.window_total(key.user_id, key.feature, window);
        if !ceiling.admits(used) {
            return Ok(None);
        }
        tables.bump_bucket(key, now);
        Ok(Some(used.saturating_add(1)))
    }

    async fn insert_plan(
        &self,
        plan: NewPaymentPlan,
        now: DateTime<Utc>,
    ) -> Result<PaymentPlan, StoreError> {
        self.check_available()?;
        let plan = PaymentPlan::from(plan.into_row(now));
        self.tables.lock().await.plans.insert(plan.id, plan.clone());
        Ok(plan)
    }

    async fn find_plan(&self, plan_id: Uuid) -> Result<Option<PaymentPlan>, StoreError> {
        self.check_available()?;
        Ok(self.tables.lock().await.plans.get(&plan_id).cloned())
    }

    async fn list_active_plans(&self) -> Result<Vec<PaymentPlan>, StoreError> {
        self.check_available()?;
        let tables = self.tables.lock().await;

        let mut plans: Vec<PaymentPlan> =
            tables.plans.values().filter(|p| p.is_active).cloned().collect();
        plans.sort_by(|a, b| a.price.cmp(&b.price).then_with(|| a.name.cmp(&b.name)));
        Ok(plans)
    }

    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, StoreError> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        tables.require_user(payment.user_id)?;
        if !tables.plans.contains_key(&payment.plan_id) {
            return Err(StoreError::NotFound);
        }

        if tables.payments.values().any(|p| {
            p.gateway_order_id == payment.gateway_order_id
                || p.receipt_number == payment.receipt_number
        }) {
            return Err(StoreError::Conflict(format!(
                "payment for order {} already exists",
                payment.gateway_order_id
            )));
        }

        let row = payment.into_row();
        let stored = Payment {
            id: row.id,
            user_id: row.user_id,
            plan_id: row.plan_id,
            gateway_order_id: row.gateway_order_id,
            gateway_payment_id: None,
            gateway_signature: None,
            amount: row.amount,
            currency: row.currency,
            status: PaymentStatus::Pending,
            receipt_number: row.receipt_number,
            payment_method: None,
            created_at: row.created_at,
            updated_at: row.updated_at,
            completed_at: None,
        };
        tables.payments.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_payment_by_order(&self, order_id: &str) -> Result<Option<Payment>, StoreError> {
        self.check_available()?;
        Ok(self
            .tables
            .lock()
            .await
            .payments
            .values()
            .find(|p| p.gateway_order_id == order_id)
            .cloned())
    }

    async fn settle_payment(
        &self,
        settlement: PaymentSettlement,
        subscription: NewSubscription,
    ) -> Result<(Payment, Subscription), StoreError> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;

        // Stage both writes, commit only when both are valid
        let mut payment = tables
            .payments
            .values()
            .find(|p| p.gateway_order_id == settlement.gateway_order_id && p.is_pending())
            .cloned()
            .ok_or(StoreError::NotFound)?;
        payment.apply_settlement(&settlement);

        if self.fail_subscription_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Database(
                "subscription insert rejected".to_string(),
            ));
        }
        if tables
            .subscriptions
            .iter()
            .any(|s| s.payment_id == subscription.payment_id)
        {
            return Err(StoreError::Conflict(format!(
                "subscription for payment {} already exists",
                subscription.payment_id
            )));
        }
        if tables.payments.values().any(|p| {
            p.id != payment.id && p.gateway_payment_id == payment.gateway_payment_id
        }) {
            return Err(StoreError::Conflict(format!(
                "gateway payment {} already recorded",
                settlement.gateway_payment_id
            )));
        }

        let subscription = Subscription::from(subscription);
        tables.subscriptions.push(subscription.clone());
        tables.payments.insert(payment.id, payment.clone());
        Ok((payment, subscription))
    }

    async fn entitled_subscriptions(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<Subscription>, StoreError> {
        self.check_available()?;
        let tables = self.tables.lock().await;

        let mut entitled: Vec<Subscription> = tables
            .subscriptions
            .iter()
            .filter(|s| s.user_id == user_id && s.is_entitled_at(now))
            .cloned()
            .collect();
        entitled.sort_by(|a, b| {
            b.end_date
                .cmp(&a.end_date)
                .then_with(|| b.created_at.cmp(&a.created_at))
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(entitled)
    }

    async fn deactivate_lapsed_subscriptions(
        &self,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;

        let mut updated = 0u64;
        for subscription in tables
            .subscriptions
            .iter_mut()
            .filter(|s| s.is_active && s.end_date <= now)
        {
            subscription.is_active = false;
            subscription.updated_at = now;
            updated += 1;
        }
        Ok(updated)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    async fn store_with_user() -> (InMemoryStore, Uuid) {
        let store = InMemoryStore::new();
        let user = store
            .insert_user(NewUser::new("learner@example.com", "learner", Utc::now()))
            .await
            .unwrap();
        (store, user.id)
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let (store, _) = store_with_user().await;
        let result = store
            .insert_user(NewUser::new("LEARNER@example.com", "other", Utc::now()))
            .await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_increment_within_stops_at_ceiling() {
        let (store, user_id) = store_with_user().await;
        let key = UsageKey::new(user_id, FeatureKind::Pyq, day(3));
        let span = DateSpan::single(day(3));

        assert_eq!(
            store
                .increment_usage_within(key, span, Ceiling::Limited(2), Utc::now())
                .await
                .unwrap(),
            Some(1)
        );
        assert_eq!(
            store
                .increment_usage_within(key, span, Ceiling::Limited(2), Utc::now())
                .await
                .unwrap(),
            Some(2)
        );
        assert_eq!(
            store
                .increment_usage_within(key, span, Ceiling::Limited(2), Utc::now())
                .await
                .unwrap(),
            None
        );
        assert_eq!(store.bucket_count(key).await, 2);
    }

    #[tokio::test]
    async fn test_usage_for_unknown_user_is_not_found() {
        let store = InMemoryStore::new();
        let key = UsageKey::new(Uuid::new_v4(), FeatureKind::AiChat, day(1));
        assert_eq!(
            store.increment_usage(key, Utc::now()).await,
            Err(StoreError::NotFound)
        );
    }

    #[tokio::test]
    async fn test_entitled_subscriptions_break_ties_on_id() {
        let (store, user_id) = store_with_user().await;
        let now = Utc::now();
        let row = |id: u128| -> Subscription {
            NewSubscription {
                id: Uuid::from_u128(id),
                user_id,
                plan_id: Uuid::new_v4(),
                payment_id: Uuid::new_v4(),
                start_date: now,
                end_date: now + chrono::Duration::days(30),
                is_active: true,
                created_at: now,
                updated_at: now,
            }
            .into()
        };
        {
            let mut tables = store.tables.lock().await;
            tables.subscriptions.push(row(1));
            tables.subscriptions.push(row(3));
            tables.subscriptions.push(row(2));
        }

        let ids: Vec<Uuid> = store
            .entitled_subscriptions(user_id, now)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, [3, 2, 1].map(Uuid::from_u128).to_vec());
    }

    #[tokio::test]
    async fn test_switched_off_store_is_unavailable() {
        let (store, user_id) = store_with_user().await;
        store.set_available(false);
        assert!(store.find_user(user_id).await.unwrap_err().is_unavailable());
        store.set_available(true);
        assert!(store.find_user(user_id).await.unwrap().is_some());
    }
}
