// Persistence seam for the usage-limit and settlement engine
// Every cross-row atomicity guarantee lives behind this trait

pub mod in_memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Ceiling, FeatureKind, NewPayment, NewPaymentPlan, NewSubscription, NewTierRecord, NewUser,
    Payment, PaymentPlan, PaymentSettlement, Subscription, Tier, TierRecord, UsageKey, User,
};

pub use in_memory::InMemoryStore;
pub use postgres::DieselStore;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    #[error("Record not found")]
    NotFound,

    #[error("Conflicting record: {0}")]
    Conflict(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl StoreError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<diesel::result::Error> for StoreError {
    fn from(error: diesel::result::Error) -> Self {
        use diesel::result::{DatabaseErrorKind, Error};

        match error {
            Error::NotFound => StoreError::NotFound,
            Error::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                StoreError::Conflict(info.message().to_string())
            },
            Error::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => {
                StoreError::NotFound
            },
            Error::DatabaseError(DatabaseErrorKind::ClosedConnection, info) => {
                StoreError::Unavailable(info.message().to_string())
            },
            _ => StoreError::Database(error.to_string()),
        }
    }
}

/// Inclusive date range of a usage window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateSpan {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateSpan {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        Self { from, to }
    }

    pub fn single(day: NaiveDate) -> Self {
        Self { from: day, to: day }
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.from <= day && day <= self.to
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    // Users

    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError>;

    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError>;

    /// Users that have never had a tier record materialized
    async fn users_without_tier(&self) -> Result<Vec<Uuid>, StoreError>;

    // Tier records

    async fn find_tier_record(&self, user_id: Uuid) -> Result<Option<TierRecord>, StoreError>;

    /// Fails with `Conflict` when the user already has a record
    async fn insert_tier_record(&self, record: NewTierRecord) -> Result<TierRecord, StoreError>;

    /// Overwrites tier label and all four ceilings, creating the record if absent
    async fn upsert_tier_record(&self, record: NewTierRecord) -> Result<TierRecord, StoreError>;

    async fn count_tiers(&self) -> Result<Vec<(Tier, i64)>, StoreError>;

    // Usage buckets

    /// Sum of bucket counts for the feature over an inclusive date span
    async fn usage_between(
        &self,
        user_id: Uuid,
        feature: FeatureKind,
        span: DateSpan,
    ) -> Result<u32, StoreError>;

    /// Adds exactly one unit to the bucket, creating it if absent. Returns the bucket count.
    async fn increment_usage(&self, key: UsageKey, now: DateTime<Utc>) -> Result<u32, StoreError>;

    /// Adds one unit to the bucket only if the window total stays within `ceiling`.
    /// Returns the new window total, or `None` when the ceiling was already reached.
    /// Serialized per user so concurrent callers cannot overshoot the ceiling.
    async fn increment_usage_within(
        &self,
        key: UsageKey,
        window: DateSpan,
        ceiling: Ceiling,
        now: DateTime<Utc>,
    ) -> Result<Option<u32>, StoreError>;

    // Plans

    async fn insert_plan(
        &self,
        plan: NewPaymentPlan,
        now: DateTime<Utc>,
    ) -> Result<PaymentPlan, StoreError>;

    async fn find_plan(&self, plan_id: Uuid) -> Result<Option<PaymentPlan>, StoreError>;

    /// Active plans ordered by price
    async fn list_active_plans(&self) -> Result<Vec<PaymentPlan>, StoreError>;

    // Payments

    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, StoreError>;

    async fn find_payment_by_order(&self, order_id: &str) -> Result<Option<Payment>, StoreError>;

    /// Moves the PENDING payment to COMPLETED and inserts the subscription as one unit.
    /// Fails with `NotFound` when no PENDING payment matches the order; nothing persists
    /// unless both writes succeed.
    async fn settle_payment(
        &self,
        settlement: PaymentSettlement,
        subscription: NewSubscription,
    ) -> Result<(Payment, Subscription), StoreError>;

    // Subscriptions

    /// Subscriptions with the active flag set and end after `now`
    async fn entitled_subscriptions(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<Subscription>, StoreError>;

    /// Clears the active flag on subscriptions that ended at or before `now`
    async fn deactivate_lapsed_subscriptions(&self, now: DateTime<Utc>)
        -> Result<u64, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_span_is_inclusive() {
        let from = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2024, 1, 7).unwrap();
        let span = DateSpan::new(from, to);
        assert!(span.contains(from));
        assert!(span.contains(to));
        assert!(!span.contains(NaiveDate::from_ymd_opt(2024, 1, 8).unwrap()));
        assert!(DateSpan::single(from).contains(from));
    }

    #[test]
    fn test_diesel_not_found_maps_to_not_found() {
        assert_eq!(
            StoreError::from(diesel::result::Error::NotFound),
            StoreError::NotFound
        );
        assert!(StoreError::Unavailable("down".into()).is_unavailable());
    }
}
