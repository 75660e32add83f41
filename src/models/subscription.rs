use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::user_subscriptions;

/// A paid entitlement window, one per completed payment
#[derive(
    Debug, Clone, Serialize, Deserialize, PartialEq, Queryable, Selectable, Identifiable,
)]
#[diesel(table_name = user_subscriptions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub payment_id: Uuid,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// Active flag set and end still in the future
    pub fn is_entitled_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.end_date > now
    }

    /// Whole days left before the window closes, never negative
    pub fn days_remaining(&self, now: DateTime<Utc>) -> i64 {
        (self.end_date - now).num_days().max(0)
    }
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = user_subscriptions)]
pub struct NewSubscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub payment_id: Uuid,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<NewSubscription> for Subscription {
    fn from(new: NewSubscription) -> Self {
        Self {
            id: new.id,
            user_id: new.user_id,
            plan_id: new.plan_id,
            payment_id: new.payment_id,
            start_date: new.start_date,
            end_date: new.end_date,
            is_active: new.is_active,
            created_at: new.created_at,
            updated_at: new.updated_at,
        }
    }
}

/// Current subscription joined with its plan, as shown to the user
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SubscriptionView {
    pub id: Uuid,
    pub plan_name: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub is_active: bool,
    pub days_remaining: i64,
}
