// Usage ledger buckets: one row per (user, feature, calendar day)

use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::tier::FeatureKind;
use crate::schema::usage_records;

/// Structured bucket key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UsageKey {
    pub user_id: Uuid,
    pub feature: FeatureKind,
    pub day: NaiveDate,
}

impl UsageKey {
    pub fn new(user_id: Uuid, feature: FeatureKind, day: NaiveDate) -> Self {
        Self {
            user_id,
            feature,
            day,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UsageRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub feature: FeatureKind,
    pub usage_date: NaiveDate,
    pub count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UsageRecord {
    pub fn key(&self) -> UsageKey {
        UsageKey::new(self.user_id, self.feature, self.usage_date)
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = usage_records)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UsageRecordRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub feature: String,
    pub usage_date: NaiveDate,
    pub count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = usage_records)]
pub struct NewUsageRecordRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub feature: String,
    pub usage_date: NaiveDate,
    pub count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NewUsageRecordRow {
    /// First unit of a fresh bucket
    pub fn first_unit(key: UsageKey, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: key.user_id,
            feature: key.feature.as_str().to_string(),
            usage_date: key.day,
            count: 1,
            created_at: now,
            updated_at: now,
        }
    }
}

impl TryFrom<UsageRecordRow> for UsageRecord {
    type Error = String;

    fn try_from(row: UsageRecordRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            feature: row.feature.parse()?,
            usage_date: row.usage_date,
            count: u32::try_from(row.count).map_err(|_| format!("negative count {}", row.count))?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
