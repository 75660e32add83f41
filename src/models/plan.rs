// Payment plan catalog, read-only from the settlement path

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;
use validator::Validate;

use crate::schema::payment_plans;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentPlan {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: i32, // Price in paise
    pub duration_days: i32,
    pub features: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewPaymentPlan {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub description: Option<String>,
    #[validate(range(min = 0))]
    pub price: i32,
    #[validate(range(min = 1))]
    pub duration_days: i32,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl NewPaymentPlan {
    pub fn into_row(self, now: DateTime<Utc>) -> NewPaymentPlanRow {
        NewPaymentPlanRow {
            id: Uuid::new_v4(),
            name: self.name,
            description: self.description,
            price: self.price,
            duration_days: self.duration_days,
            features: JsonValue::from(self.features),
            is_active: self.is_active,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = payment_plans)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PaymentPlanRow {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: i32,
    pub duration_days: i32,
    pub features: JsonValue,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = payment_plans)]
pub struct NewPaymentPlanRow {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: i32,
    pub duration_days: i32,
    pub features: JsonValue,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<NewPaymentPlanRow> for PaymentPlan {
    fn from(row: NewPaymentPlanRow) -> Self {
        PaymentPlanRow {
            id: row.id,
            name: row.name,
            description: row.description,
            price: row.price,
            duration_days: row.duration_days,
            features: row.features,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
        .into()
    }
}

impl From<PaymentPlanRow> for PaymentPlan {
    fn from(row: PaymentPlanRow) -> Self {
        // Features are stored as a JSON array of strings; anything else reads as empty
        let features = serde_json::from_value::<Vec<String>>(row.features).unwrap_or_default();
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            price: row.price,
            duration_days: row.duration_days,
            features,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
