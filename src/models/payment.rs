use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::schema::payments;

/// Payment lifecycle. PENDING moves to COMPLETED exactly once and never back.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Completed => "COMPLETED",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(PaymentStatus::Pending),
            "COMPLETED" => Ok(PaymentStatus::Completed),
            "FAILED" => Ok(PaymentStatus::Failed),
            "REFUNDED" => Ok(PaymentStatus::Refunded),
            _ => Err(format!("Invalid payment status: {}", s)),
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub gateway_order_id: String,
    pub gateway_payment_id: Option<String>,
    pub gateway_signature: Option<String>,
    pub amount: i32, // Amount in paise (e.g., 9900 for ₹99)
    pub currency: String,
    pub status: PaymentStatus,
    pub receipt_number: String,
    pub payment_method: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Payment {
    pub fn is_pending(&self) -> bool {
        self.status == PaymentStatus::Pending
    }

    /// Apply a settlement to a pending payment
    pub fn apply_settlement(&mut self, settlement: &PaymentSettlement) {
        self.gateway_payment_id = Some(settlement.gateway_payment_id.clone());
        self.gateway_signature = Some(settlement.gateway_signature.clone());
        self.payment_method = settlement.payment_method.clone();
        self.status = PaymentStatus::Completed;
        self.updated_at = settlement.settled_at;
        self.completed_at = Some(settlement.settled_at);
    }
}

/// Pending payment created alongside a gateway order
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub gateway_order_id: String,
    pub amount: i32,
    pub currency: String,
    pub receipt_number: String,
    pub created_at: DateTime<Utc>,
}

impl NewPayment {
    pub fn into_row(self) -> NewPaymentRow {
        NewPaymentRow {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            plan_id: self.plan_id,
            gateway_order_id: self.gateway_order_id,
            amount: self.amount,
            currency: self.currency,
            status: PaymentStatus::Pending.as_str().to_string(),
            receipt_number: self.receipt_number,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

/// Gateway confirmation applied when a payment settles
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentSettlement {
    pub gateway_order_id: String,
    pub gateway_payment_id: String,
    pub gateway_signature: String,
    pub payment_method: Option<String>,
    pub settled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = payments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PaymentRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub gateway_order_id: String,
    pub gateway_payment_id: Option<String>,
    pub gateway_signature: Option<String>,
    pub amount: i32,
    pub currency: String,
    pub status: String,
    pub receipt_number: String,
    pub payment_method: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = payments)]
pub struct NewPaymentRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub gateway_order_id: String,
    pub amount: i32,
    pub currency: String,
    pub status: String,
    pub receipt_number: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = String;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            plan_id: row.plan_id,
            gateway_order_id: row.gateway_order_id,
            gateway_payment_id: row.gateway_payment_id,
            gateway_signature: row.gateway_signature,
            amount: row.amount,
            currency: row.currency,
            status: row.status.parse()?,
            receipt_number: row.receipt_number,
            payment_method: row.payment_method,
            created_at: row.created_at,
            updated_at: row.updated_at,
            completed_at: row.completed_at,
        })
    }
}
