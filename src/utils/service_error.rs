// HTTP mapping for domain errors
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::services::{LimitError, PaymentError, SubscriptionError, TierError, UserError};
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid payment signature")]
    InvalidSignature,

    #[error("Limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("Service temporarily unavailable")]
    StoreUnavailable,

    #[error("Payment gateway error: {0}")]
    GatewayError(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Internal server error")]
    InternalError,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ServiceError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            ServiceError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ServiceError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ServiceError::InvalidSignature => (
                StatusCode::BAD_REQUEST,
                "Invalid payment signature".to_string(),
            ),
            ServiceError::LimitExceeded(msg) => (StatusCode::TOO_MANY_REQUESTS, msg),
            ServiceError::StoreUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Service temporarily unavailable".to_string(),
            ),
            ServiceError::GatewayError(msg) => (StatusCode::BAD_GATEWAY, msg),
            ServiceError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            ServiceError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden".to_string()),
            ServiceError::InternalError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

// Conversion from the domain error types

impl From<StoreError> for ServiceError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound => ServiceError::NotFound("Resource not found".to_string()),
            StoreError::Conflict(msg) => ServiceError::Conflict(msg),
            StoreError::Unavailable(_) => ServiceError::StoreUnavailable,
            StoreError::Database(msg) => {
                error!("Database error: {}", msg);
                ServiceError::InternalError
            },
        }
    }
}

impl From<TierError> for ServiceError {
    fn from(error: TierError) -> Self {
        match error {
            TierError::UserNotFound(id) => ServiceError::NotFound(format!("User {} not found", id)),
            TierError::InvalidCeilings(msg) => ServiceError::ValidationError(msg),
            TierError::ConcurrencyConflict(_) => {
                error!("{}", error);
                ServiceError::InternalError
            },
            TierError::Store(e) => e.into(),
        }
    }
}

impl From<LimitError> for ServiceError {
    fn from(error: LimitError) -> Self {
        match error {
            LimitError::Tier(e) => e.into(),
            LimitError::Store(e) => e.into(),
        }
    }
}

impl From<SubscriptionError> for ServiceError {
    fn from(error: SubscriptionError) -> Self {
        match error {
            SubscriptionError::PlanNotFound(id) => {
                ServiceError::NotFound(format!("Payment plan {} not found", id))
            },
            SubscriptionError::Store(e) => e.into(),
        }
    }
}

impl From<PaymentError> for ServiceError {
    fn from(error: PaymentError) -> Self {
        match error {
            PaymentError::OrderNotFound(order) => {
                ServiceError::NotFound(format!("No pending payment for order {}", order))
            },
            PaymentError::PlanNotFound(id) => {
                ServiceError::NotFound(format!("Payment plan {} not found", id))
            },
            PaymentError::UserNotFound(id) => ServiceError::NotFound(format!("User {} not found", id)),
            PaymentError::InvalidSignature => ServiceError::InvalidSignature,
            PaymentError::InvalidPlan(msg) => ServiceError::ValidationError(msg),
            PaymentError::StoreUnavailable(_) => ServiceError::StoreUnavailable,
            PaymentError::Gateway(e) => ServiceError::GatewayError(e.to_string()),
            PaymentError::Store(e) => e.into(),
        }
    }
}

impl From<UserError> for ServiceError {
    fn from(error: UserError) -> Self {
        match error {
            UserError::NotFound(id) => ServiceError::NotFound(format!("User {} not found", id)),
            UserError::AlreadyExists => {
                ServiceError::Conflict("Email or username already registered".to_string())
            },
            UserError::Validation(e) => e.into(),
            UserError::Store(e) => e.into(),
        }
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(error: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(error.to_string())
    }
}
