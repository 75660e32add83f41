// Payment endpoints: plan catalog, order creation, settlement and subscription view

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    app::AppState, middleware::auth::AuthenticatedUser, utils::service_error::ServiceError,
};

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub plan_id: Uuid,
}

/// Checkout confirmation as posted back by the gateway's client SDK
#[derive(Debug, Deserialize, Validate)]
pub struct VerifyPaymentRequest {
    #[validate(length(min = 1, max = 255))]
    pub razorpay_order_id: String,
    #[validate(length(min = 1, max = 255))]
    pub razorpay_payment_id: String,
    #[validate(length(min = 1, max = 255))]
    pub razorpay_signature: String,
    #[validate(length(max = 50))]
    pub payment_method: Option<String>,
}

/// GET /api/v1/payment/plans
pub async fn list_plans(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    let plans = state.payment_service.list_plans().await?;
    Ok(Json(json!({ "plans": plans })))
}

/// POST /api/v1/payment/create-order
pub async fn create_order(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state
        .payment_service
        .create_order(auth_user.user_id, request.plan_id)
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// POST /api/v1/payment/verify
pub async fn verify_payment(
    State(state): State<AppState>,
    Extension(_auth_user): Extension<AuthenticatedUser>,
    Json(request): Json<VerifyPaymentRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    request.validate()?;

    let payment = state
        .payment_service
        .settle_payment(
            &request.razorpay_order_id,
            &request.razorpay_payment_id,
            &request.razorpay_signature,
            request.payment_method,
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Payment verified successfully",
        "payment_id": payment.id,
        "status": payment.status
    })))
}

/// GET /api/v1/payment/subscription
pub async fn get_subscription(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, ServiceError> {
    let view = state
        .subscription_manager
        .subscription_view(auth_user.user_id)
        .await?;

    Ok(Json(match view {
        Some(subscription) => json!({
            "has_subscription": true,
            "subscription": subscription
        }),
        None => json!({
            "has_subscription": false,
            "subscription": null
        }),
    }))
}
