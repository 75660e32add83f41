// HTTP handlers and their route tables

pub mod admin;
pub mod limits;
pub mod payments;

use crate::app::AppState;
use axum::{
    routing::{get, post, put},
    Router,
};

/// Quota routes, mounted under /api/v1/user behind auth
pub fn limits_routes() -> Router<AppState> {
    Router::new()
        .route("/limits", get(limits::get_limits))
        .route("/check-limit/{feature}", post(limits::check_limit))
        .route("/record-usage/{feature}", post(limits::record_usage))
}

/// Authenticated payment routes, mounted under /api/v1/payment
pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/create-order", post(payments::create_order))
        .route("/verify", post(payments::verify_payment))
        .route("/subscription", get(payments::get_subscription))
}

/// Routes readable without a token
pub fn public_routes() -> Router<AppState> {
    Router::new().route("/payment/plans", get(payments::list_plans))
}

/// Admin routes, mounted under /api/v1/admin behind auth
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(admin::create_user))
        .route("/users/{id}/tier", put(admin::set_user_tier))
        .route("/tiers/backfill", post(admin::backfill_tiers))
        .route("/tiers/stats", get(admin::tier_statistics))
        .route("/plans", post(admin::create_plan))
}
