// Administrative endpoints: tier overrides, tier backfill and statistics, account and
// plan seeding. Every route requires the `admin` scope.

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::{
    app::AppState,
    middleware::auth::AuthenticatedUser,
    models::{CreateUserRequest, NewPaymentPlan, Tier, TierCeilings},
    utils::service_error::ServiceError,
};

#[derive(Debug, Deserialize)]
pub struct SetTierRequest {
    pub tier: Tier,
    /// FREE only; falls back to the configured defaults when omitted
    #[serde(default)]
    pub ceilings: Option<TierCeilings>,
}

/// PUT /api/v1/admin/users/{id}/tier
pub async fn set_user_tier(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<SetTierRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    auth_user.require_admin()?;

    let record = state
        .tier_store
        .set_tier(user_id, request.tier, request.ceilings)
        .await?;

    info!(
        admin_id = %auth_user.user_id,
        user_id = %user_id,
        tier = %record.tier,
        "Tier set by administrator"
    );
    Ok(Json(record))
}

/// POST /api/v1/admin/tiers/backfill
pub async fn backfill_tiers(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, ServiceError> {
    auth_user.require_admin()?;

    let created = state.tier_store.backfill_missing().await?;
    Ok(Json(json!({ "created": created })))
}

/// GET /api/v1/admin/tiers/stats
pub async fn tier_statistics(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, ServiceError> {
    auth_user.require_admin()?;

    let stats = state.tier_store.statistics().await?;
    Ok(Json(stats))
}

/// POST /api/v1/admin/users
pub async fn create_user(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Json(request): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    auth_user.require_admin()?;

    let user = state.user_service.create_user(request).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /api/v1/admin/plans
pub async fn create_plan(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Json(request): Json<NewPaymentPlan>,
) -> Result<impl IntoResponse, ServiceError> {
    auth_user.require_admin()?;

    let plan = state.payment_service.create_plan(request).await?;
    Ok((StatusCode::CREATED, Json(plan)))
}
