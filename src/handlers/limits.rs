// Usage limit endpoints
// Thin wrappers over the limit evaluator; the feature path segment is case-insensitive

use axum::{
    extract::{Extension, Path, State},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use tracing::debug;

use crate::{
    app::AppState,
    middleware::auth::AuthenticatedUser,
    models::FeatureKind,
    services::DenialReason,
    utils::service_error::ServiceError,
};

fn parse_feature(raw: &str) -> Result<FeatureKind, ServiceError> {
    raw.parse::<FeatureKind>()
        .map_err(|_| ServiceError::ValidationError("Invalid usage type".to_string()))
}

/// GET /api/v1/user/limits
pub async fn get_limits(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, ServiceError> {
    let status = state.usage_limits.get_limits_status(auth_user.user_id).await?;
    Ok(Json(json!({ "limits": status })))
}

/// POST /api/v1/user/check-limit/{feature}
/// Read-only; limit denials come back as a 200 with `allowed: false`, unknown users as a 404
pub async fn check_limit(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(feature): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let feature = parse_feature(&feature)?;
    let decision = state
        .usage_limits
        .check_usage(auth_user.user_id, feature)
        .await;

    if decision.denial == Some(DenialReason::UserNotFound) {
        return Err(ServiceError::NotFound(decision.reason));
    }
    Ok(Json(decision))
}

/// POST /api/v1/user/record-usage/{feature}
/// Atomic check-and-consume
pub async fn record_usage(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(feature): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let feature = parse_feature(&feature)?;
    let decision = state
        .usage_limits
        .check_and_record(auth_user.user_id, feature)
        .await;

    match decision.denial {
        None => {
            debug!(user_id = %auth_user.user_id, feature = %feature, "Usage recorded");
            Ok(Json(json!({
                "success": true,
                "message": "Usage recorded successfully",
                "remaining": decision.remaining
            })))
        },
        Some(DenialReason::LimitReached) => Err(ServiceError::LimitExceeded(decision.reason)),
        Some(DenialReason::StoreUnavailable) => Err(ServiceError::StoreUnavailable),
        Some(DenialReason::UserNotFound) => Err(ServiceError::NotFound(decision.reason)),
    }
}
