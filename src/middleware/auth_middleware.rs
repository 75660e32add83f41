// Authentication middleware for protected routes
// Validates bearer tokens and injects AuthenticatedUser into request extensions

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use uuid::Uuid;

use crate::{app::AppState, middleware::auth::AuthenticatedUser};

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "error": message,
            "status": StatusCode::UNAUTHORIZED.as_u16()
        })),
    )
        .into_response()
}

pub async fn auth_middleware(
    State(app_state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let token = match request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
    {
        Some(token) if !token.trim().is_empty() => token.trim().to_string(),
        _ => return unauthorized("Missing or invalid authorization header"),
    };

    let claims = match app_state.jwt_service.validate_access_token(&token) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::warn!("JWT validation failed: {}", e);
            return unauthorized("Invalid or expired token");
        },
    };

    // The subject must be a user id we can key quotas on
    let Ok(user_id) = Uuid::parse_str(&claims.sub) else {
        tracing::warn!(sub = %claims.sub, "Token subject is not a user id");
        return unauthorized("Invalid or expired token");
    };

    request.extensions_mut().insert(AuthenticatedUser {
        user_id,
        token_id: claims.jti,
        email: claims.email,
        permissions: claims.scope,
        exp: claims.exp,
    });

    next.run(request).await
}

/// Lets handlers take `AuthenticatedUser` directly as an argument
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| unauthorized("Authentication required"))
    }
}
