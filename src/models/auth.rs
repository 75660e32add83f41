// Access token claims issued by the identity service and validated here

use serde::{Deserialize, Serialize};

/// Scope granting the administrative tier routes
pub const ADMIN_SCOPE: &str = "admin";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccessTokenClaims {
    /// User ID (subject)
    pub sub: String,

    /// JWT ID (UUID format)
    pub jti: String,

    pub email: String,

    /// Token scope/permissions
    #[serde(default)]
    pub scope: Vec<String>,

    pub aud: String,
    pub iss: String,

    /// Issued at timestamp (Unix epoch seconds)
    pub iat: u64,

    /// Expires at timestamp (Unix epoch seconds)
    pub exp: u64,
}

impl AccessTokenClaims {
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scope.iter().any(|s| s == scope)
    }
}
