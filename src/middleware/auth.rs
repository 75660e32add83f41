// Authenticated caller extracted from a validated access token

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::auth::ADMIN_SCOPE;
use crate::utils::ServiceError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub token_id: String,
    pub email: String,
    pub permissions: Vec<String>,
    pub exp: u64,
}

impl AuthenticatedUser {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }

    /// Administrative routes need the `admin` scope
    pub fn require_admin(&self) -> Result<(), ServiceError> {
        if self.has_permission(ADMIN_SCOPE) {
            Ok(())
        } else {
            Err(ServiceError::Forbidden)
        }
    }
}
