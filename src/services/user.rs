// Account registry
// Users are the identity anchor every tier record, usage bucket and payment hangs off

use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::models::{CreateUserRequest, NewUser, User};
use crate::services::clock::Clock;
use crate::store::{Store, StoreError};

#[derive(Debug, Error)]
pub enum UserError {
    #[error("User not found: {0}")]
    NotFound(Uuid),

    #[error("Email or username already registered")]
    AlreadyExists,

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for UserError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Conflict(_) => UserError::AlreadyExists,
            other => UserError::Store(other),
        }
    }
}

pub struct UserService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl UserService {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn create_user(&self, request: CreateUserRequest) -> Result<User, UserError> {
        request.validate()?;

        let user = self
            .store
            .insert_user(NewUser::new(
                &request.email,
                &request.username,
                self.clock.now(),
            ))
            .await?;

        info!(user_id = %user.id, "User created");
        Ok(user)
    }

    pub async fn find_user(&self, user_id: Uuid) -> Result<User, UserError> {
        self.store
            .find_user(user_id)
            .await?
            .ok_or(UserError::NotFound(user_id))
    }
}
