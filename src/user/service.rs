use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::{
    models::{ProfilePatch, UserModel},
    repository::UserRepository,
    types::{RegisterRequest, UpdateProfileRequest, UserResponse},
};
use crate::record_id::RecordId;
use crate::session::{password::PasswordHasher, AuthenticatedUser};
use crate::shared::{require_non_empty, AppError, UpdateOutcome};

const USER_NOT_FOUND: &str = "User not found";

/// Service for handling registration and profile business logic
pub struct UserService {
    repository: Arc<dyn UserRepository + Send + Sync>,
    password_hasher: PasswordHasher,
}

impl UserService {
    pub fn new(
        repository: Arc<dyn UserRepository + Send + Sync>,
        password_hasher: PasswordHasher,
    ) -> Self {
        Self {
            repository,
            password_hasher,
        }
    }

    /// Registers a new user, storing only the bcrypt hash of the password
    #[instrument(skip(self, request))]
    pub async fn register(&self, request: RegisterRequest) -> Result<UserResponse, AppError> {
        let name = require_non_empty("name", &request.name)?;
        let phone = require_non_empty("phone", &request.phone)?;
        if request.password.is_empty() {
            return Err(AppError::Validation(
                "password must not be empty".to_string(),
            ));
        }

        let password_hash = self.password_hasher.hash_async(request.password).await?;
        let user = UserModel::new(name, phone, password_hash);

        self.repository.create_user(&user).await?;

        info!(user_id = %user.id, "User registered");
        Ok(user.into())
    }

    /// Fetches the caller's own profile. Other users' ids are reported as not found.
    #[instrument(skip(self, acting), fields(acting_user_id = %acting.user_id))]
    pub async fn get_profile(
        &self,
        acting: &AuthenticatedUser,
        user_id: &RecordId,
    ) -> Result<UserResponse, AppError> {
        if &acting.user_id != user_id {
            warn!(user_id = %user_id, "Profile lookup for another user refused");
            return Err(AppError::NotFoundOrForbidden(USER_NOT_FOUND.to_string()));
        }

        self.repository
            .get_user(user_id)
            .await?
            .map(UserResponse::from)
            .ok_or_else(|| AppError::NotFound(USER_NOT_FOUND.to_string()))
    }

    /// Updates name, phone or password of the caller's own record
    #[instrument(skip(self, acting, request), fields(acting_user_id = %acting.user_id))]
    pub async fn update_profile(
        &self,
        acting: &AuthenticatedUser,
        user_id: &RecordId,
        request: UpdateProfileRequest,
    ) -> Result<UserResponse, AppError> {
        // Refuse before hashing anything for a record the caller cannot own
        if &acting.user_id != user_id {
            warn!(user_id = %user_id, "Profile update for another user refused");
            return Err(AppError::NotFoundOrForbidden(USER_NOT_FOUND.to_string()));
        }

        let patch = self.build_patch(request).await?;

        match self
            .repository
            .update_if_owner(user_id, &acting.user_id, &patch)
            .await?
        {
            UpdateOutcome::Updated(user) => {
                info!(
                    user_id = %user.id,
                    password_changed = patch.password_hash.is_some(),
                    "Profile updated"
                );
                Ok(user.into())
            }
            UpdateOutcome::NotFoundOrForbidden => {
                warn!(user_id = %user_id, "Profile update matched no owned record");
                Err(AppError::NotFoundOrForbidden(USER_NOT_FOUND.to_string()))
            }
        }
    }

    async fn build_patch(&self, request: UpdateProfileRequest) -> Result<ProfilePatch, AppError> {
        if request.name.is_none() && request.phone.is_none() && request.password.is_none() {
            return Err(AppError::Validation(
                "at least one of name, phone or password is required".to_string(),
            ));
        }

        let name = request
            .name
            .map(|name| require_non_empty("name", &name))
            .transpose()?;
        let phone = request
            .phone
            .map(|phone| require_non_empty("phone", &phone))
            .transpose()?;
        let password_hash = match request.password {
            Some(password) if password.is_empty() => {
                return Err(AppError::Validation(
                    "password must not be empty".to_string(),
                ))
            }
            Some(password) => Some(self.password_hasher.hash_async(password).await?),
            None => None,
        };

        Ok(ProfilePatch {
            name,
            phone,
            password_hash,
        })
    }
}
