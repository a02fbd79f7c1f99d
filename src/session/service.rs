use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::{
    password::PasswordHasher,
    revocation::RevocationList,
    token::TokenService,
    types::{AuthenticatedUser, LoginRequest, LoginResponse},
};
use crate::shared::AppError;
use crate::user::repository::UserRepository;

const INVALID_CREDENTIALS: &str = "Invalid phone or password";

/// Service for login, logout and bearer-token authentication
pub struct SessionService {
    token_service: TokenService,
    revocation_list: Arc<dyn RevocationList + Send + Sync>,
    user_repository: Arc<dyn UserRepository + Send + Sync>,
    password_hasher: PasswordHasher,
}

impl SessionService {
    pub fn new(
        token_service: TokenService,
        revocation_list: Arc<dyn RevocationList + Send + Sync>,
        user_repository: Arc<dyn UserRepository + Send + Sync>,
        password_hasher: PasswordHasher,
    ) -> Self {
        Self {
            token_service,
            revocation_list,
            user_repository,
            password_hasher,
        }
    }

    /// Checks phone and password and issues a bearer token for the phone number
    #[instrument(skip(self, request))]
    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse, AppError> {
        let phone = request.phone.trim();
        let user = match self.user_repository.get_user_by_phone(phone).await? {
            Some(user) => user,
            None => {
                warn!("Login attempt for unknown phone number");
                return Err(AppError::Unauthorized(INVALID_CREDENTIALS.to_string()));
            }
        };

        let password_ok = self
            .password_hasher
            .verify_async(request.password, user.password_hash.clone())
            .await?;
        if !password_ok {
            warn!(user_id = %user.id, "Login attempt with wrong password");
            return Err(AppError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }

        let issued = self.token_service.issue(&user.phone, &user.id)?;

        info!(user_id = %user.id, expires_at = %issued.expires_at, "Login successful");
        Ok(LoginResponse {
            token: issued.token,
            expires_at: issued.expires_at,
            user: user.into(),
        })
    }

    /// Resolves a bearer token to the identity it was issued for
    #[instrument(skip(self, token))]
    pub async fn authenticate(&self, token: &str) -> Result<AuthenticatedUser, AppError> {
        let claims = self.token_service.validate(token)?;
        debug!("JWT token structure validated");

        if self.revocation_list.is_revoked(token).await? {
            warn!("Token has been revoked");
            return Err(AppError::Unauthorized("Token has been revoked".to_string()));
        }

        // The phone may have changed hands since issuance, so it must still
        // belong to the record the token was issued for
        match self.user_repository.get_user_by_phone(&claims.sub).await? {
            Some(user) if user.id == claims.uid => {
                debug!(user_id = %user.id, "Token subject resolved to user");
                Ok(AuthenticatedUser {
                    user_id: user.id,
                    phone: user.phone,
                    name: user.name,
                })
            }
            Some(user) => {
                warn!(
                    user_id = %user.id,
                    token_user_id = %claims.uid,
                    "Token subject now belongs to a different user"
                );
                Err(AppError::Unauthorized(
                    "Token subject no longer exists".to_string(),
                ))
            }
            None => {
                warn!("Token subject no longer matches a user");
                Err(AppError::Unauthorized(
                    "Token subject no longer exists".to_string(),
                ))
            }
        }
    }

    /// Revokes `token` until its natural expiry. Returns whether anything was
    /// revoked; invalid or absent tokens are a no-op.
    #[instrument(skip(self, token))]
    pub async fn logout(&self, token: Option<&str>) -> Result<bool, AppError> {
        let Some(token) = token else {
            debug!("Logout without bearer token");
            return Ok(false);
        };

        let claims = match self.token_service.validate(token) {
            Ok(claims) => claims,
            Err(e) => {
                debug!(error = %e, "Logout with unusable token, nothing to revoke");
                return Ok(false);
            }
        };

        let expires_at = DateTime::<Utc>::from_timestamp(claims.exp as i64, 0)
            .unwrap_or_else(|| Utc::now() + self.token_service.ttl());
        self.revocation_list.revoke(token, expires_at).await?;

        info!(expires_at = %expires_at, "Token revoked on logout");
        Ok(true)
    }
}
