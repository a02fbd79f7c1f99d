use tracing::{debug, error, instrument, warn};

use crate::shared::AppError;

/// Lowest cost bcrypt accepts
pub const MIN_COST: u32 = 4;
/// Highest cost bcrypt accepts
pub const MAX_COST: u32 = 31;
/// Cost used when none is configured
pub const DEFAULT_COST: u32 = 14;

/// One-way bcrypt hashing for user passwords.
///
/// The hash embeds its own salt and cost, so `verify` works against hashes
/// produced under an older cost setting.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self {
            cost: cost.clamp(MIN_COST, MAX_COST),
        }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Hashes a password with a fresh random salt
    pub fn hash(&self, password: &str) -> Result<String, AppError> {
        bcrypt::hash(password, self.cost).map_err(|e| {
            error!(error = %e, "Failed to hash password");
            AppError::Internal
        })
    }

    /// Checks a password against a stored hash. Malformed hashes count as a mismatch.
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        match bcrypt::verify(password, hash) {
            Ok(matches) => matches,
            Err(e) => {
                warn!(error = %e, "Stored password hash could not be parsed");
                false
            }
        }
    }

    /// Runs `hash` on the blocking pool
    #[instrument(skip_all, fields(cost = self.cost))]
    pub async fn hash_async(&self, password: String) -> Result<String, AppError> {
        let hasher = self.clone();
        let hashed = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| {
                error!(error = %e, "Password hashing task failed");
                AppError::Internal
            })??;

        debug!("Password hashed");
        Ok(hashed)
    }

    /// Runs `verify` on the blocking pool
    #[instrument(skip_all)]
    pub async fn verify_async(&self, password: String, hash: String) -> Result<bool, AppError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| {
                error!(error = %e, "Password verification task failed");
                AppError::Internal
            })
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(DEFAULT_COST)
    }
}
