use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use super::models::{ProfilePatch, UserModel};
use crate::record_id::RecordId;
use crate::shared::{AppError, UpdateOutcome};

/// Trait for user repository operations
#[async_trait]
pub trait UserRepository {
    /// Stores a new user. Fails with `Conflict` if the phone number is taken.
    async fn create_user(&self, user: &UserModel) -> Result<(), AppError>;
    async fn get_user(&self, user_id: &RecordId) -> Result<Option<UserModel>, AppError>;
    async fn get_user_by_phone(&self, phone: &str) -> Result<Option<UserModel>, AppError>;

    /// Atomically applies `patch` to the user `user_id`, provided `owner_id`
    /// is that same user. A user record is owned by itself.
    async fn update_if_owner(
        &self,
        user_id: &RecordId,
        owner_id: &RecordId,
        patch: &ProfilePatch,
    ) -> Result<UpdateOutcome<UserModel>, AppError>;
}

#[derive(Default)]
struct UserTable {
    users: HashMap<RecordId, UserModel>,
    phone_index: HashMap<String, RecordId>,
}

/// In-memory implementation of UserRepository for development and testing
///
/// Data is stored in memory and will be lost when the application restarts.
pub struct InMemoryUserRepository {
    table: RwLock<UserTable>,
}

impl Default for InMemoryUserRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryUserRepository {
    /// Creates a new empty in-memory repository
    pub fn new() -> Self {
        Self {
            table: RwLock::new(UserTable::default()),
        }
    }

    /// Returns the current number of users in the repository
    pub async fn user_count(&self) -> usize {
        self.table.read().await.users.len()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    async fn create_user(&self, user: &UserModel) -> Result<(), AppError> {
        debug!("Creating user in memory");

        let mut table = self.table.write().await;
        if table.phone_index.contains_key(&user.phone) {
            warn!("Phone number already registered");
            return Err(AppError::Conflict(
                "Phone number already registered".to_string(),
            ));
        }
        if table.users.contains_key(&user.id) {
            warn!("User id already exists in memory");
            return Err(AppError::DatabaseError("User already exists".to_string()));
        }

        table.phone_index.insert(user.phone.clone(), user.id.clone());
        table.users.insert(user.id.clone(), user.clone());

        debug!("User created successfully in memory");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_user(&self, user_id: &RecordId) -> Result<Option<UserModel>, AppError> {
        let user = self.table.read().await.users.get(user_id).cloned();

        match &user {
            Some(_) => debug!("User found in memory"),
            None => debug!("User not found in memory"),
        }
        Ok(user)
    }

    #[instrument(skip(self, phone))]
    async fn get_user_by_phone(&self, phone: &str) -> Result<Option<UserModel>, AppError> {
        let table = self.table.read().await;
        let user = table
            .phone_index
            .get(phone)
            .and_then(|id| table.users.get(id))
            .cloned();

        Ok(user)
    }

    #[instrument(skip(self, patch))]
    async fn update_if_owner(
        &self,
        user_id: &RecordId,
        owner_id: &RecordId,
        patch: &ProfilePatch,
    ) -> Result<UpdateOutcome<UserModel>, AppError> {
        debug!("Attempting ownership-checked user update");

        if user_id != owner_id {
            debug!("Acting user does not own this record");
            return Ok(UpdateOutcome::NotFoundOrForbidden);
        }

        let mut table = self.table.write().await;

        let old_phone = match table.users.get(user_id) {
            Some(user) => user.phone.clone(),
            None => {
                debug!("User not found for update");
                return Ok(UpdateOutcome::NotFoundOrForbidden);
            }
        };

        if let Some(new_phone) = &patch.phone {
            if let Some(holder) = table.phone_index.get(new_phone) {
                if holder != user_id {
                    warn!("Phone number already registered to another user");
                    return Err(AppError::Conflict(
                        "Phone number already registered".to_string(),
                    ));
                }
            }
        }

        let updated = match table.users.get_mut(user_id) {
            Some(user) => {
                user.apply(patch);
                user.clone()
            }
            None => return Ok(UpdateOutcome::NotFoundOrForbidden),
        };

        if updated.phone != old_phone {
            table.phone_index.remove(&old_phone);
            table
                .phone_index
                .insert(updated.phone.clone(), updated.id.clone());
        }

        debug!("User updated successfully in memory");
        Ok(UpdateOutcome::Updated(updated))
    }
}

/// PostgreSQL implementation of user repository
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Maps a write failure, turning unique violations on `phone` into `Conflict`
fn map_write_error(e: sqlx::Error) -> AppError {
    match &e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            warn!(error = %e, "Phone number already registered");
            AppError::Conflict("Phone number already registered".to_string())
        }
        _ => {
            warn!(error = %e, "User write failed");
            AppError::DatabaseError(e.to_string())
        }
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    async fn create_user(&self, user: &UserModel) -> Result<(), AppError> {
        debug!("Creating user in database");

        sqlx::query(
            "INSERT INTO users (id, name, phone, password_hash, created_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.phone)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        debug!("User created successfully in database");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_user(&self, user_id: &RecordId) -> Result<Option<UserModel>, AppError> {
        sqlx::query_as::<_, UserModel>(
            "SELECT id, name, phone, password_hash, created_at FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to fetch user from database");
            AppError::DatabaseError(e.to_string())
        })
    }

    #[instrument(skip(self, phone))]
    async fn get_user_by_phone(&self, phone: &str) -> Result<Option<UserModel>, AppError> {
        sqlx::query_as::<_, UserModel>(
            "SELECT id, name, phone, password_hash, created_at FROM users WHERE phone = $1",
        )
        .bind(phone)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to fetch user by phone from database");
            AppError::DatabaseError(e.to_string())
        })
    }

    #[instrument(skip(self, patch))]
    async fn update_if_owner(
        &self,
        user_id: &RecordId,
        owner_id: &RecordId,
        patch: &ProfilePatch,
    ) -> Result<UpdateOutcome<UserModel>, AppError> {
        debug!("Attempting ownership-checked user update in database");

        let row = sqlx::query_as::<_, UserModel>(
            "UPDATE users SET \
                name = COALESCE($3, name), \
                phone = COALESCE($4, phone), \
                password_hash = COALESCE($5, password_hash) \
             WHERE id = $1 AND id = $2 \
             RETURNING id, name, phone, password_hash, created_at",
        )
        .bind(user_id)
        .bind(owner_id)
        .bind(&patch.name)
        .bind(&patch.phone)
        .bind(&patch.password_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_write_error)?;

        Ok(match row {
            Some(user) => {
                debug!("User updated successfully in database");
                UpdateOutcome::Updated(user)
            }
            None => {
                debug!("No user matched id and owner");
                UpdateOutcome::NotFoundOrForbidden
            }
        })
    }
}
