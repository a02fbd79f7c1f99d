use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::record_id::RecordId;

/// Database model for users table
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct UserModel {
    pub id: RecordId,
    pub name: String,
    pub phone: String,         // Unique natural key, also the token subject
    pub password_hash: String, // bcrypt, never the raw password
    pub created_at: DateTime<Utc>,
}

impl UserModel {
    /// Creates a new user model with generated ID. `password_hash` must already be hashed.
    pub fn new(name: String, phone: String, password_hash: String) -> Self {
        Self {
            id: RecordId::generate(),
            name,
            phone,
            password_hash,
            created_at: Utc::now(),
        }
    }

    /// Applies the fields present in `patch`
    pub fn apply(&mut self, patch: &ProfilePatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(phone) = &patch.phone {
            self.phone = phone.clone();
        }
        if let Some(password_hash) = &patch.password_hash {
            self.password_hash = password_hash.clone();
        }
    }
}

/// Partial profile update, already validated and with the password hashed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub password_hash: Option<String>,
}
