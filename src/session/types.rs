use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::record_id::RecordId;
use crate::user::types::UserResponse;

/// JWT claims carried by a bearer token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenClaims {
    pub sub: String,   // Phone number of the identity
    pub uid: RecordId, // Record id the phone belonged to at issuance
    pub exp: usize,    // Expiration timestamp (standard JWT claim)
    pub iat: usize,    // Issued at timestamp (standard JWT claim)
}

/// Identity resolved by the auth middleware, available to handlers as
/// `Extension<AuthenticatedUser>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: RecordId,
    pub phone: String,
    pub name: String,
}

/// Request payload for login
#[derive(Deserialize)]
pub struct LoginRequest {
    pub phone: String,
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("phone", &self.phone)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Response structure for a successful login
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserResponse,
}
