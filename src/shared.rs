use axum::{
    extract::{rejection::JsonRejection, FromRequest},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

use crate::post::repository::PostRepository;
use crate::session::{
    password::PasswordHasher, revocation::RevocationList, service::SessionService,
    token::TokenService,
};
use crate::user::repository::UserRepository;

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub user_repository: Arc<dyn UserRepository + Send + Sync>,
    pub post_repository: Arc<dyn PostRepository + Send + Sync>,
    pub session_service: Arc<SessionService>,
    pub password_hasher: PasswordHasher,
}

impl AppState {
    pub fn new(
        user_repository: Arc<dyn UserRepository + Send + Sync>,
        post_repository: Arc<dyn PostRepository + Send + Sync>,
        token_service: TokenService,
        revocation_list: Arc<dyn RevocationList + Send + Sync>,
        password_hasher: PasswordHasher,
    ) -> Self {
        let session_service = Arc::new(SessionService::new(
            token_service,
            revocation_list,
            Arc::clone(&user_repository),
            password_hasher.clone(),
        ));

        Self {
            user_repository,
            post_repository,
            session_service,
            password_hasher,
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// No record matched both the id and the acting owner. Renders exactly
    /// like `NotFound`.
    #[error("Not found: {0}")]
    NotFoundOrForbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal server error")]
    Internal,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::NotFound(msg) | AppError::NotFoundOrForbidden(msg) => {
                (StatusCode::NOT_FOUND, msg)
            }
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::DatabaseError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Database error: {}", msg),
            ),
            AppError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": error_message
        }));

        (status, body).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

/// JSON body extractor whose rejections surface as 400 `AppError::Validation`
/// instead of axum's default 415/422 plain-text responses.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

/// Trims `value` and rejects it if nothing is left
pub fn require_non_empty(field: &str, value: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{} must not be empty", field)));
    }
    Ok(trimmed.to_string())
}

/// Result of an ownership-checked update
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome<T> {
    /// The record matched both id and owner and was updated
    Updated(T),
    /// No record with this id belongs to the acting owner
    NotFoundOrForbidden,
}

/// Result of an ownership-checked delete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFoundOrForbidden,
}
