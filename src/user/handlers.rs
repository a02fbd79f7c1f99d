use axum::{
    extract::{Path, State},
    Extension, Json,
};
use std::sync::Arc;
use tracing::{info, instrument};

use super::{
    service::UserService,
    types::{RegisterRequest, UpdateProfileRequest, UserMessageResponse, UserResponse},
};
use crate::record_id::RecordId;
use crate::session::AuthenticatedUser;
use crate::shared::{AppError, AppState, JsonBody};

fn user_service(state: &AppState) -> UserService {
    UserService::new(
        Arc::clone(&state.user_repository),
        state.password_hasher.clone(),
    )
}

/// HTTP handler for registering a new user
///
/// POST /register
#[instrument(name = "register", skip(state, request))]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<RegisterRequest>,
) -> Result<Json<UserMessageResponse>, AppError> {
    info!("Registering new user");

    let user = user_service(&state).register(request).await?;

    Ok(Json(UserMessageResponse {
        message: "User registered successfully".to_string(),
        user,
    }))
}

/// HTTP handler for reading the caller's own profile
///
/// GET /users/:id
#[instrument(name = "get_user", skip(state, auth))]
pub async fn get_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, AppError> {
    // A malformed id can never name a record, so it reads as not found
    let user_id: RecordId = id
        .parse()
        .map_err(|_| AppError::NotFound("User not found".to_string()))?;

    let user = user_service(&state).get_profile(&auth, &user_id).await?;
    Ok(Json(user))
}

/// HTTP handler for updating name, phone or password
///
/// PUT /users/:id and POST /update/:id
#[instrument(name = "update_user", skip(state, auth, request))]
pub async fn update_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
    JsonBody(request): JsonBody<UpdateProfileRequest>,
) -> Result<Json<UserMessageResponse>, AppError> {
    let user_id: RecordId = id
        .parse()
        .map_err(|_| AppError::Validation("Invalid user ID".to_string()))?;

    let user = user_service(&state)
        .update_profile(&auth, &user_id, request)
        .await?;

    info!(user_id = %user.id, "Profile update handled");
    Ok(Json(UserMessageResponse {
        message: "Profile updated successfully".to_string(),
        user,
    }))
}
