use axum::{
    extract::{Path, State},
    Extension, Json,
};
use std::sync::Arc;
use tracing::{info, instrument};

use super::{
    models::PostModel,
    service::PostService,
    types::{CreatePostRequest, MessageResponse, UpdatePostRequest},
};
use crate::record_id::RecordId;
use crate::session::AuthenticatedUser;
use crate::shared::{AppError, AppState, JsonBody};

fn post_service(state: &AppState) -> PostService {
    PostService::new(Arc::clone(&state.post_repository))
}

fn parse_post_id(id: &str) -> Result<RecordId, AppError> {
    id.parse()
        .map_err(|_| AppError::Validation("Invalid post ID".to_string()))
}

/// HTTP handler for creating a post
///
/// POST /protected/posts
#[instrument(name = "create_post", skip(state, auth, request))]
pub async fn create_post(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    JsonBody(request): JsonBody<CreatePostRequest>,
) -> Result<Json<PostModel>, AppError> {
    let post = post_service(&state).create_post(&auth, request).await?;
    Ok(Json(post))
}

/// HTTP handler for listing all posts
///
/// GET /protected/posts
#[instrument(name = "list_posts", skip(state))]
pub async fn list_posts(State(state): State<AppState>) -> Result<Json<Vec<PostModel>>, AppError> {
    let posts = post_service(&state).list_posts().await?;
    Ok(Json(posts))
}

/// GET /protected/posts/:id
#[instrument(name = "get_post", skip(state))]
pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PostModel>, AppError> {
    let post_id = parse_post_id(&id)?;
    let post = post_service(&state).get_post(&post_id).await?;
    Ok(Json(post))
}

/// HTTP handler for updating a post the caller owns
///
/// PUT /protected/posts/:id
#[instrument(name = "update_post", skip(state, auth, request))]
pub async fn update_post(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
    JsonBody(request): JsonBody<UpdatePostRequest>,
) -> Result<Json<PostModel>, AppError> {
    let post_id = parse_post_id(&id)?;
    let post = post_service(&state)
        .update_post(&auth, &post_id, request)
        .await?;
    Ok(Json(post))
}

/// HTTP handler for deleting a post the caller owns
///
/// DELETE /protected/posts/:id
#[instrument(name = "delete_post", skip(state, auth))]
pub async fn delete_post(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let post_id = parse_post_id(&id)?;
    post_service(&state).delete_post(&auth, &post_id).await?;

    info!(post_id = %post_id, "Post delete handled");
    Ok(Json(MessageResponse {
        message: "Post deleted successfully".to_string(),
    }))
}
