use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::{
    models::{PostModel, PostPatch},
    repository::PostRepository,
    types::{CreatePostRequest, UpdatePostRequest},
};
use crate::record_id::RecordId;
use crate::session::AuthenticatedUser;
use crate::shared::{require_non_empty, AppError, DeleteOutcome, UpdateOutcome};

const POST_NOT_FOUND: &str = "Post not found";

/// Service for handling post business logic
pub struct PostService {
    repository: Arc<dyn PostRepository + Send + Sync>,
}

impl PostService {
    pub fn new(repository: Arc<dyn PostRepository + Send + Sync>) -> Self {
        Self { repository }
    }

    /// Creates a post owned by the authenticated caller
    #[instrument(skip(self, acting, request), fields(author_id = %acting.user_id))]
    pub async fn create_post(
        &self,
        acting: &AuthenticatedUser,
        request: CreatePostRequest,
    ) -> Result<PostModel, AppError> {
        let title = require_non_empty("title", &request.title)?;
        let post = PostModel::new(
            title,
            request.text,
            request.image.trim().to_string(),
            acting.name.clone(),
            acting.user_id.clone(),
        );

        self.repository.create_post(&post).await?;

        info!(post_id = %post.id, "Post created");
        Ok(post)
    }

    #[instrument(skip(self))]
    pub async fn list_posts(&self) -> Result<Vec<PostModel>, AppError> {
        let posts = self.repository.list_posts().await?;
        info!(post_count = posts.len(), "Posts listed");
        Ok(posts)
    }

    #[instrument(skip(self))]
    pub async fn get_post(&self, post_id: &RecordId) -> Result<PostModel, AppError> {
        self.repository
            .get_post(post_id)
            .await?
            .ok_or_else(|| AppError::NotFound(POST_NOT_FOUND.to_string()))
    }

    /// Updates a post the caller owns, refreshing its date
    #[instrument(skip(self, acting, request), fields(acting_user_id = %acting.user_id))]
    pub async fn update_post(
        &self,
        acting: &AuthenticatedUser,
        post_id: &RecordId,
        request: UpdatePostRequest,
    ) -> Result<PostModel, AppError> {
        if request.title.is_none() && request.text.is_none() && request.image.is_none() {
            return Err(AppError::Validation(
                "at least one of title, text or image is required".to_string(),
            ));
        }

        let patch = PostPatch {
            title: request
                .title
                .map(|title| require_non_empty("title", &title))
                .transpose()?,
            text: request.text,
            image: request.image.map(|image| image.trim().to_string()),
            date: Utc::now(),
        };

        match self
            .repository
            .update_if_owner(post_id, &acting.user_id, &patch)
            .await?
        {
            UpdateOutcome::Updated(post) => {
                info!(post_id = %post.id, "Post updated");
                Ok(post)
            }
            UpdateOutcome::NotFoundOrForbidden => {
                warn!(post_id = %post_id, "Post update matched no owned post");
                Err(AppError::NotFoundOrForbidden(POST_NOT_FOUND.to_string()))
            }
        }
    }

    /// Deletes a post the caller owns
    #[instrument(skip(self, acting), fields(acting_user_id = %acting.user_id))]
    pub async fn delete_post(
        &self,
        acting: &AuthenticatedUser,
        post_id: &RecordId,
    ) -> Result<(), AppError> {
        match self
            .repository
            .delete_if_owner(post_id, &acting.user_id)
            .await?
        {
            DeleteOutcome::Deleted => {
                info!(post_id = %post_id, "Post deleted");
                Ok(())
            }
            DeleteOutcome::NotFoundOrForbidden => {
                warn!(post_id = %post_id, "Post delete matched no owned post");
                Err(AppError::NotFoundOrForbidden(POST_NOT_FOUND.to_string()))
            }
        }
    }
}
