use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use super::models::{PostModel, PostPatch};
use crate::record_id::RecordId;
use crate::shared::{AppError, DeleteOutcome, UpdateOutcome};

/// Trait for post repository operations
#[async_trait]
pub trait PostRepository {
    async fn create_post(&self, post: &PostModel) -> Result<(), AppError>;
    async fn get_post(&self, post_id: &RecordId) -> Result<Option<PostModel>, AppError>;

    /// All posts, newest first
    async fn list_posts(&self) -> Result<Vec<PostModel>, AppError>;

    /// Atomically applies `patch` if the post exists and belongs to `owner_id`.
    /// The ownership check and the write happen in one step, so ownership
    /// cannot change in between.
    async fn update_if_owner(
        &self,
        post_id: &RecordId,
        owner_id: &RecordId,
        patch: &PostPatch,
    ) -> Result<UpdateOutcome<PostModel>, AppError>;

    /// Atomically deletes the post if it exists and belongs to `owner_id`
    async fn delete_if_owner(
        &self,
        post_id: &RecordId,
        owner_id: &RecordId,
    ) -> Result<DeleteOutcome, AppError>;
}

/// In-memory implementation of PostRepository for development and testing
pub struct InMemoryPostRepository {
    posts: RwLock<HashMap<RecordId, PostModel>>,
}

impl Default for InMemoryPostRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryPostRepository {
    /// Creates a new empty in-memory repository
    pub fn new() -> Self {
        Self {
            posts: RwLock::new(HashMap::new()),
        }
    }

    /// Creates an in-memory repository with pre-populated posts
    pub fn with_posts(posts: Vec<PostModel>) -> Self {
        let post_map = posts
            .into_iter()
            .map(|post| (post.id.clone(), post))
            .collect();

        Self {
            posts: RwLock::new(post_map),
        }
    }

    /// Returns the current number of posts in the repository
    pub async fn post_count(&self) -> usize {
        self.posts.read().await.len()
    }
}

#[async_trait]
impl PostRepository for InMemoryPostRepository {
    #[instrument(skip(self, post), fields(post_id = %post.id, author_id = %post.author_id))]
    async fn create_post(&self, post: &PostModel) -> Result<(), AppError> {
        debug!("Creating post in memory");

        let mut posts = self.posts.write().await;
        if posts.contains_key(&post.id) {
            warn!("Post already exists in memory");
            return Err(AppError::DatabaseError("Post already exists".to_string()));
        }
        posts.insert(post.id.clone(), post.clone());

        debug!("Post created successfully in memory");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_post(&self, post_id: &RecordId) -> Result<Option<PostModel>, AppError> {
        Ok(self.posts.read().await.get(post_id).cloned())
    }

    #[instrument(skip(self))]
    async fn list_posts(&self) -> Result<Vec<PostModel>, AppError> {
        let mut posts: Vec<PostModel> = self.posts.read().await.values().cloned().collect();
        posts.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| b.id.cmp(&a.id)));

        debug!(post_count = posts.len(), "Posts listed from memory");
        Ok(posts)
    }

    #[instrument(skip(self, patch))]
    async fn update_if_owner(
        &self,
        post_id: &RecordId,
        owner_id: &RecordId,
        patch: &PostPatch,
    ) -> Result<UpdateOutcome<PostModel>, AppError> {
        let mut posts = self.posts.write().await;

        match posts.get_mut(post_id) {
            Some(post) if post.is_owned_by(owner_id) => {
                post.apply(patch);
                info!("Post updated (atomic ownership check)");
                Ok(UpdateOutcome::Updated(post.clone()))
            }
            _ => {
                debug!("No post matched id and owner");
                Ok(UpdateOutcome::NotFoundOrForbidden)
            }
        }
    }

    #[instrument(skip(self))]
    async fn delete_if_owner(
        &self,
        post_id: &RecordId,
        owner_id: &RecordId,
    ) -> Result<DeleteOutcome, AppError> {
        let mut posts = self.posts.write().await;

        match posts.get(post_id) {
            Some(post) if post.is_owned_by(owner_id) => {
                posts.remove(post_id);
                info!("Post deleted (atomic ownership check)");
                Ok(DeleteOutcome::Deleted)
            }
            _ => {
                debug!("No post matched id and owner");
                Ok(DeleteOutcome::NotFoundOrForbidden)
            }
        }
    }
}

/// PostgreSQL implementation of post repository
pub struct PostgresPostRepository {
    pool: PgPool,
}

impl PostgresPostRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const POST_COLUMNS: &str = "id, title, text, image, author, date, author_id";

#[async_trait]
impl PostRepository for PostgresPostRepository {
    #[instrument(skip(self, post), fields(post_id = %post.id, author_id = %post.author_id))]
    async fn create_post(&self, post: &PostModel) -> Result<(), AppError> {
        debug!("Creating post in database");

        sqlx::query(
            "INSERT INTO posts (id, title, text, image, author, date, author_id) VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&post.id)
        .bind(&post.title)
        .bind(&post.text)
        .bind(&post.image)
        .bind(&post.author)
        .bind(post.date)
        .bind(&post.author_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to create post in database");
            AppError::DatabaseError(e.to_string())
        })?;

        debug!("Post created successfully in database");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_post(&self, post_id: &RecordId) -> Result<Option<PostModel>, AppError> {
        sqlx::query_as::<_, PostModel>(&format!(
            "SELECT {} FROM posts WHERE id = $1",
            POST_COLUMNS
        ))
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to fetch post from database");
            AppError::DatabaseError(e.to_string())
        })
    }

    #[instrument(skip(self))]
    async fn list_posts(&self) -> Result<Vec<PostModel>, AppError> {
        sqlx::query_as::<_, PostModel>(&format!(
            "SELECT {} FROM posts ORDER BY date DESC, id DESC",
            POST_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to list posts from database");
            AppError::DatabaseError(e.to_string())
        })
    }

    #[instrument(skip(self, patch))]
    async fn update_if_owner(
        &self,
        post_id: &RecordId,
        owner_id: &RecordId,
        patch: &PostPatch,
    ) -> Result<UpdateOutcome<PostModel>, AppError> {
        let row = sqlx::query_as::<_, PostModel>(&format!(
            "UPDATE posts SET \
                title = COALESCE($3, title), \
                text = COALESCE($4, text), \
                image = COALESCE($5, image), \
                date = $6 \
             WHERE id = $1 AND author_id = $2 \
             RETURNING {}",
            POST_COLUMNS
        ))
        .bind(post_id)
        .bind(owner_id)
        .bind(&patch.title)
        .bind(&patch.text)
        .bind(&patch.image)
        .bind(patch.date)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to update post in database");
            AppError::DatabaseError(e.to_string())
        })?;

        Ok(match row {
            Some(post) => {
                info!("Post updated in database (atomic ownership check)");
                UpdateOutcome::Updated(post)
            }
            None => {
                debug!("No post matched id and owner");
                UpdateOutcome::NotFoundOrForbidden
            }
        })
    }

    #[instrument(skip(self))]
    async fn delete_if_owner(
        &self,
        post_id: &RecordId,
        owner_id: &RecordId,
    ) -> Result<DeleteOutcome, AppError> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1 AND author_id = $2")
            .bind(post_id)
            .bind(owner_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to delete post from database");
                AppError::DatabaseError(e.to_string())
            })?;

        if result.rows_affected() == 0 {
            debug!("No post matched id and owner");
            return Ok(DeleteOutcome::NotFoundOrForbidden);
        }

        info!("Post deleted from database (atomic ownership check)");
        Ok(DeleteOutcome::Deleted)
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use std::sync::Arc;

    /// Test helper functions for creating test data
    mod helpers {
        use super::*;

        pub fn create_test_post(title: &str, author_id: &RecordId) -> PostModel {
            PostModel::new(
                title.to_string(),
                format!("{} body", title),
                String::new(),
                "Al".to_string(),
                author_id.clone(),
            )
        }

        pub fn title_patch(title: &str) -> PostPatch {
            PostPatch {
                title: Some(title.to_string()),
                text: None,
                image: None,
                date: Utc::now() + Duration::seconds(1),
            }
        }
    }

    use helpers::*;

    #[tokio::test]
    async fn test_create_and_get_post() {
        let repo = InMemoryPostRepository::new();
        let owner = RecordId::generate();
        let post = create_test_post("T", &owner);

        repo.create_post(&post).await.unwrap();

        let retrieved = repo.get_post(&post.id).await.unwrap().unwrap();
        assert_eq!(retrieved, post);
    }

    #[tokio::test]
    async fn test_list_posts_newest_first() {
        let owner = RecordId::generate();
        let mut older = create_test_post("older", &owner);
        older.date = Utc::now() - Duration::hours(1);
        let newer = create_test_post("newer", &owner);

        let repo = InMemoryPostRepository::with_posts(vec![older, newer]);
        let posts = repo.list_posts().await.unwrap();

        let titles: Vec<&str> = posts.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["newer", "older"]);
    }

    #[tokio::test]
    async fn test_update_if_owner() {
        let repo = InMemoryPostRepository::new();
        let owner = RecordId::generate();
        let post = create_test_post("T", &owner);
        repo.create_post(&post).await.unwrap();

        let patch = title_patch("T2");
        let outcome = repo.update_if_owner(&post.id, &owner, &patch).await.unwrap();

        let UpdateOutcome::Updated(updated) = outcome else {
            panic!("expected update to apply");
        };
        assert_eq!(updated.title, "T2");
        assert_eq!(updated.text, post.text);
        assert_eq!(updated.date, patch.date);
        assert_eq!(updated.author_id, owner);
    }

    #[tokio::test]
    async fn test_update_by_non_owner_leaves_post_unchanged() {
        let repo = InMemoryPostRepository::new();
        let owner = RecordId::generate();
        let intruder = RecordId::generate();
        let post = create_test_post("T", &owner);
        repo.create_post(&post).await.unwrap();

        let outcome = repo
            .update_if_owner(&post.id, &intruder, &title_patch("pwned"))
            .await
            .unwrap();

        assert_eq!(outcome, UpdateOutcome::NotFoundOrForbidden);
        assert_eq!(repo.get_post(&post.id).await.unwrap().unwrap(), post);
    }

    #[tokio::test]
    async fn test_update_missing_post_same_outcome_as_forbidden() {
        let repo = InMemoryPostRepository::new();
        let owner = RecordId::generate();

        let outcome = repo
            .update_if_owner(&RecordId::generate(), &owner, &title_patch("T2"))
            .await
            .unwrap();

        assert_eq!(outcome, UpdateOutcome::NotFoundOrForbidden);
    }

    #[tokio::test]
    async fn test_delete_if_owner() {
        let repo = InMemoryPostRepository::new();
        let owner = RecordId::generate();
        let post = create_test_post("T", &owner);
        repo.create_post(&post).await.unwrap();

        let outcome = repo.delete_if_owner(&post.id, &owner).await.unwrap();

        assert_eq!(outcome, DeleteOutcome::Deleted);
        assert!(repo.get_post(&post.id).await.unwrap().is_none());

        // Second delete finds nothing
        let again = repo.delete_if_owner(&post.id, &owner).await.unwrap();
        assert_eq!(again, DeleteOutcome::NotFoundOrForbidden);
    }

    #[tokio::test]
    async fn test_delete_by_non_owner_keeps_post() {
        let repo = InMemoryPostRepository::new();
        let owner = RecordId::generate();
        let post = create_test_post("T", &owner);
        repo.create_post(&post).await.unwrap();

        let outcome = repo
            .delete_if_owner(&post.id, &RecordId::generate())
            .await
            .unwrap();

        assert_eq!(outcome, DeleteOutcome::NotFoundOrForbidden);
        assert_eq!(repo.post_count().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_update_and_delete_are_serialized() {
        let repo = Arc::new(InMemoryPostRepository::new());
        let owner = RecordId::generate();
        let post = create_test_post("T", &owner);
        repo.create_post(&post).await.unwrap();

        let update = {
            let repo = repo.clone();
            let (id, owner) = (post.id.clone(), owner.clone());
            tokio::spawn(async move { repo.update_if_owner(&id, &owner, &title_patch("T2")).await })
        };
        let delete = {
            let repo = repo.clone();
            let (id, owner) = (post.id.clone(), owner.clone());
            tokio::spawn(async move { repo.delete_if_owner(&id, &owner).await })
        };

        let update = update.await.unwrap().unwrap();
        let delete = delete.await.unwrap().unwrap();

        // Delete always wins eventually; the update either ran first or saw nothing
        assert_eq!(delete, DeleteOutcome::Deleted);
        assert!(matches!(
            update,
            UpdateOutcome::Updated(_) | UpdateOutcome::NotFoundOrForbidden
        ));
        assert_eq!(repo.post_count().await, 0);
    }
}
