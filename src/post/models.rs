use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::record_id::RecordId;

/// Database model for posts table
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct PostModel {
    pub id: RecordId,
    pub title: String,
    pub text: String,
    pub image: String,          // Image reference, empty when absent
    pub author: String,         // Author's display name when the post was created
    pub date: DateTime<Utc>,    // Creation time, refreshed on every update
    pub author_id: RecordId,    // Owning user, fixed at creation
}

impl PostModel {
    /// Creates a new post owned by `author_id`
    pub fn new(
        title: String,
        text: String,
        image: String,
        author: String,
        author_id: RecordId,
    ) -> Self {
        Self {
            id: RecordId::generate(),
            title,
            text,
            image,
            author,
            date: Utc::now(),
            author_id,
        }
    }

    pub fn is_owned_by(&self, user_id: &RecordId) -> bool {
        &self.author_id == user_id
    }

    /// Applies the fields present in `patch` and stamps the new date
    pub fn apply(&mut self, patch: &PostPatch) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(text) = &patch.text {
            self.text = text.clone();
        }
        if let Some(image) = &patch.image {
            self.image = image.clone();
        }
        self.date = patch.date;
    }
}

/// Partial post update. `date` is always written.
#[derive(Debug, Clone, PartialEq)]
pub struct PostPatch {
    pub title: Option<String>,
    pub text: Option<String>,
    pub image: Option<String>,
    pub date: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_apply_refreshes_date_and_keeps_owner() {
        let owner = RecordId::generate();
        let mut post = PostModel::new(
            "T".to_string(),
            "X".to_string(),
            String::new(),
            "Al".to_string(),
            owner.clone(),
        );
        let later = post.date + Duration::seconds(5);

        post.apply(&PostPatch {
            title: Some("T2".to_string()),
            text: None,
            image: None,
            date: later,
        });

        assert_eq!(post.title, "T2");
        assert_eq!(post.text, "X");
        assert_eq!(post.date, later);
        assert_eq!(post.author, "Al");
        assert!(post.is_owned_by(&owner));
    }
}
