use chrono::Utc;

use super::{validate_length, validate_page, validate_text, SocialService};
use crate::error::{AppError, AppResult};
use crate::models::{Comment, PageMeta, Post, PostListFilter, PostListItem};
use crate::store::StoreError;

const MAX_TAGS: usize = 20;

impl SocialService {
    // ==================== Post Operations ====================

    pub fn create_post(&self, user_id: &str, content: &str, tags: Vec<String>) -> AppResult<Post> {
        validate_length("postInHtml", content, 2, 500)?;
        if tags.is_empty() || tags.len() > MAX_TAGS {
            return Err(AppError::validation(format!(
                "tags must contain between 1 and {} items",
                MAX_TAGS
            )));
        }
        if tags.iter().any(|t| t.trim().is_empty()) {
            return Err(AppError::validation("tags must not be empty"));
        }

        let mut post = Post {
            id: String::new(),
            user_id: user_id.to_string(),
            content: content.to_string(),
            tags,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.store.create_post(&mut post)?;
        log::info!("post {} created by {}", post.id, user_id);
        Ok(post)
    }

    pub fn create_post_comment(
        &self,
        user_id: &str,
        post_id: &str,
        text: &str,
    ) -> AppResult<Comment> {
        if post_id.is_empty() {
            return Err(AppError::validation("postId is required"));
        }
        validate_length("comment", text, 2, 500)?;
        validate_text("comment", text)?;

        let post_missing = |e: StoreError| match e {
            StoreError::NotFound(_) => AppError::NotFound("post not found".to_string()),
            other => other.into(),
        };
        self.store.find_post(post_id).map_err(post_missing)?;

        let mut comment = Comment {
            id: String::new(),
            post_id: post_id.to_string(),
            user_id: user_id.to_string(),
            comment: text.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.store.create_comment(&mut comment).map_err(post_missing)?;
        log::info!("comment {} added to post {}", comment.id, post_id);
        Ok(comment)
    }

    pub fn list_posts(&self, filter: &PostListFilter) -> AppResult<(Vec<PostListItem>, PageMeta)> {
        validate_page(filter.limit, filter.offset)?;
        Ok(self.store.list_posts(filter)?)
    }
}
