use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, OptionalExtension};
use uuid::Uuid;

use super::aggregate::decode_comments;
use super::query::post_feed_query;
use super::{
    format_timestamp, get_datetime, is_foreign_key_violation, is_valid_id, now, Store,
    StoreError, StoreResult,
};
use crate::models::{
    Comment, FriendSummary, PageMeta, Post, PostListFilter, PostListItem, PostView,
};

// Feed row as read from SQLite, before the JSON columns are decoded.
struct FeedRow {
    post_id: String,
    content: String,
    tags: String,
    created_at: DateTime<Utc>,
    creator: FriendSummary,
    comments: String,
}

impl Store {
    // ==================== Post Operations ====================

    pub fn create_post(&self, post: &mut Post) -> StoreResult<()> {
        post.id = Uuid::new_v4().to_string();
        let now = now();
        post.created_at = now;
        post.updated_at = now;
        let tags = serde_json::to_string(&post.tags)?;

        self.run("create_post", |conn| {
            conn.execute(
                r#"INSERT INTO posts (id, user_id, content, tags, created_at, updated_at)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
                params![
                    &post.id,
                    &post.user_id,
                    &post.content,
                    tags,
                    format_timestamp(&post.created_at),
                    format_timestamp(&post.updated_at),
                ],
            )
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    StoreError::NotFound("user".to_string())
                } else {
                    e.into()
                }
            })?;
            Ok(())
        })
    }

    pub fn find_post(&self, id: &str) -> StoreResult<Post> {
        if !is_valid_id(id) {
            return Err(StoreError::NotFound("post".to_string()));
        }
        let (mut post, tags) = self.run("find_post", |conn| {
            conn.query_row(
                r#"SELECT id, user_id, content, tags, created_at, updated_at
                   FROM posts WHERE id = ?1"#,
                params![id],
                |row| {
                    let tags: String = row.get(3)?;
                    Ok((
                        Post {
                            id: row.get(0)?,
                            user_id: row.get(1)?,
                            content: row.get(2)?,
                            tags: Vec::new(),
                            created_at: get_datetime(row, 4)?,
                            updated_at: get_datetime(row, 5)?,
                        },
                        tags,
                    ))
                },
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound("post".to_string()))
        })?;
        post.tags = serde_json::from_str(&tags)?;
        Ok(post)
    }

    // ==================== Comment Operations ====================

    pub fn create_comment(&self, comment: &mut Comment) -> StoreResult<()> {
        comment.id = Uuid::new_v4().to_string();
        let now = now();
        comment.created_at = now;
        comment.updated_at = now;

        self.run("create_comment", |conn| {
            conn.execute(
                r#"INSERT INTO post_comments (id, post_id, user_id, comment, created_at, updated_at)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
                params![
                    &comment.id,
                    &comment.post_id,
                    &comment.user_id,
                    &comment.comment,
                    format_timestamp(&comment.created_at),
                    format_timestamp(&comment.updated_at),
                ],
            )
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    StoreError::NotFound("post".to_string())
                } else {
                    e.into()
                }
            })?;
            Ok(())
        })
    }

    // ==================== Feed ====================

    /// Newest posts first, each with its author and all of its comments.
    pub fn list_posts(&self, filter: &PostListFilter) -> StoreResult<(Vec<PostListItem>, PageMeta)> {
        let (sql, values) = post_feed_query(filter).build();

        let rows = self.run("list_posts", |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(values), |row| {
                Ok(FeedRow {
                    post_id: row.get(0)?,
                    content: row.get(2)?,
                    tags: row.get(3)?,
                    created_at: get_datetime(row, 4)?,
                    creator: FriendSummary {
                        user_id: row.get(5)?,
                        name: row.get(6)?,
                        image_url: row.get(7)?,
                        friend_count: row.get(8)?,
                        created_at: get_datetime(row, 9)?,
                    },
                    comments: row.get(10)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
        })?;

        let items = rows
            .into_iter()
            .map(|row| -> StoreResult<PostListItem> {
                Ok(PostListItem {
                    post_id: row.post_id,
                    post: PostView {
                        post_in_html: row.content,
                        tags: serde_json::from_str(&row.tags)?,
                        created_at: row.created_at,
                    },
                    comments: decode_comments(&row.comments)?,
                    creator: row.creator,
                })
            })
            .collect::<StoreResult<Vec<_>>>()?;

        let meta = PageMeta {
            limit: filter.limit,
            offset: filter.offset,
            total: items.len() as i64,
        };
        Ok((items, meta))
    }
}
