// src/models/comment.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::post::AuthorInfo;

/// A 'comments' row joined with its author.
#[derive(Debug, Clone, FromRow)]
pub struct CommentRow {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    pub author_name: String,
    pub author_avatar: String,
    /// NULL for a top-level comment.
    pub parent_id: Option<i64>,
    pub content: String,
    pub likes_count: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for creating a comment.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCommentRequest {
    #[validate(length(
        min = 1,
        max = 2000,
        message = "Comment must be between 1 and 2000 characters"
    ))]
    pub content: String,

    /// Optional: the ID of the top-level comment being replied to.
    #[serde(default, alias = "parentComment")]
    pub parent_id: Option<i64>,
}

/// JSON shape of a comment; top-level comments carry their replies.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentResponse {
    pub id: i64,
    pub post_id: i64,
    pub parent_id: Option<i64>,
    pub author: AuthorInfo,
    pub content: String,
    pub likes_count: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub replies: Vec<CommentResponse>,
}

impl From<CommentRow> for CommentResponse {
    fn from(row: CommentRow) -> Self {
        Self {
            id: row.id,
            post_id: row.post_id,
            parent_id: row.parent_id,
            author: AuthorInfo {
                id: row.author_id,
                name: row.author_name,
                avatar: row.author_avatar,
            },
            content: row.content,
            likes_count: row.likes_count,
            created_at: row.created_at,
            replies: Vec::new(),
        }
    }
}
