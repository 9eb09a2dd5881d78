// src/models/post.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use validator::Validate;

/// Fixed category set, stored as TEXT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum Category {
    Technology,
    Lifestyle,
    Travel,
    Food,
    Health,
    Business,
    Literature,
    Culture,
    Other,
}

/// Publication status, stored lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Published,
}

/// A 'posts' row joined with its author.
/// `is_liked` is populated only by the single-post query; listings leave it
/// at its default.
#[derive(Debug, Clone, FromRow)]
pub struct PostRow {
    pub id: i64,
    pub author_id: i64,
    pub author_name: String,
    pub author_avatar: String,
    pub title: String,
    pub content: String,
    pub slug: String,
    pub category: Category,
    pub tags: Json<Vec<String>>,
    pub status: PostStatus,
    pub views: i64,
    pub likes_count: i64,
    pub comments_count: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    #[sqlx(default)]
    pub is_liked: bool,
}

/// Author info embedded in post and comment responses.
#[derive(Debug, Serialize)]
pub struct AuthorInfo {
    pub id: i64,
    pub name: String,
    pub avatar: String,
}

/// JSON shape of a post on the API surface.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostResponse {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub slug: String,
    pub category: Category,
    pub tags: Vec<String>,
    pub status: PostStatus,
    pub author: AuthorInfo,
    pub views: i64,
    pub likes_count: i64,
    pub comments_count: i64,
    pub is_liked: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<PostRow> for PostResponse {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            content: row.content,
            slug: row.slug,
            category: row.category,
            tags: row.tags.0,
            status: row.status,
            author: AuthorInfo {
                id: row.author_id,
                name: row.author_name,
                avatar: row.author_avatar,
            },
            views: row.views,
            likes_count: row.likes_count,
            comments_count: row.comments_count,
            is_liked: row.is_liked,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// DTO for creating a post. The author is always the authenticated identity.
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePostRequest {
    #[validate(length(
        min = 1,
        max = 200,
        message = "Title length must be between 1 and 200 chars"
    ))]
    pub title: String,

    #[validate(length(
        min = 1,
        max = 50000,
        message = "Content length must be between 1 and 50000 chars"
    ))]
    pub content: String,

    pub category: Category,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Defaults to `published` when omitted.
    pub status: Option<PostStatus>,
}

/// DTO for editing a post. The slug is write-once and cannot be changed.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePostRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,

    #[validate(length(min = 1, max = 50000))]
    pub content: String,

    pub category: Category,

    #[serde(default)]
    pub tags: Vec<String>,

    pub status: Option<PostStatus>,
}

/// Query parameters for listing posts.
#[derive(Debug, Deserialize)]
pub struct PostListParams {
    pub category: Option<String>,
    pub tag: Option<String>,
    pub search: Option<String>,

    /// 'popular', 'mostLiked', 'mostCommented'; anything else means recency.
    pub sort: Option<String>,

    /// 1-based page index.
    pub page: Option<i64>,

    /// Page size (default 10, max 100).
    pub limit: Option<i64>,
}
