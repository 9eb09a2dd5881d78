// src/handlers/comments.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use sqlx::SqlitePool;
use std::collections::HashMap;
use validator::Validate;

use crate::{
    error::AppError,
    models::comment::{CommentResponse, CommentRow, CreateCommentRequest},
    utils::{html::clean_html, jwt::Claims},
};

const COMMENT_SELECT: &str = r#"
    SELECT c.id, c.post_id, c.author_id, u.name AS author_name, u.avatar AS author_avatar,
           c.parent_id, c.content, c.likes_count, c.created_at
    FROM comments c
    JOIN users u ON u.id = c.author_id
"#;

/// Create a comment on a post.
///
/// Nesting is capped at depth one: a reply must target a top-level comment on
/// the same post, anything else is rejected. The post's `comments_count` is
/// incremented in the same transaction as the insert.
pub async fn create_comment(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(post_id): Path<i64>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user_id = claims.user_id();
    let mut tx = pool.begin().await?;

    let post_exists: Option<i64> = sqlx::query_scalar("SELECT id FROM posts WHERE id = ?")
        .bind(post_id)
        .fetch_optional(&mut *tx)
        .await?;
    if post_exists.is_none() {
        return Err(AppError::NotFound("Post not found".to_string()));
    }

    if let Some(parent_id) = payload.parent_id {
        let parent: Option<(i64, Option<i64>)> =
            sqlx::query_as("SELECT post_id, parent_id FROM comments WHERE id = ?")
                .bind(parent_id)
                .fetch_optional(&mut *tx)
                .await?;

        let (parent_post, parent_parent) =
            parent.ok_or(AppError::NotFound("Parent comment not found".to_string()))?;

        if parent_post != post_id {
            return Err(AppError::BadRequest(
                "Parent comment belongs to a different post".to_string(),
            ));
        }
        if parent_parent.is_some() {
            return Err(AppError::BadRequest(
                "Replies can only target top-level comments".to_string(),
            ));
        }
    }

    let comment_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO comments (post_id, author_id, parent_id, content, created_at)
        VALUES (?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(post_id)
    .bind(user_id)
    .bind(payload.parent_id)
    .bind(clean_html(payload.content.trim()))
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("UPDATE posts SET comments_count = comments_count + 1 WHERE id = ?")
        .bind(post_id)
        .execute(&mut *tx)
        .await?;

    let row = sqlx::query_as::<_, CommentRow>(&format!("{COMMENT_SELECT} WHERE c.id = ?"))
        .bind(comment_id)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "comment": CommentResponse::from(row) })),
    ))
}

/// List a post's comments as a two-level tree.
///
/// Top-level comments come newest-first, each carrying its replies
/// oldest-first.
pub async fn list_comments(
    State(pool): State<SqlitePool>,
    Path(post_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let post_exists: Option<i64> = sqlx::query_scalar("SELECT id FROM posts WHERE id = ?")
        .bind(post_id)
        .fetch_optional(&pool)
        .await?;
    if post_exists.is_none() {
        return Err(AppError::NotFound("Post not found".to_string()));
    }

    let rows = sqlx::query_as::<_, CommentRow>(&format!(
        "{COMMENT_SELECT} WHERE c.post_id = ? ORDER BY c.created_at ASC, c.id ASC"
    ))
    .bind(post_id)
    .fetch_all(&pool)
    .await?;

    // Single pass: replies land under their parent already oldest-first,
    // top-level comments are reversed afterwards for newest-first order.
    let mut replies: HashMap<i64, Vec<CommentResponse>> = HashMap::new();
    let mut top_level: Vec<CommentResponse> = Vec::new();

    for row in rows {
        match row.parent_id {
            Some(parent_id) => replies
                .entry(parent_id)
                .or_default()
                .push(CommentResponse::from(row)),
            None => top_level.push(CommentResponse::from(row)),
        }
    }

    top_level.reverse();
    for comment in &mut top_level {
        if let Some(children) = replies.remove(&comment.id) {
            comment.replies = children;
        }
    }

    Ok(Json(json!({ "success": true, "comments": top_level })))
}

/// Delete a comment.
/// Requires: Login + (Author OR Admin).
///
/// A top-level comment takes all of its replies with it; either way the
/// post's `comments_count` drops by the exact number of rows removed, in one
/// transaction.
pub async fn delete_comment(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;

    let comment: Option<(i64, i64, Option<i64>)> =
        sqlx::query_as("SELECT post_id, author_id, parent_id FROM comments WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

    let (post_id, author_id, parent_id) =
        comment.ok_or(AppError::NotFound("Comment not found".to_string()))?;

    if author_id != claims.user_id() && !claims.is_admin() {
        return Err(AppError::Forbidden(
            "You are not authorized to delete this comment".to_string(),
        ));
    }

    let mut removed: i64 = 1;

    sqlx::query(
        "DELETE FROM comment_likes WHERE comment_id = ? OR comment_id IN (SELECT id FROM comments WHERE parent_id = ?)",
    )
    .bind(id)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    if parent_id.is_none() {
        let replies_deleted = sqlx::query("DELETE FROM comments WHERE parent_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        removed += replies_deleted as i64;
    }

    sqlx::query("DELETE FROM comments WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("UPDATE posts SET comments_count = MAX(0, comments_count - ?) WHERE id = ?")
        .bind(removed)
        .bind(post_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(Json(json!({ "success": true, "deleted": removed })))
}
