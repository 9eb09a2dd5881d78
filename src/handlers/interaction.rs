// src/handlers/interaction.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use sqlx::SqlitePool;

use crate::{error::AppError, utils::jwt::Claims};

/// Toggle Like on a post.
///
/// Idempotent per state: the delete/insert on the relation decides the
/// direction, and the counter moves by one in the same transaction, so the
/// counter can never drift from the set even under concurrent toggles.
pub async fn toggle_post_like(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(post_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id();

    let mut tx = pool.begin().await?;

    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM posts WHERE id = ?")
        .bind(post_id)
        .fetch_optional(&mut *tx)
        .await?;
    if exists.is_none() {
        return Err(AppError::NotFound("Post not found".to_string()));
    }

    let unliked = sqlx::query("DELETE FROM post_likes WHERE post_id = ? AND user_id = ?")
        .bind(post_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    let is_liked = if unliked > 0 {
        sqlx::query("UPDATE posts SET likes_count = MAX(0, likes_count - 1) WHERE id = ?")
            .bind(post_id)
            .execute(&mut *tx)
            .await?;
        false
    } else {
        let inserted = sqlx::query(
            "INSERT INTO post_likes (post_id, user_id, created_at) VALUES (?, ?, ?)
             ON CONFLICT (post_id, user_id) DO NOTHING",
        )
        .bind(post_id)
        .bind(user_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted > 0 {
            sqlx::query("UPDATE posts SET likes_count = likes_count + 1 WHERE id = ?")
                .bind(post_id)
                .execute(&mut *tx)
                .await?;
        }
        true
    };

    let likes_count: i64 = sqlx::query_scalar("SELECT likes_count FROM posts WHERE id = ?")
        .bind(post_id)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(Json(json!({
        "success": true,
        "likesCount": likes_count,
        "isLiked": is_liked,
    })))
}

/// Toggle Like on a comment. Same contract as the post toggle.
pub async fn toggle_comment_like(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(comment_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id();

    let mut tx = pool.begin().await?;

    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM comments WHERE id = ?")
        .bind(comment_id)
        .fetch_optional(&mut *tx)
        .await?;
    if exists.is_none() {
        return Err(AppError::NotFound("Comment not found".to_string()));
    }

    let unliked = sqlx::query("DELETE FROM comment_likes WHERE comment_id = ? AND user_id = ?")
        .bind(comment_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    let is_liked = if unliked > 0 {
        sqlx::query("UPDATE comments SET likes_count = MAX(0, likes_count - 1) WHERE id = ?")
            .bind(comment_id)
            .execute(&mut *tx)
            .await?;
        false
    } else {
        let inserted = sqlx::query(
            "INSERT INTO comment_likes (comment_id, user_id, created_at) VALUES (?, ?, ?)
             ON CONFLICT (comment_id, user_id) DO NOTHING",
        )
        .bind(comment_id)
        .bind(user_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted > 0 {
            sqlx::query("UPDATE comments SET likes_count = likes_count + 1 WHERE id = ?")
                .bind(comment_id)
                .execute(&mut *tx)
                .await?;
        }
        true
    };

    let likes_count: i64 = sqlx::query_scalar("SELECT likes_count FROM comments WHERE id = ?")
        .bind(comment_id)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(Json(json!({
        "success": true,
        "likesCount": likes_count,
        "isLiked": is_liked,
    })))
}
