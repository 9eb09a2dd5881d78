// src/handlers/profile.rs

use axum::{
    Extension, Json,
    extract::State,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::SqlitePool;
use std::collections::HashMap;
use validator::Validate;

use crate::{
    error::AppError,
    handlers::posts::POST_SELECT,
    models::{
        post::{PostResponse, PostRow},
        user::{ChangePasswordRequest, MeResponse, UpdateProfileRequest, User, UserResponse},
    },
    utils::{
        hash::{hash_password, verify_password},
        jwt::Claims,
    },
};

async fn fetch_user(pool: &SqlitePool, user_id: i64) -> Result<User, AppError> {
    sqlx::query_as::<_, User>(
        "SELECT id, name, username, email, password, avatar, bio, role, created_at FROM users WHERE id = ?",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("User not found".to_string()))
}

/// Get the current user's profile and statistics.
pub async fn get_me(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id();
    let user = fetch_user(&pool, user_id).await?;

    let posts_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE author_id = ?")
        .bind(user_id)
        .fetch_one(&pool)
        .await?;

    let total_likes_received: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM post_likes pl
        JOIN posts p ON pl.post_id = p.id
        WHERE p.author_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_one(&pool)
    .await?;

    Ok(Json(MeResponse {
        success: true,
        user: UserResponse::from(user),
        posts_count,
        total_likes_received,
    }))
}

/// Update the current user's profile (name, email, bio, avatar).
/// The email stays globally unique.
pub async fn update_profile(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user_id = claims.user_id();
    let email = payload.email.trim().to_lowercase();

    let taken: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE email = ? AND id <> ?")
        .bind(&email)
        .bind(user_id)
        .fetch_optional(&pool)
        .await?;
    if taken.is_some() {
        return Err(AppError::Conflict("Email already in use".to_string()));
    }

    sqlx::query(
        "UPDATE users SET name = ?, email = ?, bio = ?, avatar = COALESCE(?, avatar) WHERE id = ?",
    )
    .bind(payload.name.trim())
    .bind(&email)
    .bind(payload.bio.trim())
    .bind(payload.avatar)
    .bind(user_id)
    .execute(&pool)
    .await?;

    Ok(Json(json!({ "success": true, "message": "Profile updated" })))
}

/// Change the current user's password.
/// The hash is recomputed only here; profile edits never touch it.
pub async fn change_password(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user_id = claims.user_id();
    let user = fetch_user(&pool, user_id).await?;

    if !verify_password(&payload.current, &user.password)? {
        return Err(AppError::BadRequest(
            "Current password is incorrect".to_string(),
        ));
    }

    let hashed = hash_password(&payload.password)?;
    sqlx::query("UPDATE users SET password = ? WHERE id = ?")
        .bind(&hashed)
        .bind(user_id)
        .execute(&pool)
        .await?;

    Ok(Json(json!({ "success": true, "message": "Password updated" })))
}

/// List the current user's posts, drafts included, newest first.
pub async fn list_my_posts(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let rows = sqlx::query_as::<_, PostRow>(&format!(
        r#"
        {POST_SELECT}
        FROM posts p
        JOIN users u ON u.id = p.author_id
        WHERE p.author_id = ?
        ORDER BY p.created_at DESC, p.id DESC
        "#
    ))
    .bind(claims.user_id())
    .fetch_all(&pool)
    .await?;

    let posts: Vec<PostResponse> = rows.into_iter().map(PostResponse::from).collect();

    Ok(Json(json!({ "success": true, "posts": posts })))
}

/// Delete the current user's account and everything attached to it.
pub async fn delete_account(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id();

    // Existence check so a replayed token gets a 404, not a silent no-op.
    fetch_user(&pool, user_id).await?;
    purge_user(&pool, user_id).await?;

    Ok(Json(json!({ "success": true, "message": "Account deleted" })))
}

/// Removes a user and cascades through everything they touched, keeping every
/// denormalized counter in step with its backing relation. One transaction:
/// either the whole account disappears or none of it does.
///
/// Order matters: likes first (simple decrements), then comments (per-post
/// decrements, replies riding along with the user's top-level comments), then
/// the user's own posts with their full comment trees, then the user row.
pub(crate) async fn purge_user(pool: &SqlitePool, user_id: i64) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;

    // Likes this user placed on posts.
    let liked_posts: Vec<i64> = sqlx::query_scalar("SELECT post_id FROM post_likes WHERE user_id = ?")
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM post_likes WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
    for post_id in liked_posts {
        sqlx::query("UPDATE posts SET likes_count = MAX(0, likes_count - 1) WHERE id = ?")
            .bind(post_id)
            .execute(&mut *tx)
            .await?;
    }

    // Likes this user placed on comments.
    let liked_comments: Vec<i64> =
        sqlx::query_scalar("SELECT comment_id FROM comment_likes WHERE user_id = ?")
            .bind(user_id)
            .fetch_all(&mut *tx)
            .await?;
    sqlx::query("DELETE FROM comment_likes WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
    for comment_id in liked_comments {
        sqlx::query("UPDATE comments SET likes_count = MAX(0, likes_count - 1) WHERE id = ?")
            .bind(comment_id)
            .execute(&mut *tx)
            .await?;
    }

    // Comments this user authored, plus other users' replies hanging off the
    // user's top-level comments.
    let authored: Vec<(i64, i64, Option<i64>)> =
        sqlx::query_as("SELECT id, post_id, parent_id FROM comments WHERE author_id = ?")
            .bind(user_id)
            .fetch_all(&mut *tx)
            .await?;

    let mut removed_per_post: HashMap<i64, i64> = HashMap::new();
    let mut doomed_ids: Vec<i64> = Vec::new();
    let mut top_level_ids: Vec<i64> = Vec::new();

    for (id, post_id, parent_id) in &authored {
        *removed_per_post.entry(*post_id).or_insert(0) += 1;
        doomed_ids.push(*id);
        if parent_id.is_none() {
            top_level_ids.push(*id);
        }
    }

    for top_id in &top_level_ids {
        let replies: Vec<(i64, i64)> = sqlx::query_as(
            "SELECT id, post_id FROM comments WHERE parent_id = ? AND author_id <> ?",
        )
        .bind(top_id)
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await?;
        for (id, post_id) in replies {
            *removed_per_post.entry(post_id).or_insert(0) += 1;
            doomed_ids.push(id);
        }
    }

    for id in &doomed_ids {
        sqlx::query("DELETE FROM comment_likes WHERE comment_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
    }
    for top_id in &top_level_ids {
        sqlx::query("DELETE FROM comments WHERE parent_id = ?")
            .bind(top_id)
            .execute(&mut *tx)
            .await?;
    }
    sqlx::query("DELETE FROM comments WHERE author_id = ?")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
    for (post_id, removed) in removed_per_post {
        sqlx::query("UPDATE posts SET comments_count = MAX(0, comments_count - ?) WHERE id = ?")
            .bind(removed)
            .bind(post_id)
            .execute(&mut *tx)
            .await?;
    }

    // The user's own posts and their full comment trees.
    let own_posts: Vec<i64> = sqlx::query_scalar("SELECT id FROM posts WHERE author_id = ?")
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await?;
    for post_id in own_posts {
        sqlx::query(
            "DELETE FROM comment_likes WHERE comment_id IN (SELECT id FROM comments WHERE post_id = ?)",
        )
        .bind(post_id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM comments WHERE post_id = ?")
            .bind(post_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM post_likes WHERE post_id = ?")
            .bind(post_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(post_id)
            .execute(&mut *tx)
            .await?;
    }

    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}
