// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde_json::json;
use sqlx::SqlitePool;

use crate::{error::AppError, handlers::profile::purge_user, models::user::AdminUserRow};

/// List all accounts with their post counts.
pub async fn list_users(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let users = sqlx::query_as::<_, AdminUserRow>(
        r#"
        SELECT u.id, u.name, u.username, u.email, u.role, u.created_at,
               (SELECT COUNT(*) FROM posts WHERE author_id = u.id) AS posts_count
        FROM users u
        ORDER BY u.created_at DESC, u.id DESC
        "#,
    )
    .fetch_all(&pool)
    .await?;

    Ok(Json(json!({ "success": true, "users": users })))
}

/// Delete an account and cascade through its content, same as a
/// self-service deletion.
pub async fn delete_user(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(&pool)
        .await?;
    if exists.is_none() {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    purge_user(&pool, id).await?;

    Ok(Json(json!({ "success": true, "message": "User deleted" })))
}
