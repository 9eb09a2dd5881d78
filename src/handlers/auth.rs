// src/handlers/auth.rs

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use serde_json::json;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::user::{LoginRequest, RegisterRequest, User, UserResponse},
    utils::{
        hash::{hash_password, verify_password},
        jwt::sign_jwt,
    },
};

/// Registers a new user and signs them in.
///
/// The password is hashed with Argon2 before storage; the response carries a
/// bearer token plus the public user payload, never the hash. A duplicate
/// username or email is a conflict and creates no account.
pub async fn register(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let hashed_password = hash_password(&payload.password)?;

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (name, username, email, password, created_at)
        VALUES (?, ?, ?, ?, ?)
        RETURNING id, name, username, email, password, avatar, bio, role, created_at
        "#,
    )
    .bind(payload.name.trim())
    .bind(payload.username.trim())
    .bind(payload.email.trim().to_lowercase())
    .bind(&hashed_password)
    .bind(Utc::now())
    .fetch_one(&pool)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            let field = if db.message().contains("users.email") {
                "Email"
            } else {
                "Username"
            };
            AppError::Conflict(format!("{} already in use", field))
        }
        _ => {
            tracing::error!("Failed to register user: {:?}", e);
            AppError::from(e)
        }
    })?;

    let token = sign_jwt(&user, &config.jwt_secret, config.jwt_expiration)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "token": token,
            "type": "Bearer",
            "user": UserResponse::from(user),
        })),
    ))
}

/// Authenticates a user by email and returns a JWT token.
///
/// A missing account and a wrong password produce the same error, so the
/// response never reveals which half of the credential failed.
pub async fn login(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, name, username, email, password, avatar, bio, role, created_at
        FROM users
        WHERE email = ?
        "#,
    )
    .bind(payload.email.trim().to_lowercase())
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Login DB error: {:?}", e);
        AppError::Internal(e.to_string())
    })?;

    let user = user.ok_or(AppError::Auth("Invalid credentials".to_string()))?;

    if !verify_password(&payload.password, &user.password)? {
        return Err(AppError::Auth("Invalid credentials".to_string()));
    }

    let token = sign_jwt(&user, &config.jwt_secret, config.jwt_expiration)?;

    Ok(Json(json!({
        "success": true,
        "token": token,
        "type": "Bearer",
        "user": UserResponse::from(user),
    })))
}
