// src/handlers/posts.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use sqlx::{QueryBuilder, Sqlite, SqlitePool, types::Json as SqlJson};
use validator::Validate;

use crate::{
    error::AppError,
    models::post::{
        CreatePostRequest, PostListParams, PostResponse, PostRow, PostStatus, UpdatePostRequest,
    },
    utils::{
        html::clean_html,
        jwt::{Claims, OptionalClaims},
        slug::slugify,
    },
};

pub(crate) const POST_SELECT: &str = r#"
    SELECT p.id, p.author_id, u.name AS author_name, u.avatar AS author_avatar,
           p.title, p.content, p.slug, p.category, p.tags, p.status, p.views,
           p.likes_count, p.comments_count, p.created_at, p.updated_at
"#;

/// Fetches a single post joined with its author, with `is_liked` resolved
/// for the given viewer (0 = anonymous, matches nothing).
pub(crate) async fn fetch_post_row(
    pool: &SqlitePool,
    post_id: i64,
    viewer_id: i64,
) -> Result<Option<PostRow>, AppError> {
    let row = sqlx::query_as::<_, PostRow>(&format!(
        r#"
        {POST_SELECT},
               EXISTS(
                   SELECT 1 FROM post_likes pl
                   WHERE pl.post_id = p.id AND pl.user_id = ?
               ) AS is_liked
        FROM posts p
        JOIN users u ON u.id = p.author_id
        WHERE p.id = ?
        "#
    ))
    .bind(viewer_id)
    .bind(post_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

fn normalized_tags(tags: &[String]) -> Vec<String> {
    tags.iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Create a new post.
///
/// The author is forced to the authenticated identity, the slug is derived
/// from the title, and the body is sanitized before it is stored.
pub async fn create_post(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user_id = claims.user_id();
    let status = payload.status.unwrap_or(PostStatus::Published);
    let slug = slugify(&payload.title);
    let now = Utc::now();

    let post_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO posts (author_id, title, content, slug, category, tags, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(payload.title.trim())
    .bind(clean_html(&payload.content))
    .bind(&slug)
    .bind(payload.category)
    .bind(SqlJson(normalized_tags(&payload.tags)))
    .bind(status)
    .bind(now)
    .bind(now)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create post: {:?}", e);
        AppError::from(e)
    })?;

    let row = fetch_post_row(&pool, post_id, user_id)
        .await?
        .ok_or(AppError::Internal("Post vanished after insert".to_string()))?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "post": PostResponse::from(row) })),
    ))
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, params: &PostListParams) {
    qb.push(" WHERE p.status = 'published'");

    if let Some(category) = params.category.as_deref().filter(|c| !c.is_empty()) {
        qb.push(" AND p.category = ").push_bind(category.to_string());
    }

    if let Some(tag) = params.tag.as_deref().filter(|t| !t.is_empty()) {
        qb.push(" AND EXISTS (SELECT 1 FROM json_each(p.tags) WHERE json_each.value = ")
            .push_bind(tag.to_string())
            .push(")");
    }

    if let Some(search) = params.search.as_deref().filter(|s| !s.is_empty()) {
        // Escape LIKE metacharacters so a literal '%' in the query
        // does not match everything.
        let escaped = search
            .to_lowercase()
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        let pattern = format!("%{}%", escaped);
        qb.push(" AND (lower(p.title) LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR lower(p.content) LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
}

/// List published posts.
///
/// Supports filter by category and tag, case-insensitive substring search
/// over title and body, sorting by recency or engagement, and page/limit pagination
/// with a total-page count.
pub async fn list_posts(
    State(pool): State<SqlitePool>,
    Query(params): Query<PostListParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(10).clamp(1, 100);
    let offset = (page - 1) * limit;

    let mut count_qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM posts p");
    push_filters(&mut count_qb, &params);
    let total: i64 = count_qb.build_query_scalar().fetch_one(&pool).await?;

    let order = match params.sort.as_deref() {
        Some("popular") => "p.views DESC",
        Some("mostLiked") => "p.likes_count DESC",
        Some("mostCommented") => "p.comments_count DESC",
        _ => "p.created_at DESC",
    };

    let mut qb = QueryBuilder::<Sqlite>::new(format!(
        "{POST_SELECT} FROM posts p JOIN users u ON u.id = p.author_id"
    ));
    push_filters(&mut qb, &params);
    qb.push(" ORDER BY ")
        .push(order)
        .push(", p.id DESC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);

    let rows: Vec<PostRow> = qb.build_query_as().fetch_all(&pool).await?;
    let posts: Vec<PostResponse> = rows.into_iter().map(PostResponse::from).collect();

    Ok(Json(json!({
        "success": true,
        "posts": posts,
        "totalPages": (total + limit - 1) / limit,
        "currentPage": page,
    })))
}

/// Get a single post by ID.
///
/// Each fetch of a published post counts exactly one view; the increment is
/// a single atomic statement, so concurrent fetches never lose counts.
/// Drafts are visible only to their author or an admin.
pub async fn get_post(
    State(pool): State<SqlitePool>,
    OptionalClaims(claims): OptionalClaims,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    sqlx::query("UPDATE posts SET views = views + 1 WHERE id = ? AND status = 'published'")
        .bind(id)
        .execute(&pool)
        .await?;

    let viewer_id = claims.as_ref().map(|c| c.user_id()).unwrap_or(0);
    let row = fetch_post_row(&pool, id, viewer_id)
        .await?
        .ok_or(AppError::NotFound("Post not found".to_string()))?;

    if row.status == PostStatus::Draft {
        let allowed = claims
            .as_ref()
            .is_some_and(|c| c.user_id() == row.author_id || c.is_admin());
        if !allowed {
            return Err(AppError::NotFound("Post not found".to_string()));
        }
    }

    Ok(Json(json!({ "success": true, "post": PostResponse::from(row) })))
}

/// Update a post.
/// Requires: Login + (Author OR Admin). The slug never changes.
pub async fn update_post(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdatePostRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let author_id: i64 = sqlx::query_scalar("SELECT author_id FROM posts WHERE id = ?")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Post not found".to_string()))?;

    if author_id != claims.user_id() && !claims.is_admin() {
        return Err(AppError::Forbidden(
            "You are not authorized to edit this post".to_string(),
        ));
    }

    let mut qb = QueryBuilder::<Sqlite>::new("UPDATE posts SET title = ");
    qb.push_bind(payload.title.trim().to_string())
        .push(", content = ")
        .push_bind(clean_html(&payload.content))
        .push(", category = ")
        .push_bind(payload.category)
        .push(", tags = ")
        .push_bind(SqlJson(normalized_tags(&payload.tags)))
        .push(", updated_at = ")
        .push_bind(Utc::now());
    if let Some(status) = payload.status {
        qb.push(", status = ").push_bind(status);
    }
    qb.push(" WHERE id = ").push_bind(id);
    qb.build().execute(&pool).await?;

    let row = fetch_post_row(&pool, id, claims.user_id())
        .await?
        .ok_or(AppError::NotFound("Post not found".to_string()))?;

    Ok(Json(json!({ "success": true, "post": PostResponse::from(row) })))
}

/// Delete a post.
/// Requires: Login + (Author OR Admin).
///
/// All attached comments (replies included) and like relations go in the
/// same transaction, so no orphaned rows survive a crash mid-delete.
pub async fn delete_post(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;

    let author_id: i64 = sqlx::query_scalar("SELECT author_id FROM posts WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("Post not found".to_string()))?;

    if author_id != claims.user_id() && !claims.is_admin() {
        return Err(AppError::Forbidden(
            "You are not authorized to delete this post".to_string(),
        ));
    }

    sqlx::query(
        "DELETE FROM comment_likes WHERE comment_id IN (SELECT id FROM comments WHERE post_id = ?)",
    )
    .bind(id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM comments WHERE post_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM post_likes WHERE post_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM posts WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(Json(json!({ "success": true, "message": "Post deleted" })))
}

/// Engagement counters for a post.
pub async fn get_stats(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let row: Option<(i64, i64, i64)> = sqlx::query_as(
        "SELECT views, likes_count, comments_count FROM posts WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&pool)
    .await?;

    let (views, likes, comments) = row.ok_or(AppError::NotFound("Post not found".to_string()))?;

    Ok(Json(json!({
        "success": true,
        "stats": { "views": views, "likes": likes, "comments": comments },
    })))
}
