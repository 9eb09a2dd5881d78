// src/routes.rs

use axum::{
    Router, http::Method, middleware,
    routing::{delete, get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, auth, comments, interaction, posts, profile},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware, optional_auth_middleware},
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, posts, comments, users, admin).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (Database Pool + Config).
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let require_auth = middleware::from_fn_with_state(state.clone(), auth_middleware);
    let optional_auth = middleware::from_fn_with_state(state.clone(), optional_auth_middleware);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    // Public reads carry optional auth so `isLiked` reflects the viewer.
    let post_reads = Router::new()
        .route("/", get(posts::list_posts))
        .route("/{id}", get(posts::get_post))
        .route("/{id}/comments", get(comments::list_comments))
        .route("/{id}/stats", get(posts::get_stats))
        .layer(optional_auth);

    let post_writes = Router::new()
        .route("/", post(posts::create_post))
        .route("/{id}", put(posts::update_post).delete(posts::delete_post))
        .route("/{id}/like", post(interaction::toggle_post_like))
        .route("/{id}/comments", post(comments::create_comment))
        .layer(require_auth.clone());

    let comment_routes = Router::new()
        .route("/{id}", delete(comments::delete_comment))
        .route("/{id}/like", post(interaction::toggle_comment_like))
        .layer(require_auth.clone());

    let user_routes = Router::new()
        .route(
            "/me",
            get(profile::get_me)
                .put(profile::update_profile)
                .delete(profile::delete_account),
        )
        .route("/me/password", put(profile::change_password))
        .route("/me/posts", get(profile::list_my_posts))
        .layer(require_auth.clone());

    let admin_routes = Router::new()
        .route("/users", get(admin::list_users))
        .route("/users/{id}", delete(admin::delete_user))
        // Double middleware protection: Auth first, then Admin check.
        .layer(middleware::from_fn(admin_middleware))
        .layer(require_auth);

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/posts", post_reads.merge(post_writes))
        .nest("/api/comments", comment_routes)
        .nest("/api/users", user_routes)
        .nest("/api/admin", admin_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
