// tests/auth_tests.rs

use bloghub::{config::Config, routes, state::AppState};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

/// Spawns the app on a random port against a fresh in-memory database.
/// Returns the base URL and a pool handle for direct assertions.
async fn spawn_app() -> (String, SqlitePool) {
    let pool = SqlitePoolOptions::new()
        .min_connections(1)
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let config = Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        port: 0,
        admin_username: None,
        admin_email: None,
        admin_password: None,
    };

    let state = AppState {
        pool: pool.clone(),
        config,
    };
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (address, pool)
}

fn unique_username() -> String {
    format!("u_{}", &uuid::Uuid::new_v4().simple().to_string()[..10])
}

#[tokio::test]
async fn register_returns_token_and_user() {
    let (address, _pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let username = unique_username();

    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "name": "Test User",
            "username": username,
            "email": format!("{}@example.com", username),
            "password": "password123"
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 201);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert!(!body["token"].as_str().unwrap().is_empty());
    assert_eq!(body["type"], "Bearer");
    assert_eq!(body["user"]["username"], username.as_str());
    assert_eq!(body["user"]["role"], "user");
    // The hash must never appear in any response.
    assert!(body["user"].get("password").is_none());
}

#[tokio::test]
async fn register_duplicate_email_is_conflict_and_creates_no_account() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let email = format!("{}@example.com", unique_username());

    let first = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "name": "First",
            "username": unique_username(),
            "email": email,
            "password": "password123"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(first.status().as_u16(), 201);

    let second = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "name": "Second",
            "username": unique_username(),
            "email": email,
            "password": "password123"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(second.status().as_u16(), 409);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ?")
        .bind(&email)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn register_rejects_invalid_username() {
    let (address, _pool) = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "name": "Bad",
            "username": "no spaces!",
            "email": "bad@example.com",
            "password": "password123"
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert!(body["fields"].get("username").is_some());
}

#[tokio::test]
async fn login_works_and_rejects_wrong_password() {
    let (address, _pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let username = unique_username();
    let email = format!("{}@example.com", username);

    client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "name": "Login User",
            "username": username,
            "email": email,
            "password": "password123"
        }))
        .send()
        .await
        .unwrap();

    let good = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({ "email": email, "password": "password123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(good.status().as_u16(), 200);
    let body: serde_json::Value = good.json().await.unwrap();
    assert!(!body["token"].as_str().unwrap().is_empty());

    let bad = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({ "email": email, "password": "wrong-password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(bad.status().as_u16(), 401);
}

#[tokio::test]
async fn protected_routes_require_a_valid_token() {
    let (address, _pool) = spawn_app().await;
    let client = reqwest::Client::new();

    let missing = client
        .get(format!("{}/api/users/me", address))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status().as_u16(), 401);

    let garbage = client
        .get(format!("{}/api/users/me", address))
        .header("Authorization", "Bearer not-a-real-token")
        .send()
        .await
        .unwrap();
    assert_eq!(garbage.status().as_u16(), 401);
}
