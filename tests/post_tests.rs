// tests/post_tests.rs

use bloghub::{config::Config, routes, state::AppState};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

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
        jwt_secret: "post_test_secret".to_string(),
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

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (address, pool)
}

/// Registers a fresh user and returns (token, user id).
async fn register_user(client: &reqwest::Client, address: &str) -> (String, i64) {
    let username = format!("u_{}", &uuid::Uuid::new_v4().simple().to_string()[..10]);
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
        .expect("Failed to register");
    assert_eq!(response.status().as_u16(), 201);

    let body: serde_json::Value = response.json().await.unwrap();
    (
        body["token"].as_str().unwrap().to_string(),
        body["user"]["id"].as_i64().unwrap(),
    )
}

async fn create_post(
    client: &reqwest::Client,
    address: &str,
    token: &str,
    payload: serde_json::Value,
) -> serde_json::Value {
    let response = client
        .post(format!("{}/api/posts", address))
        .bearer_auth(token)
        .json(&payload)
        .send()
        .await
        .expect("Failed to create post");
    assert_eq!(response.status().as_u16(), 201);
    let body: serde_json::Value = response.json().await.unwrap();
    body["post"].clone()
}

#[tokio::test]
async fn create_post_generates_slug_and_defaults_to_published() {
    let (address, _pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let (token, user_id) = register_user(&client, &address).await;

    let post = create_post(
        &client,
        &address,
        &token,
        serde_json::json!({ "title": "A", "content": "B", "category": "Technology" }),
    )
    .await;

    assert!(!post["slug"].as_str().unwrap().is_empty());
    assert_eq!(post["status"], "published");
    assert_eq!(post["category"], "Technology");
    assert_eq!(post["author"]["id"].as_i64().unwrap(), user_id);
    assert_eq!(post["views"], 0);
    assert_eq!(post["likesCount"], 0);
    assert_eq!(post["commentsCount"], 0);
}

#[tokio::test]
async fn create_post_requires_auth_and_valid_fields() {
    let (address, _pool) = spawn_app().await;
    let client = reqwest::Client::new();

    let anonymous = client
        .post(format!("{}/api/posts", address))
        .json(&serde_json::json!({ "title": "A", "content": "B", "category": "Technology" }))
        .send()
        .await
        .unwrap();
    assert_eq!(anonymous.status().as_u16(), 401);

    let (token, _) = register_user(&client, &address).await;
    let empty_title = client
        .post(format!("{}/api/posts", address))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "title": "", "content": "B", "category": "Technology" }))
        .send()
        .await
        .unwrap();
    assert_eq!(empty_title.status().as_u16(), 400);
}

#[tokio::test]
async fn listing_supports_filters_search_and_pagination() {
    let (address, _pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let (token, _) = register_user(&client, &address).await;

    create_post(
        &client,
        &address,
        &token,
        serde_json::json!({
            "title": "Async Xylophone Patterns",
            "content": "Systems content",
            "category": "Technology",
            "tags": ["rust", "async"]
        }),
    )
    .await;
    create_post(
        &client,
        &address,
        &token,
        serde_json::json!({
            "title": "Street Food Diaries",
            "content": "Travel content",
            "category": "Travel",
            "tags": ["asia"]
        }),
    )
    .await;
    create_post(
        &client,
        &address,
        &token,
        serde_json::json!({
            "title": "Unfinished Draft",
            "content": "Hidden",
            "category": "Technology",
            "status": "draft"
        }),
    )
    .await;

    // Drafts never appear in public listings.
    let all: serde_json::Value = client
        .get(format!("{}/api/posts", address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(all["posts"].as_array().unwrap().len(), 2);
    assert_eq!(all["totalPages"], 1);
    assert_eq!(all["currentPage"], 1);

    let tech: serde_json::Value = client
        .get(format!("{}/api/posts?category=Technology", address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(tech["posts"].as_array().unwrap().len(), 1);
    assert_eq!(tech["posts"][0]["category"], "Technology");

    let tagged: serde_json::Value = client
        .get(format!("{}/api/posts?tag=asia", address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(tagged["posts"].as_array().unwrap().len(), 1);
    assert_eq!(tagged["posts"][0]["title"], "Street Food Diaries");

    // Substring search is case-insensitive across title and body.
    let searched: serde_json::Value = client
        .get(format!("{}/api/posts?search=XYLOPHONE", address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(searched["posts"].as_array().unwrap().len(), 1);

    let paged: serde_json::Value = client
        .get(format!("{}/api/posts?limit=1&page=2", address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(paged["posts"].as_array().unwrap().len(), 1);
    assert_eq!(paged["totalPages"], 2);
    assert_eq!(paged["currentPage"], 2);
}

#[tokio::test]
async fn fetching_a_post_counts_exactly_one_view_per_fetch() {
    let (address, _pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let (token, _) = register_user(&client, &address).await;

    let post = create_post(
        &client,
        &address,
        &token,
        serde_json::json!({ "title": "Views", "content": "Body", "category": "Other" }),
    )
    .await;
    let id = post["id"].as_i64().unwrap();

    let first: serde_json::Value = client
        .get(format!("{}/api/posts/{}", address, id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(first["post"]["views"], 1);

    let second: serde_json::Value = client
        .get(format!("{}/api/posts/{}", address, id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(second["post"]["views"], 2);

    let stats: serde_json::Value = client
        .get(format!("{}/api/posts/{}/stats", address, id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["stats"]["views"], 2);
}

#[tokio::test]
async fn drafts_are_hidden_from_other_viewers() {
    let (address, _pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let (author_token, _) = register_user(&client, &address).await;
    let (other_token, _) = register_user(&client, &address).await;

    let draft = create_post(
        &client,
        &address,
        &author_token,
        serde_json::json!({
            "title": "Secret Draft",
            "content": "wip",
            "category": "Other",
            "status": "draft"
        }),
    )
    .await;
    let id = draft["id"].as_i64().unwrap();

    let by_author = client
        .get(format!("{}/api/posts/{}", address, id))
        .bearer_auth(&author_token)
        .send()
        .await
        .unwrap();
    assert_eq!(by_author.status().as_u16(), 200);
    let body: serde_json::Value = by_author.json().await.unwrap();
    // Draft fetches never count views.
    assert_eq!(body["post"]["views"], 0);

    let by_other = client
        .get(format!("{}/api/posts/{}", address, id))
        .bearer_auth(&other_token)
        .send()
        .await
        .unwrap();
    assert_eq!(by_other.status().as_u16(), 404);

    let anonymous = client
        .get(format!("{}/api/posts/{}", address, id))
        .send()
        .await
        .unwrap();
    assert_eq!(anonymous.status().as_u16(), 404);
}

#[tokio::test]
async fn edits_are_limited_to_author_or_admin() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let (author_token, _) = register_user(&client, &address).await;
    let (other_token, _) = register_user(&client, &address).await;

    let post = create_post(
        &client,
        &address,
        &author_token,
        serde_json::json!({ "title": "Original", "content": "Body", "category": "Other" }),
    )
    .await;
    let id = post["id"].as_i64().unwrap();

    let forbidden = client
        .put(format!("{}/api/posts/{}", address, id))
        .bearer_auth(&other_token)
        .json(&serde_json::json!({ "title": "Hijacked", "content": "x", "category": "Other" }))
        .send()
        .await
        .unwrap();
    assert_eq!(forbidden.status().as_u16(), 403);

    let title: String = sqlx::query_scalar("SELECT title FROM posts WHERE id = ?")
        .bind(id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(title, "Original");

    let allowed = client
        .put(format!("{}/api/posts/{}", address, id))
        .bearer_auth(&author_token)
        .json(&serde_json::json!({ "title": "Renamed", "content": "x", "category": "Other" }))
        .send()
        .await
        .unwrap();
    assert_eq!(allowed.status().as_u16(), 200);
    let body: serde_json::Value = allowed.json().await.unwrap();
    assert_eq!(body["post"]["title"], "Renamed");
    // Slugs are write-once.
    assert_eq!(body["post"]["slug"], post["slug"]);
}

#[tokio::test]
async fn deleting_a_post_cascades_to_its_comments() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let (token, _) = register_user(&client, &address).await;

    let post = create_post(
        &client,
        &address,
        &token,
        serde_json::json!({ "title": "Doomed", "content": "Body", "category": "Other" }),
    )
    .await;
    let id = post["id"].as_i64().unwrap();

    let comment: serde_json::Value = client
        .post(format!("{}/api/posts/{}/comments", address, id))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "content": "top" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let top_id = comment["comment"]["id"].as_i64().unwrap();

    client
        .post(format!("{}/api/posts/{}/comments", address, id))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "content": "reply", "parent_id": top_id }))
        .send()
        .await
        .unwrap();

    let deleted = client
        .delete(format!("{}/api/posts/{}", address, id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status().as_u16(), 200);

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE post_id = ?")
        .bind(id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(remaining, 0);

    let gone = client
        .get(format!("{}/api/posts/{}", address, id))
        .send()
        .await
        .unwrap();
    assert_eq!(gone.status().as_u16(), 404);
}

#[tokio::test]
async fn like_toggle_alternates_and_counter_matches_the_set() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let (author_token, _) = register_user(&client, &address).await;
    let (liker_token, _) = register_user(&client, &address).await;

    let post = create_post(
        &client,
        &address,
        &author_token,
        serde_json::json!({ "title": "Likeable", "content": "Body", "category": "Other" }),
    )
    .await;
    let id = post["id"].as_i64().unwrap();

    let first: serde_json::Value = client
        .post(format!("{}/api/posts/{}/like", address, id))
        .bearer_auth(&liker_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(first["likesCount"], 1);
    assert_eq!(first["isLiked"], true);

    let second: serde_json::Value = client
        .post(format!("{}/api/posts/{}/like", address, id))
        .bearer_auth(&liker_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(second["likesCount"], 0);
    assert_eq!(second["isLiked"], false);

    let set_size: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM post_likes WHERE post_id = ?")
        .bind(id)
        .fetch_one(&pool)
        .await
        .unwrap();
    let counter: i64 = sqlx::query_scalar("SELECT likes_count FROM posts WHERE id = ?")
        .bind(id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(set_size, 0);
    assert_eq!(counter, 0);
}

#[tokio::test]
async fn concurrent_likes_never_desync_the_counter() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let (author_token, _) = register_user(&client, &address).await;

    let post = create_post(
        &client,
        &address,
        &author_token,
        serde_json::json!({ "title": "Popular", "content": "Body", "category": "Other" }),
    )
    .await;
    let id = post["id"].as_i64().unwrap();

    let mut tokens = Vec::new();
    for _ in 0..8 {
        let (token, _) = register_user(&client, &address).await;
        tokens.push(token);
    }

    let mut handles = Vec::new();
    for token in &tokens {
        let client = client.clone();
        let url = format!("{}/api/posts/{}/like", address, id);
        let token = token.clone();
        handles.push(tokio::spawn(async move {
            let response = client.post(url).bearer_auth(token).send().await.unwrap();
            assert_eq!(response.status().as_u16(), 200);
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let set_size: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM post_likes WHERE post_id = ?")
        .bind(id)
        .fetch_one(&pool)
        .await
        .unwrap();
    let counter: i64 = sqlx::query_scalar("SELECT likes_count FROM posts WHERE id = ?")
        .bind(id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(set_size, 8);
    assert_eq!(counter, 8);

    // A second concurrent round unwinds every like.
    let mut handles = Vec::new();
    for token in &tokens {
        let client = client.clone();
        let url = format!("{}/api/posts/{}/like", address, id);
        let token = token.clone();
        handles.push(tokio::spawn(async move {
            client.post(url).bearer_auth(token).send().await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let counter: i64 = sqlx::query_scalar("SELECT likes_count FROM posts WHERE id = ?")
        .bind(id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(counter, 0);
}
