// tests/api_tests.rs

use std::path::PathBuf;

use community_backend::{
    config::{Config, StorageBackend},
    routes,
    state::AppState,
    storage::{Stores, flat::FlatFileStore, sql::SqlStore},
    utils::jwt::{Claims, TokenCodec},
};

const JWT_SECRET: &str = "test_secret_for_integration_tests";

struct TestApp {
    address: String,
    state: AppState,
}

fn test_config(storage: StorageBackend, proxy_dir: PathBuf) -> Config {
    Config {
        storage,
        data_dir: std::env::temp_dir().join(format!("community-api-{}", uuid::Uuid::new_v4())),
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: JWT_SECRET.to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
        founder_email: None,
        founder_password: None,
        proxy_dir,
        proxy_allowlist: vec!["feed.json".to_string()],
        bind_addr: "127.0.0.1:0".to_string(),
    }
}

/// Helper function to spawn the app on a random port for testing.
async fn spawn_app_with(storage: StorageBackend) -> TestApp {
    // 1. Proxy directory with one allowlisted and one hidden file
    let proxy_dir = std::env::temp_dir().join(format!("community-proxy-{}", uuid::Uuid::new_v4()));
    tokio::fs::create_dir_all(&proxy_dir).await.unwrap();
    tokio::fs::write(proxy_dir.join("feed.json"), r#"{"items":[]}"#)
        .await
        .unwrap();
    tokio::fs::write(proxy_dir.join("secret.txt"), "hidden")
        .await
        .unwrap();

    // 2. Open storage
    let config = test_config(storage, proxy_dir);
    let stores = match config.storage {
        StorageBackend::Json => Stores::flat(
            FlatFileStore::open(&config.data_dir)
                .await
                .expect("Failed to open flat-file store"),
        ),
        StorageBackend::Sqlite => Stores::sql(
            SqlStore::in_memory()
                .await
                .expect("Failed to open in-memory sqlite"),
        ),
    };

    // 3. Create state with a founder account
    let state = AppState::new(stores, config);
    state
        .auth
        .seed_founder("founder@example.com", "founder1", "Founder")
        .await
        .expect("Failed to seed founder");

    // 4. Bind to port 0 to get a random available port
    let app = routes::create_router(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    // 5. Spawn the server in the background
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp { address, state }
}

async fn spawn_app() -> TestApp {
    spawn_app_with(StorageBackend::Json).await
}

async fn register(client: &reqwest::Client, app: &TestApp, name: &str) -> (i64, String) {
    let resp = client
        .post(format!("{}/api/auth/register", app.address))
        .json(&serde_json::json!({
            "email": format!("{}@example.com", name),
            "password": "password123",
            "display_name": name,
        }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(resp.status().as_u16(), 201);

    let body: serde_json::Value = resp.json().await.unwrap();
    (
        body["user"]["id"].as_i64().unwrap(),
        body["token"].as_str().unwrap().to_string(),
    )
}

async fn login(client: &reqwest::Client, app: &TestApp, email: &str, password: &str) -> String {
    let body: serde_json::Value = client
        .post(format!("{}/api/auth/login", app.address))
        .json(&serde_json::json!({ "email": email, "password": password }))
        .send()
        .await
        .expect("Login failed")
        .json()
        .await
        .expect("Failed to parse login json");
    body["token"].as_str().expect("Token not found").to_string()
}

#[tokio::test]
async fn health_check_404() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/random_path_that_does_not_exist", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn register_and_verify_work() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let (id, token) = register(&client, &app, "alice").await;

    let response = client
        .get(format!("{}/api/auth/verify", app.address))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let user: serde_json::Value = response.json().await.unwrap();
    assert_eq!(user["id"], id);
    assert_eq!(user["email"], "alice@example.com");
    assert!(user.get("password").is_none());
}

#[tokio::test]
async fn register_fails_validation() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    // Empty display name
    let response = client
        .post(format!("{}/api/auth/register", app.address))
        .json(&serde_json::json!({
            "email": "bob@example.com",
            "password": "password123",
            "display_name": ""
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    // Weak password
    let response = client
        .post(format!("{}/api/auth/register", app.address))
        .json(&serde_json::json!({
            "email": "bob@example.com",
            "password": "123",
            "display_name": "Bob"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    // Duplicate email
    register(&client, &app, "carol").await;
    let response = client
        .post(format!("{}/api/auth/register", app.address))
        .json(&serde_json::json!({
            "email": "CAROL@example.com",
            "password": "password123",
            "display_name": "Carol"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);
}

#[tokio::test]
async fn login_errors_and_session_revocation() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let (_, first) = register(&client, &app, "dave").await;

    let wrong = client
        .post(format!("{}/api/auth/login", app.address))
        .json(&serde_json::json!({ "email": "dave@example.com", "password": "nope1234" }))
        .send()
        .await
        .unwrap();
    let unknown = client
        .post(format!("{}/api/auth/login", app.address))
        .json(&serde_json::json!({ "email": "ghost@example.com", "password": "password123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(wrong.status().as_u16(), 401);
    assert_eq!(unknown.status().as_u16(), 401);
    let wrong_body: serde_json::Value = wrong.json().await.unwrap();
    let unknown_body: serde_json::Value = unknown.json().await.unwrap();
    assert_eq!(wrong_body, unknown_body);

    let second = login(&client, &app, "dave@example.com", "password123").await;

    let stale = client
        .get(format!("{}/api/auth/verify", app.address))
        .bearer_auth(&first)
        .send()
        .await
        .unwrap();
    assert_eq!(stale.status().as_u16(), 401);
    let body: serde_json::Value = stale.json().await.unwrap();
    assert_eq!(body["error"], "Unauthorized");

    // Logout, then the current token is dead too
    let logout = client
        .post(format!("{}/api/auth/logout", app.address))
        .bearer_auth(&second)
        .send()
        .await
        .unwrap();
    assert_eq!(logout.status().as_u16(), 204);

    let after = client
        .get(format!("{}/api/auth/verify", app.address))
        .bearer_auth(&second)
        .send()
        .await
        .unwrap();
    assert_eq!(after.status().as_u16(), 401);
}

#[tokio::test]
async fn verify_hides_unknown_subjects() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    // Correctly signed, but for a user that does not exist
    let token = TokenCodec::new(JWT_SECRET)
        .encode(&Claims::new(9_999, None, 600))
        .unwrap();

    let response = client
        .get(format!("{}/api/auth/verify", app.address))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Unauthorized");
}

#[tokio::test]
async fn password_reset_and_change() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    register(&client, &app, "erin").await;

    let forgot = client
        .post(format!("{}/api/auth/password/forgot", app.address))
        .json(&serde_json::json!({ "email": "erin@example.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(forgot.status().as_u16(), 202);
    let body: serde_json::Value = forgot.json().await.unwrap();
    assert!(body.get("token").is_none());

    let unknown = client
        .post(format!("{}/api/auth/password/forgot", app.address))
        .json(&serde_json::json!({ "email": "nobody@example.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status().as_u16(), 404);

    // The token is only delivered out of band; fetch it through the service.
    let token = app
        .state
        .auth
        .request_password_reset("erin@example.com")
        .await
        .unwrap();

    let reset = client
        .post(format!("{}/api/auth/password/reset", app.address))
        .json(&serde_json::json!({ "token": token, "new_password": "reset-pass" }))
        .send()
        .await
        .unwrap();
    assert_eq!(reset.status().as_u16(), 204);

    let reused = client
        .post(format!("{}/api/auth/password/reset", app.address))
        .json(&serde_json::json!({ "token": token, "new_password": "reset-pass" }))
        .send()
        .await
        .unwrap();
    assert_eq!(reused.status().as_u16(), 400);

    let session = login(&client, &app, "erin@example.com", "reset-pass").await;
    let change = client
        .put(format!("{}/api/auth/password", app.address))
        .bearer_auth(&session)
        .json(&serde_json::json!({
            "current_password": "reset-pass",
            "new_password": "changed-pass"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(change.status().as_u16(), 204);
    login(&client, &app, "erin@example.com", "changed-pass").await;
}

#[tokio::test]
async fn article_like_comment_flow() {
    let app = spawn_app_with(StorageBackend::Sqlite).await;
    let client = reqwest::Client::new();
    let (_, author) = register(&client, &app, "fay").await;
    let (_, reader) = register(&client, &app, "gus").await;

    // Writing requires a token
    let anonymous = client
        .post(format!("{}/api/articles", app.address))
        .json(&serde_json::json!({ "title": "T", "content": "C" }))
        .send()
        .await
        .unwrap();
    assert_eq!(anonymous.status().as_u16(), 401);

    let created = client
        .post(format!("{}/api/articles", app.address))
        .bearer_auth(&author)
        .json(&serde_json::json!({
            "title": "Hello",
            "content": "<p>World</p>",
            "category": "News",
            "tags": ["intro"]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status().as_u16(), 201);
    let article_id = created.json::<serde_json::Value>().await.unwrap()["id"]
        .as_i64()
        .unwrap();

    let like: serde_json::Value = client
        .post(format!("{}/api/articles/{}/like", app.address, article_id))
        .bearer_auth(&reader)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(like["liked"], true);

    let comment = client
        .post(format!("{}/api/articles/{}/comments", app.address, article_id))
        .bearer_auth(&reader)
        .json(&serde_json::json!({ "content": "Great read" }))
        .send()
        .await
        .unwrap();
    assert_eq!(comment.status().as_u16(), 201);
    let comment_id = comment.json::<serde_json::Value>().await.unwrap()["id"]
        .as_i64()
        .unwrap();

    // Listing as the reader shows their like
    let list: Vec<serde_json::Value> = client
        .get(format!("{}/api/articles", app.address))
        .bearer_auth(&reader)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["likes_count"], 1);
    assert_eq!(list[0]["comments_count"], 1);
    assert_eq!(list[0]["liked"], true);
    assert_eq!(list[0]["category"], "News");

    // Anonymous listing never reports a like
    let list: Vec<serde_json::Value> = client
        .get(format!("{}/api/articles", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list[0]["liked"], false);

    // The author may not remove the reader's comment
    let refused: serde_json::Value = client
        .delete(format!("{}/api/comments/{}", app.address, comment_id))
        .bearer_auth(&author)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(refused["removed"], false);

    let removed: serde_json::Value = client
        .delete(format!("{}/api/comments/{}", app.address, comment_id))
        .bearer_auth(&reader)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(removed["removed"], true);

    // Author got two notifications
    let notes: Vec<serde_json::Value> = client
        .get(format!("{}/api/notifications", app.address))
        .bearer_auth(&author)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(notes.len(), 2);

    let read: serde_json::Value = client
        .post(format!("{}/api/notifications/read", app.address))
        .bearer_auth(&author)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(read["updated"], 2);

    let categories: Vec<serde_json::Value> = client
        .get(format!("{}/api/categories", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(categories[0]["name"], "News");

    // Only the author deletes
    let forbidden = client
        .delete(format!("{}/api/articles/{}", app.address, article_id))
        .bearer_auth(&reader)
        .send()
        .await
        .unwrap();
    assert_eq!(forbidden.status().as_u16(), 403);

    let deleted = client
        .delete(format!("{}/api/articles/{}", app.address, article_id))
        .bearer_auth(&author)
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status().as_u16(), 204);
}

#[tokio::test]
async fn admin_routes_enforce_roles() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let (member_id, member) = register(&client, &app, "hana").await;
    let founder = login(&client, &app, "founder@example.com", "founder1").await;

    let denied = client
        .get(format!("{}/api/admin/users", app.address))
        .bearer_auth(&member)
        .send()
        .await
        .unwrap();
    assert_eq!(denied.status().as_u16(), 403);

    let missing = client
        .get(format!("{}/api/admin/users", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status().as_u16(), 401);

    let users: Vec<serde_json::Value> = client
        .get(format!("{}/api/admin/users", app.address))
        .bearer_auth(&founder)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(users.len(), 2);

    let promoted: serde_json::Value = client
        .put(format!("{}/api/admin/users/{}/admin", app.address, member_id))
        .bearer_auth(&founder)
        .json(&serde_json::json!({ "is_admin": true }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(promoted["is_admin"], true);

    // Admin but not founder
    let allowed = client
        .get(format!("{}/api/admin/users", app.address))
        .bearer_auth(&member)
        .send()
        .await
        .unwrap();
    assert_eq!(allowed.status().as_u16(), 200);

    let not_founder = client
        .put(format!("{}/api/admin/users/{}/admin", app.address, member_id))
        .bearer_auth(&member)
        .json(&serde_json::json!({ "is_admin": false }))
        .send()
        .await
        .unwrap();
    assert_eq!(not_founder.status().as_u16(), 403);
}

#[tokio::test]
async fn proxy_serves_only_allowlisted_files() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let served = client
        .get(format!("{}/api/proxy/feed.json", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(served.status().as_u16(), 200);
    assert_eq!(served.text().await.unwrap(), r#"{"items":[]}"#);

    let hidden = client
        .get(format!("{}/api/proxy/secret.txt", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(hidden.status().as_u16(), 403);
}
