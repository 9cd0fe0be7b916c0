// tests/api_tests.rs

use std::sync::Arc;

use promptcert::{
    config::Config,
    engine::QuizPolicy,
    routes,
    state::AppState,
    store::{CertificationStore, MemoryStore},
    utils::hash::hash_password,
};

const JWT_SECRET: &str = "test_secret_for_integration_tests";

/// Spawns the app on a random port over an in-memory store.
/// Returns the base URL (e.g., "http://127.0.0.1:12345") and the store.
async fn spawn_app() -> (String, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());

    let config = Config {
        database_url: "unused".to_string(),
        jwt_secret: JWT_SECRET.to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        bind_addr: "127.0.0.1:0".to_string(),
        admin_username: None,
        admin_password: None,
        policy: QuizPolicy::default(),
    };

    let state = AppState {
        store: store.clone(),
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

    (address, store)
}

async fn login(client: &reqwest::Client, address: &str, username: &str, password: &str) -> String {
    let resp = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({"username": username, "password": password}))
        .send()
        .await
        .expect("Login failed")
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse login json");
    resp["token"].as_str().expect("Token not found").to_string()
}

async fn admin_token(client: &reqwest::Client, address: &str, store: &MemoryStore) -> String {
    let hashed = hash_password("admin-pass").unwrap();
    store.create_user("root", &hashed, "admin").await.unwrap();
    login(client, address, "root", "admin-pass").await
}

#[tokio::test]
async fn health_check_404() {
    // Arrange
    let (address, _) = spawn_app().await;
    let client = reqwest::Client::new();

    // Act
    let response = client
        .get(format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn register_works() {
    let (address, _) = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "username": "new_learner",
            "password": "password123"
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 201);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["username"], "new_learner");
    assert!(body.get("password").is_none());
}

#[tokio::test]
async fn register_fails_validation() {
    let (address, _) = spawn_app().await;
    let client = reqwest::Client::new();

    for username in ["yo", "has spaces"] {
        let response = client
            .post(format!("{}/api/auth/register", address))
            .json(&serde_json::json!({
                "username": username,
                "password": "password123"
            }))
            .send()
            .await
            .expect("Failed to execute request");

        assert_eq!(response.status().as_u16(), 400, "username {:?}", username);
    }
}

#[tokio::test]
async fn register_duplicate_conflicts() {
    let (address, _) = spawn_app().await;
    let client = reqwest::Client::new();
    let body = serde_json::json!({"username": "twin", "password": "password123"});

    let first = client
        .post(format!("{}/api/auth/register", address))
        .json(&body)
        .send()
        .await
        .unwrap();
    let second = client
        .post(format!("{}/api/auth/register", address))
        .json(&body)
        .send()
        .await
        .unwrap();

    assert_eq!(first.status().as_u16(), 201);
    assert_eq!(second.status().as_u16(), 409);
}

#[tokio::test]
async fn login_rejects_wrong_password() {
    let (address, _) = spawn_app().await;
    let client = reqwest::Client::new();

    client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({"username": "learner", "password": "password123"}))
        .send()
        .await
        .unwrap();

    let response = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({"username": "learner", "password": "wrong-password"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn certification_routes_require_token() {
    let (address, _) = spawn_app().await;
    let client = reqwest::Client::new();

    let no_token = client
        .get(format!("{}/api/certifications/beginner/eligibility", address))
        .send()
        .await
        .unwrap();
    let bad_token = client
        .get(format!("{}/api/certifications/me", address))
        .header("Authorization", "Bearer not-a-jwt")
        .send()
        .await
        .unwrap();

    assert_eq!(no_token.status().as_u16(), 401);
    assert_eq!(bad_token.status().as_u16(), 401);
}

#[tokio::test]
async fn admin_routes_forbid_regular_users() {
    let (address, _) = spawn_app().await;
    let client = reqwest::Client::new();

    client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({"username": "learner", "password": "password123"}))
        .send()
        .await
        .unwrap();
    let token = login(&client, &address, "learner", "password123").await;

    let response = client
        .post(format!("{}/api/admin/users/1/attempt-blocks", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({"level": "beginner"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn admin_grants_attempt_blocks() {
    let (address, store) = spawn_app().await;
    let client = reqwest::Client::new();
    let token = admin_token(&client, &address, &store).await;

    let learner = store.create_user("buyer", "hash", "user").await.unwrap();

    for expected in 1..=2 {
        let response = client
            .post(format!("{}/api/admin/users/{}/attempt-blocks", address, learner.id))
            .header("Authorization", format!("Bearer {}", token))
            .json(&serde_json::json!({"level": "master"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["purchased_blocks"], expected);
        assert_eq!(body["level"], "master");
    }

    let missing = client
        .post(format!("{}/api/admin/users/9999/attempt-blocks", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({"level": "master"}))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status().as_u16(), 404);
}

#[tokio::test]
async fn admin_question_lifecycle() {
    let (address, store) = spawn_app().await;
    let client = reqwest::Client::new();
    let token = admin_token(&client, &address, &store).await;

    let bad_answer = client
        .post(format!("{}/api/admin/questions", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({
            "level": "beginner",
            "content": "What does few-shot prompting add?",
            "options": ["Examples", "Temperature"],
            "answer": "Tokens"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(bad_answer.status().as_u16(), 400);

    let created = client
        .post(format!("{}/api/admin/questions", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({
            "level": "beginner",
            "content": "What does few-shot prompting add?<script>alert(1)</script>",
            "options": ["Examples", "Temperature"],
            "answer": "Examples"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status().as_u16(), 201);
    let id = created.json::<serde_json::Value>().await.unwrap()["id"]
        .as_i64()
        .unwrap();

    let pool = store
        .question_pool(promptcert::models::level::CertificationLevel::Beginner)
        .await
        .unwrap();
    assert_eq!(pool.len(), 1);
    assert_eq!(pool[0].content, "What does few-shot prompting add?");

    let deleted = client
        .delete(format!("{}/api/admin/questions/{}", address, id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status().as_u16(), 204);

    let deleted_again = client
        .delete(format!("{}/api/admin/questions/{}", address, id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(deleted_again.status().as_u16(), 404);
}

#[tokio::test]
async fn admin_rejects_duplicate_options() {
    let (address, store) = spawn_app().await;
    let client = reqwest::Client::new();
    let token = admin_token(&client, &address, &store).await;

    for options in [
        serde_json::json!(["Examples", "Temperature", "Examples"]),
        // Identical once the markup is stripped.
        serde_json::json!(["Examples", "Examples<script>alert(1)</script>"]),
    ] {
        let response = client
            .post(format!("{}/api/admin/questions", address))
            .header("Authorization", format!("Bearer {}", token))
            .json(&serde_json::json!({
                "level": "beginner",
                "content": "What does few-shot prompting add?",
                "options": options,
                "answer": "Examples"
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 400, "options: {}", options);
    }

    let pool = store
        .question_pool(promptcert::models::level::CertificationLevel::Beginner)
        .await
        .unwrap();
    assert!(pool.is_empty());
}
