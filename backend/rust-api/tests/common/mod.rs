#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use cyberarena_api::{
    config::Config,
    create_router,
    models::user::UserRole,
    services::{
        user_service::{NewAccount, UserService},
        AppState,
    },
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

pub const TEST_PASSWORD: &str = "Passw0rd!";

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
}

pub async fn create_test_app() -> TestApp {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    // Load test environment from .env.test
    dotenvy::from_filename(".env.test").ok();
    std::env::set_var("RATE_LIMIT_DISABLED", "1");

    let config = Config::load().expect("Failed to load test configuration");

    let mongo_client = mongodb::Client::with_uri_str(&config.mongo_uri)
        .await
        .expect("Failed to connect to test MongoDB");
    let redis_client =
        redis::Client::open(config.redis_uri.clone()).expect("Failed to create test Redis client");

    let state = Arc::new(
        AppState::new(config, mongo_client, redis_client)
            .await
            .expect("Failed to initialize test app state"),
    );

    cyberarena_api::services::indexes::ensure_indexes(&state.mongo)
        .await
        .expect("Failed to create indexes");

    TestApp {
        router: create_router(state.clone()),
        state,
    }
}

fn unique_email(prefix: &str) -> String {
    format!("{}-{}@test.cyberarena.local", prefix, uuid::Uuid::new_v4().simple())
}

/// Inserts an account directly and returns `(mongo id, email)`
pub async fn provision(app: &TestApp, role: UserRole, phone: &str) -> (String, String) {
    let email = unique_email(role.as_str());
    let created = UserService::new(app.state.mongo.clone())
        .provision(NewAccount {
            name: format!("Test {}", role),
            email: email.clone(),
            password: Some(TEST_PASSWORD.to_string()),
            role,
            phone: phone.to_string(),
            university: "Test University".to_string(),
            department: "CS".to_string(),
            academic_year: "3rd".to_string(),
        })
        .await
        .expect("Failed to provision test user");
    (created.id, email)
}

/// Provisions an account and logs it in, returning `(mongo id, bearer token)`
pub async fn login_as(app: &TestApp, role: UserRole) -> (String, String) {
    let (id, email) = provision(app, role, "03001234567").await;
    let (status, body, _) = send(
        app,
        "POST",
        "/api/users/auth",
        None,
        Some(json!({ "login": email, "password": TEST_PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    let token = body["token"].as_str().expect("token in login response").to_string();
    (id, token)
}

/// Sends a JSON request; returns status, parsed body (Null when not JSON) and Set-Cookie values
pub async fn send(
    app: &TestApp,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value, Vec<String>) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let cookies: Vec<String> = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok().map(|s| s.to_string()))
        .collect();

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value, cookies)
}

/// Creates an exam open from an hour ago until tomorrow and returns its id
pub async fn create_exam(app: &TestApp, teacher_token: &str) -> String {
    let now = chrono::Utc::now();
    let (status, body, _) = send(
        app,
        "POST",
        "/api/users/exam",
        Some(teacher_token),
        Some(json!({
            "examName": "Network Security Basics",
            "totalQuestions": 2,
            "duration": 30,
            "liveDate": (now - chrono::Duration::hours(1)).to_rfc3339(),
            "deadDate": (now + chrono::Duration::days(1)).to_rfc3339(),
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "exam creation failed: {}", body);
    body["_id"].as_str().unwrap().to_string()
}
