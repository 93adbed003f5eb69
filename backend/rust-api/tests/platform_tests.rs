// Routes that work without MongoDB or Redis
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    middleware,
    routing::get,
    Router,
};
use base64::{engine::general_purpose, Engine as _};
use cyberarena_api::handlers;
use http_body_util::BodyExt;
use serial_test::serial;
use tower::ServiceExt;

fn metrics_router() -> Router {
    Router::new().route(
        "/metrics",
        get(handlers::metrics_handler)
            .layer(middleware::from_fn(handlers::metrics_auth_middleware)),
    )
}

fn basic(credentials: &str) -> String {
    format!("Basic {}", general_purpose::STANDARD.encode(credentials))
}

async fn get_status(router: Router, uri: &str, auth: Option<String>) -> (StatusCode, String) {
    let mut builder = Request::builder().uri(uri);
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    let response = router
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8_lossy(&body).into_owned())
}

#[tokio::test]
#[serial]
async fn test_metrics_requires_basic_auth() {
    std::env::set_var("METRICS_AUTH", "scraper:s3cret");

    let (status, _) = get_status(metrics_router(), "/metrics", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = get_status(metrics_router(), "/metrics", Some(basic("scraper:wrong"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) =
        get_status(metrics_router(), "/metrics", Some(basic("scraper:s3cret"))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("# TYPE") || body.is_empty());

    std::env::remove_var("METRICS_AUTH");
}

#[tokio::test]
async fn test_api_info_lists_endpoints() {
    let router = Router::new().route("/api", get(handlers::api_info));
    let (status, body) = get_status(router, "/api", None).await;
    assert_eq!(status, StatusCode::OK);

    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["endpoints"]["auth"], "/api/users/auth");
    assert_eq!(json["endpoints"]["health"], "/api/health");
}

#[tokio::test]
async fn test_upload_template_download() {
    let router = Router::new().route("/csv-template", get(handlers::users::download_template));
    let response = router
        .oneshot(Request::builder().uri("/csv-template").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"hackathon_user_upload_template.csv\""
    );
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.lines().next().unwrap().contains("Email Address"));
}

#[tokio::test]
async fn test_sms_balance_is_static() {
    let router = Router::new().route("/balance", get(handlers::sms::balance));
    let (status, body) = get_status(router, "/balance", None).await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["success"], true);
}
