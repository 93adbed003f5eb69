use axum::{
    extract::{DefaultBodyLimit, Request},
    http::{header, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

pub mod config;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;

pub use config::Config;
pub use services::AppState;

/// JSON bodies may carry base64 proctoring screenshots
pub const JSON_BODY_LIMIT: usize = 10 * 1024 * 1024;

/// CSP middleware adds Content-Security-Policy header to all responses
async fn csp_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    response.headers_mut().insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(
            "default-src 'self'; \
             script-src 'self' 'unsafe-inline'; \
             style-src 'self' 'unsafe-inline'; \
             img-src 'self' data: blob: https:; \
             media-src 'self' blob:; \
             connect-src 'self'",
        ),
    );
    response
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/", get(handlers::api_info))
        .route("/health", get(handlers::health_check))
        .nest("/users", user_routes(app_state.clone()))
        .nest("/coding", coding_routes(app_state.clone()))
        .nest("/sms", sms_routes(app_state.clone()));

    let mut router = Router::new()
        .route(
            "/metrics",
            get(handlers::metrics_handler)
                .layer(middleware::from_fn(handlers::metrics_auth_middleware)),
        )
        .nest("/api", api);

    if let Some(dir) = app_state.config.static_dir.as_deref() {
        tracing::info!("Serving SPA from {}", dir);
        let index = std::path::Path::new(dir).join("index.html");
        router = router.fallback_service(ServeDir::new(dir).fallback(ServeFile::new(index)));
    }

    router
        .with_state(app_state.clone())
        .layer(DefaultBodyLimit::max(JSON_BODY_LIMIT))
        .layer(middleware::from_fn(csp_middleware))
        .layer(cors_layer(&app_state.config.cors_origins))
        .layer(CompressionLayer::new())
        .layer(middleware::from_fn(
            middlewares::trace::trace_context_middleware,
        ))
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

/// Routes for any signed-in user; claims are checked before the rate limit
fn authenticated(router: Router<Arc<AppState>>, app_state: &Arc<AppState>) -> Router<Arc<AppState>> {
    router
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            middlewares::rate_limit::rate_limit_middleware,
        ))
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            middlewares::auth::auth_middleware,
        ))
}

/// Routes restricted to teachers; auth runs first, then the role guard
fn teacher_only(router: Router<Arc<AppState>>, app_state: &Arc<AppState>) -> Router<Arc<AppState>> {
    authenticated(
        router.route_layer(middleware::from_fn(
            middlewares::auth::teacher_guard_middleware,
        )),
        app_state,
    )
}

fn user_routes(app_state: Arc<AppState>) -> Router<Arc<AppState>> {
    let login_route = Router::new()
        .route("/auth", post(handlers::auth::login))
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            middlewares::rate_limit::login_rate_limit_middleware,
        ));

    let public_routes = login_route.route("/logout", post(handlers::auth::logout));

    let student_routes = authenticated(
        Router::new()
            .route(
                "/profile",
                get(handlers::auth::get_profile).put(handlers::auth::update_profile),
            )
            .route("/exam", get(handlers::exams::list_exams))
            .route("/exam/{id}", get(handlers::exams::get_exam))
            .route("/exam/{id}/questions", get(handlers::exams::list_questions))
            .route("/results", post(handlers::results::save_result))
            .route("/results/user", get(handlers::results::my_results))
            .route("/results/{id}", get(handlers::results::get_result))
            .route("/cheatingLogs", post(handlers::cheating_logs::save_log)),
        &app_state,
    );

    let upload_route = Router::new()
        .route("/upload-csv", post(handlers::users::upload_csv))
        .layer(DefaultBodyLimit::max(handlers::users::MAX_UPLOAD_BYTES + 64 * 1024));

    let teacher_routes = teacher_only(
        Router::new()
            .route(
                "/",
                get(handlers::users::list_users).post(handlers::users::create_user),
            )
            .route(
                "/{id}",
                put(handlers::users::update_user).delete(handlers::users::delete_user),
            )
            .route(
                "/{id}/reset-credentials",
                post(handlers::users::reset_credentials),
            )
            .route("/with-passwords", get(handlers::users::list_with_passwords))
            .route(
                "/with-passwords/csv",
                get(handlers::users::download_credentials_csv),
            )
            .route("/csv-template", get(handlers::users::download_template))
            .merge(upload_route)
            // Exams & questions
            .route("/exam", post(handlers::exams::create_exam))
            .route(
                "/exam/{id}",
                put(handlers::exams::update_exam).delete(handlers::exams::delete_exam),
            )
            .route(
                "/exam/{id}/questions",
                post(handlers::exams::create_question),
            )
            .route(
                "/questions/{id}",
                put(handlers::exams::update_question).delete(handlers::exams::delete_question),
            )
            // Results
            .route("/results/all", get(handlers::results::all_results))
            .route("/results/export", get(handlers::results::export_results))
            .route(
                "/results/exam/{examId}",
                get(handlers::results::results_by_exam),
            )
            .route(
                "/results/{id}",
                put(handlers::results::update_result).delete(handlers::results::delete_result),
            )
            .route(
                "/results/{id}/toggle-visibility",
                put(handlers::results::toggle_visibility),
            )
            // Proctoring
            .route(
                "/cheatingLogs/{examId}",
                get(handlers::cheating_logs::logs_for_exam),
            ),
        &app_state,
    );

    public_routes.merge(student_routes).merge(teacher_routes)
}

fn coding_routes(app_state: Arc<AppState>) -> Router<Arc<AppState>> {
    let student_routes = authenticated(
        Router::new()
            .route(
                "/questions/exam/{examId}",
                get(handlers::coding::list_questions),
            )
            .route("/submit", post(handlers::coding::submit_code))
            .route(
                "/submissions/{examId}",
                get(handlers::coding::my_submissions),
            )
            .route("/run/{language}", post(handlers::coding::run_code)),
        &app_state,
    );

    let teacher_routes = teacher_only(
        Router::new().route("/questions", post(handlers::coding::create_question)),
        &app_state,
    );

    student_routes.merge(teacher_routes)
}

fn sms_routes(app_state: Arc<AppState>) -> Router<Arc<AppState>> {
    teacher_only(
        Router::new()
            .route("/send", post(handlers::sms::send_sms))
            .route("/whatsapp", post(handlers::sms::whatsapp_link))
            .route("/balance", get(handlers::sms::balance)),
        &app_state,
    )
}
