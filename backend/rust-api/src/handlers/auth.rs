use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde_json::json;
use std::sync::Arc;

use crate::{
    extractors::{AppJson, ValidJson},
    handlers::error::ApiError,
    metrics::LOGINS_TOTAL,
    middlewares::auth::{JwtClaims, JwtService, AUTH_COOKIE},
    models::user::{LoginRequest, LoginResponse, UpdateProfileRequest, UserProfile},
    services::{auth_service::AuthService, user_service::UserService, AppState, ServiceError},
};

fn auth_cookie(state: &AppState, value: String, max_age: time::Duration) -> Cookie<'static> {
    Cookie::build((AUTH_COOKIE, value))
        .path("/")
        .http_only(true)
        .secure(state.config.cookie.secure)
        .same_site(state.config.cookie.parse_same_site())
        .max_age(max_age)
        .build()
}

/// POST /api/users/auth - Login with email or generated user id
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let login = req.login.trim().to_string();
    if login.is_empty() || req.password.is_empty() {
        return Err(ApiError::bad_request(
            "Please provide login credentials and password",
        ));
    }

    tracing::info!("Login attempt for: {}", login);

    let service = AuthService::new(
        state.mongo.clone(),
        state.redis.clone(),
        JwtService::new(&state.config.jwt_secret),
        state.config.jwt_ttl_seconds,
    );

    // Default to unlocked if Redis check fails
    let is_locked = service.check_failed_attempts(&login).await.unwrap_or(false);
    if is_locked {
        tracing::warn!("Login blocked for {}: too many failed attempts", login);
        LOGINS_TOTAL.with_label_values(&["locked"]).inc();
        return Err(ApiError::TooManyRequests(
            "Too many failed login attempts. Please try again later.".to_string(),
        ));
    }

    match service.login(&login, &req.password).await {
        Ok(outcome) => {
            if let Err(e) = service.clear_failed_attempts(&login).await {
                tracing::warn!("Failed to clear login attempts for {}: {}", login, e);
            }
            LOGINS_TOTAL.with_label_values(&["success"]).inc();

            let jar = jar.add(auth_cookie(
                &state,
                outcome.token.clone(),
                time::Duration::seconds(state.config.jwt_ttl_seconds),
            ));

            let message = format!(
                "User successfully logged in with role: {}",
                outcome.user.role
            );
            let body = LoginResponse {
                user: outcome.user,
                token: outcome.token,
                message,
            };

            Ok((StatusCode::OK, jar, Json(body)))
        }
        Err(e) => {
            if matches!(
                e.downcast_ref::<ServiceError>(),
                Some(ServiceError::Unauthorized(_))
            ) {
                LOGINS_TOTAL.with_label_values(&["failure"]).inc();
                if let Err(redis_err) = service.increment_failed_attempts(&login).await {
                    tracing::warn!("Failed to record failed login for {}: {}", login, redis_err);
                }
            }
            Err(e.into())
        }
    }
}

/// POST /api/users/logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> impl IntoResponse {
    let jar = jar.add(auth_cookie(&state, String::new(), time::Duration::ZERO));
    (
        StatusCode::OK,
        jar,
        Json(json!({ "message": "User logged out" })),
    )
}

/// GET /api/users/profile
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<Json<UserProfile>, ApiError> {
    let user_id = claims.user_id()?;
    let user = UserService::new(state.mongo.clone())
        .get_user(&user_id)
        .await?;
    Ok(Json(UserProfile::from(&user)))
}

/// PUT /api/users/profile
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    ValidJson(req): ValidJson<UpdateProfileRequest>,
) -> Result<Json<UserProfile>, ApiError> {
    let user_id = claims.user_id()?;
    let profile = UserService::new(state.mongo.clone())
        .update_profile(&user_id, req)
        .await?;
    tracing::info!(user_id = %claims.sub, "Profile updated");
    Ok(Json(profile))
}
