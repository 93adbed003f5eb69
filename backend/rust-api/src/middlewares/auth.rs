use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation,
};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::handlers::error::ApiError;
use crate::models::user::{User, UserRole};
use crate::services::{user_service::UserService, AppState};

/// Name of the HTTP-only cookie carrying the access token
pub const AUTH_COOKIE: &str = "jwt";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtClaims {
    pub sub: String, // user _id (hex)
    pub role: UserRole,
    pub exp: usize,
    pub iat: usize,
}

impl JwtClaims {
    pub fn is_teacher(&self) -> bool {
        self.role == UserRole::Teacher
    }

    pub fn user_id(&self) -> Result<ObjectId, ApiError> {
        ObjectId::parse_str(&self.sub)
            .map_err(|_| ApiError::Unauthorized("Not authorized, token failed".to_string()))
    }
}

#[derive(Debug)]
pub enum AuthError {
    InvalidToken,
    ExpiredToken,
    MissingToken,
    InvalidSignature,
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::InvalidToken => write!(f, "Invalid token"),
            AuthError::ExpiredToken => write!(f, "Token expired"),
            AuthError::MissingToken => write!(f, "Missing authorization token"),
            AuthError::InvalidSignature => write!(f, "Invalid token signature"),
        }
    }
}

impl std::error::Error for AuthError {}

pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn generate_token(&self, claims: &JwtClaims) -> Result<String, AuthError> {
        encode(&Header::default(), claims, &self.encoding_key).map_err(|_| AuthError::InvalidToken)
    }

    pub fn validate_token(&self, token: &str) -> Result<JwtClaims, AuthError> {
        decode::<JwtClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                _ => AuthError::InvalidToken,
            })
    }
}

/// Bearer header first, then the `jwt` cookie
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    bearer.or_else(|| {
        CookieJar::from_headers(headers)
            .get(AUTH_COOKIE)
            .map(|c| c.value().to_string())
            .filter(|t| !t.is_empty())
    })
}

/// Token claims checked against the stored account; the stored role wins
pub fn resolve_claims(claims: JwtClaims, user: Option<&User>) -> Result<JwtClaims, ApiError> {
    let user = user.ok_or_else(|| {
        tracing::warn!(user_id = %claims.sub, "Token for a missing account");
        ApiError::Unauthorized("Not authorized, user not found".to_string())
    })?;
    if user.role != claims.role {
        tracing::info!(
            user_id = %claims.sub,
            token_role = %claims.role,
            stored_role = %user.role,
            "Role changed since token was issued"
        );
    }
    Ok(JwtClaims {
        role: user.role,
        ..claims
    })
}

pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(&headers).ok_or_else(|| {
        tracing::debug!("{}", AuthError::MissingToken);
        ApiError::Unauthorized("Not authorized, no token".to_string())
    })?;

    let jwt_service = JwtService::new(&state.config.jwt_secret);
    let claims = jwt_service.validate_token(&token).map_err(|e| {
        tracing::warn!("JWT validation failed: {}", e);
        ApiError::Unauthorized("Not authorized, token failed".to_string())
    })?;

    // deleted or demoted accounts lose access as soon as the document changes
    let user = UserService::new(state.mongo.clone())
        .find_by_id(&claims.user_id()?)
        .await?;
    let claims = resolve_claims(claims, user.as_ref())?;

    tracing::debug!("Authenticated user: {} (role: {})", claims.sub, claims.role);

    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}

pub async fn teacher_guard_middleware(request: Request, next: Next) -> Result<Response, ApiError> {
    match request.extensions().get::<JwtClaims>() {
        Some(claims) if claims.is_teacher() => Ok(next.run(request).await),
        Some(claims) => {
            tracing::warn!(user_id = %claims.sub, "Access denied: teacher role required");
            Err(ApiError::forbidden("Not authorized as a teacher"))
        }
        None => Err(ApiError::Unauthorized("Not authorized, no token".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn claims(exp_offset: i64) -> JwtClaims {
        let now = chrono::Utc::now().timestamp();
        JwtClaims {
            sub: ObjectId::new().to_hex(),
            role: UserRole::Teacher,
            exp: (now + exp_offset) as usize,
            iat: now as usize,
        }
    }

    #[test]
    fn test_jwt_generation_and_validation() {
        let service = JwtService::new("test-secret");
        let claims = claims(3600);

        let token = service.generate_token(&claims).unwrap();
        let validated = service.validate_token(&token).unwrap();

        assert_eq!(validated.sub, claims.sub);
        assert_eq!(validated.role, UserRole::Teacher);
        assert!(validated.is_teacher());
        assert!(validated.user_id().is_ok());
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let service = JwtService::new("test-secret");
        let token = service.generate_token(&claims(-3600)).unwrap();
        assert!(matches!(
            service.validate_token(&token),
            Err(AuthError::ExpiredToken)
        ));
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = JwtService::new("secret-a")
            .generate_token(&claims(3600))
            .unwrap();
        assert!(matches!(
            JwtService::new("secret-b").validate_token(&token),
            Err(AuthError::InvalidSignature)
        ));
    }

    #[test]
    fn test_extract_token_prefers_bearer_then_cookie() {
        let mut headers = HeaderMap::new();
        assert!(extract_token(&headers).is_none());

        headers.insert(header::COOKIE, HeaderValue::from_static("jwt=cookie-token; theme=dark"));
        assert_eq!(extract_token(&headers).as_deref(), Some("cookie-token"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer header-token"));
        assert_eq!(extract_token(&headers).as_deref(), Some("header-token"));
    }

    fn stored_user(role: UserRole) -> User {
        let now = chrono::Utc::now();
        User {
            id: Some(ObjectId::new()),
            user_id: Some("alikhan1234".into()),
            username: Some("ali".into()),
            name: "Ali Khan".into(),
            email: "ali@example.com".into(),
            password_hash: "$2b$12$hash".into(),
            role,
            phone: String::new(),
            generated_password: String::new(),
            university: String::new(),
            department: String::new(),
            academic_year: String::new(),
            participation_type: String::new(),
            previous_participation: String::new(),
            technical_skills: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_deleted_account_token_is_unauthorized() {
        let err = resolve_claims(claims(3600), None).unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[test]
    fn test_demoted_teacher_loses_teacher_role() {
        let resolved = resolve_claims(claims(3600), Some(&stored_user(UserRole::Student))).unwrap();
        assert_eq!(resolved.role, UserRole::Student);
        assert!(!resolved.is_teacher());
    }

    #[test]
    fn test_stored_role_is_kept_for_current_accounts() {
        let original = claims(3600);
        let resolved = resolve_claims(original.clone(), Some(&stored_user(UserRole::Teacher))).unwrap();
        assert_eq!(resolved.sub, original.sub);
        assert!(resolved.is_teacher());
    }
}
