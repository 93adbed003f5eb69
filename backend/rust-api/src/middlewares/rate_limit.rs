use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use redis::aio::ConnectionManager;
use std::net::SocketAddr;
use std::sync::Arc;

use super::auth::JwtClaims;
use crate::handlers::error::ApiError;
use crate::services::AppState;

/// Fixed-window limit: `limit` hits per `window_seconds`, overridable through `env_override`
#[derive(Debug, Clone, Copy)]
struct RateRule {
    prefix: &'static str,
    limit: u32,
    window_seconds: u64,
    env_override: &'static str,
}

impl RateRule {
    fn effective_limit(&self) -> u32 {
        std::env::var(self.env_override)
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(self.limit)
    }
}

const LOGIN_RULE: RateRule = RateRule {
    prefix: "ratelimit:login",
    limit: 10,
    window_seconds: 300,
    env_override: "RATE_LIMIT_LOGIN_ATTEMPTS",
};

const USER_RULE: RateRule = RateRule {
    prefix: "ratelimit:user",
    limit: 300,
    window_seconds: 60,
    env_override: "RATE_LIMIT_PER_USER",
};

const IP_RULE: RateRule = RateRule {
    prefix: "ratelimit:ip",
    limit: 600,
    window_seconds: 60,
    env_override: "RATE_LIMIT_PER_IP",
};

const RATE_LIMIT_SCRIPT: &str = r#"
    local key = KEYS[1]
    local limit = tonumber(ARGV[1])
    local window = tonumber(ARGV[2])

    local current = redis.call('GET', key)

    if current == false then
        redis.call('SET', key, 1, 'EX', window)
        return 1
    end

    current = tonumber(current)

    if current >= limit then
        return 0
    end

    redis.call('INCR', key)
    return 1
"#;

pub(crate) fn extract_client_ip_from(
    headers: &HeaderMap,
    extensions: &axum::http::Extensions,
) -> String {
    // X-Forwarded-For, Forwarded, X-Real-IP, then the socket address
    if let Some(v) = headers.get("x-forwarded-for") {
        if let Ok(s) = v.to_str() {
            return s.split(',').next().unwrap_or(s).trim().to_string();
        }
    }

    if let Some(v) = headers.get("forwarded") {
        if let Ok(s) = v.to_str() {
            for part in s.split(';') {
                let p = part.trim();
                if let Some(val) = p.strip_prefix("for=") {
                    return val.trim().trim_matches('"').to_string();
                }
            }
        }
    }

    if let Some(v) = headers.get("x-real-ip") {
        if let Ok(s) = v.to_str() {
            return s.trim().to_string();
        }
    }

    if let Some(ci) = extensions.get::<ConnectInfo<SocketAddr>>() {
        return ci.0.ip().to_string();
    }

    "unknown".to_string()
}

fn rate_limit_disabled() -> bool {
    std::env::var("RATE_LIMIT_DISABLED").unwrap_or_default() == "1"
}

async fn enforce(redis: &ConnectionManager, rule: RateRule, subject: &str) -> Result<(), ApiError> {
    let key = format!("{}:{}", rule.prefix, subject);
    let allowed = check_rate_limit_with_window(
        redis,
        &key,
        rule.effective_limit(),
        rule.window_seconds,
    )
    .await
    .map_err(|e| {
        tracing::error!("Rate limit check failed for {}: {}", key, e);
        ApiError::Internal("Rate limit check failed".to_string())
    })?;

    if !allowed {
        tracing::warn!("Rate limit exceeded: {}", key);
        return Err(ApiError::TooManyRequests(
            "Too many requests. Please try again later.".to_string(),
        ));
    }
    Ok(())
}

/// Per-user and per-IP limit for authenticated routes; runs after `auth_middleware`
pub async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if rate_limit_disabled() {
        return Ok(next.run(request).await);
    }

    let client_ip = extract_client_ip_from(request.headers(), request.extensions());
    let user_id = request
        .extensions()
        .get::<JwtClaims>()
        .map(|claims| claims.sub.clone());

    if let Some(uid) = &user_id {
        enforce(&state.redis, USER_RULE, uid).await?;
    }
    enforce(&state.redis, IP_RULE, &client_ip).await?;

    Ok(next.run(request).await)
}

/// Login attempts per client IP
pub async fn login_rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if rate_limit_disabled() {
        tracing::debug!("Rate limiting disabled via RATE_LIMIT_DISABLED=1");
        return Ok(next.run(request).await);
    }

    let client_ip = extract_client_ip_from(request.headers(), request.extensions());
    enforce(&state.redis, LOGIN_RULE, &client_ip).await?;

    Ok(next.run(request).await)
}

async fn check_rate_limit_with_window(
    redis: &ConnectionManager,
    key: &str,
    limit: u32,
    window_seconds: u64,
) -> anyhow::Result<bool> {
    let mut conn = redis.clone();

    let allowed: u32 = redis::Script::new(RATE_LIMIT_SCRIPT)
        .key(key)
        .arg(limit)
        .arg(window_seconds)
        .invoke_async(&mut conn)
        .await?;

    Ok(allowed == 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_extract_client_ip_x_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "1.2.3.4, 10.0.0.1".parse().unwrap());
        let exts = axum::http::Extensions::new();
        assert_eq!(extract_client_ip_from(&headers, &exts), "1.2.3.4");
    }

    #[test]
    fn test_extract_client_ip_forwarded() {
        let mut headers = HeaderMap::new();
        headers.insert("forwarded", "for=\"5.6.7.8\";proto=http".parse().unwrap());
        let exts = axum::http::Extensions::new();
        assert_eq!(extract_client_ip_from(&headers, &exts), "5.6.7.8");
    }

    #[test]
    fn test_extract_client_ip_x_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", "9.9.9.9".parse().unwrap());
        let exts = axum::http::Extensions::new();
        assert_eq!(extract_client_ip_from(&headers, &exts), "9.9.9.9");
    }

    #[test]
    fn test_extract_client_ip_connectinfo() {
        let headers = HeaderMap::new();
        let mut exts = axum::http::Extensions::new();
        exts.insert(ConnectInfo::<SocketAddr>("7.7.7.7:1234".parse().unwrap()));
        assert_eq!(extract_client_ip_from(&headers, &exts), "7.7.7.7");
    }

    #[test]
    fn test_extract_client_ip_unknown() {
        let exts = axum::http::Extensions::new();
        assert_eq!(extract_client_ip_from(&HeaderMap::new(), &exts), "unknown");
    }

    #[test]
    #[serial]
    fn test_limit_env_override() {
        std::env::set_var("RATE_LIMIT_LOGIN_ATTEMPTS", "3");
        assert_eq!(LOGIN_RULE.effective_limit(), 3);
        std::env::set_var("RATE_LIMIT_LOGIN_ATTEMPTS", "not-a-number");
        assert_eq!(LOGIN_RULE.effective_limit(), 10);
        std::env::remove_var("RATE_LIMIT_LOGIN_ATTEMPTS");
    }
}
