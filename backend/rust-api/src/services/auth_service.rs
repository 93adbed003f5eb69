use anyhow::{anyhow, Context, Result};
use chrono::{Duration, Utc};
use mongodb::Database;
use redis::aio::ConnectionManager;

use super::user_service::{verify_password, UserService};
use super::ServiceError;
use crate::middlewares::auth::{JwtClaims, JwtService};
use crate::models::user::{User, UserProfile};

/// Failed logins tolerated per login within the lockout window
pub const MAX_FAILED_ATTEMPTS: u32 = 5;
pub const LOCKOUT_WINDOW_SECONDS: u64 = 900;

pub struct LoginOutcome {
    pub user: UserProfile,
    pub token: String,
}

pub struct AuthService {
    mongo: Database,
    redis: ConnectionManager,
    jwt_service: JwtService,
    token_ttl_seconds: i64,
}

impl AuthService {
    pub fn new(
        mongo: Database,
        redis: ConnectionManager,
        jwt_service: JwtService,
        token_ttl_seconds: i64,
    ) -> Self {
        Self {
            mongo,
            redis,
            jwt_service,
            token_ttl_seconds,
        }
    }

    /// Verifies `login` (email or generated userId) and password, then issues a token
    pub async fn login(&self, login: &str, password: &str) -> Result<LoginOutcome> {
        let invalid =
            || ServiceError::Unauthorized("Invalid login credentials or password".to_string());

        let user = UserService::new(self.mongo.clone())
            .find_by_login(login)
            .await?
            .ok_or_else(invalid)?;

        if !verify_password(password, &user.password_hash).await? {
            tracing::warn!(login = %login, "Failed login attempt: invalid password");
            return Err(invalid().into());
        }

        let token = self.generate_access_token(&user)?;

        tracing::info!(
            user_id = %crate::models::id_hex(&user.id),
            role = %user.role,
            "Successful login"
        );

        Ok(LoginOutcome {
            user: UserProfile::from(&user),
            token,
        })
    }

    fn generate_access_token(&self, user: &User) -> Result<String> {
        let user_id = user.id.ok_or_else(|| anyhow!("User ID not found"))?;
        let now = Utc::now();
        let exp = now + Duration::seconds(self.token_ttl_seconds);

        let claims = JwtClaims {
            sub: user_id.to_hex(),
            role: user.role,
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        self.jwt_service
            .generate_token(&claims)
            .map_err(|e| anyhow!("Failed to generate token: {}", e))
    }

    fn failed_key(login: &str) -> String {
        format!("failed_login:{}", login.trim().to_lowercase())
    }

    /// True once the login reached `MAX_FAILED_ATTEMPTS` inside the window
    pub async fn check_failed_attempts(&self, login: &str) -> Result<bool> {
        let mut conn = self.redis.clone();

        let count: Option<u32> = redis::cmd("GET")
            .arg(Self::failed_key(login))
            .query_async(&mut conn)
            .await
            .context("Failed to query failed login attempts")?;

        Ok(count.unwrap_or(0) >= MAX_FAILED_ATTEMPTS)
    }

    /// Returns the count after increment; the window starts at the first failure
    pub async fn increment_failed_attempts(&self, login: &str) -> Result<u32> {
        let key = Self::failed_key(login);
        let mut conn = self.redis.clone();

        let count: u32 = redis::cmd("INCR")
            .arg(&key)
            .query_async(&mut conn)
            .await
            .context("Failed to increment failed login attempts")?;

        if count == 1 {
            redis::cmd("EXPIRE")
                .arg(&key)
                .arg(LOCKOUT_WINDOW_SECONDS)
                .query_async::<()>(&mut conn)
                .await
                .context("Failed to set TTL for failed login attempts")?;
        }

        Ok(count)
    }

    pub async fn clear_failed_attempts(&self, login: &str) -> Result<()> {
        let mut conn = self.redis.clone();

        redis::cmd("DEL")
            .arg(Self::failed_key(login))
            .query_async::<()>(&mut conn)
            .await
            .context("Failed to clear failed login attempts")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_key_is_case_insensitive() {
        assert_eq!(
            AuthService::failed_key(" Alice@Example.com "),
            "failed_login:alice@example.com"
        );
    }
}
