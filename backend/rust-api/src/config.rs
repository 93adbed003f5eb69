use axum_extra::extract::cookie::SameSite;
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app_env: String,
    pub port: u16,
    pub mongo_uri: String,
    pub redis_uri: String,
    pub mongo_database: String,
    pub jwt_secret: String,
    pub jwt_ttl_seconds: i64,
    /// Base URL of the SPA, used for login links in credential messages
    pub frontend_url: String,
    pub cors_origins: Vec<String>,
    pub cookie: CookieSettings,
    /// Directory with the built SPA; served with an index.html fallback when set
    pub static_dir: Option<String>,
    pub smtp: Option<SmtpSettings>,
    pub seed_teacher: Option<SeedTeacher>,
    pub code_execution_enabled: bool,
    pub phone_country_code: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CookieSettings {
    pub secure: bool,
    pub same_site: String,
}

impl CookieSettings {
    pub fn parse_same_site(&self) -> SameSite {
        match self.same_site.to_ascii_lowercase().as_str() {
            "strict" => SameSite::Strict,
            "lax" => SameSite::Lax,
            _ => SameSite::None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpSettings {
    pub server: String,
    pub port: u16,
    pub login: String,
    pub password: String,
    pub from_email: String,
    pub from_name: String,
    pub use_tls: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedTeacher {
    pub email: String,
    pub password: String,
    pub name: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Root .env first, then the crate-local one
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            dotenvy::dotenv().ok();
        }

        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());
        let is_prod = app_env == "prod" || app_env == "production";

        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", app_env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let mongo_uri = settings
            .get_string("database.mongo_uri")
            .or_else(|_| env::var("MONGODB_URI"))
            .or_else(|_| env::var("MONGO_URL"))
            .or_else(|_| env::var("MONGO_URI"))
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());

        let mongo_database = settings
            .get_string("database.mongo_database")
            .or_else(|_| env::var("MONGO_DATABASE"))
            .unwrap_or_else(|_| "cyberarena".to_string());

        let redis_uri = settings
            .get_string("redis.uri")
            .or_else(|_| env::var("REDIS_URI"))
            .unwrap_or_else(|_| {
                let host = env::var("REDIS_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
                let port = env::var("REDIS_PORT").unwrap_or_else(|_| "6379".to_string());
                match env::var("REDIS_PASSWORD") {
                    Ok(password) => format!("redis://:{}@{}:{}/0", password, host, port),
                    Err(_) => format!("redis://{}:{}/0", host, port),
                }
            });

        let jwt_secret = match settings
            .get_string("auth.jwt_secret")
            .or_else(|_| env::var("JWT_SECRET"))
        {
            Ok(secret) => secret,
            Err(_) if is_prod => {
                return Err(config::ConfigError::Message(
                    "JWT_SECRET must be set in production".to_string(),
                ))
            }
            Err(_) => {
                eprintln!("WARNING: Using default JWT_SECRET (dev mode only!)");
                "dev-secret-only-for-local-testing".to_string()
            }
        };

        let jwt_ttl_seconds = settings
            .get_int("auth.jwt_ttl_seconds")
            .ok()
            .or_else(|| {
                env::var("JWT_TTL_SECONDS")
                    .ok()
                    .and_then(|v| v.parse::<i64>().ok())
            })
            .unwrap_or(30 * 24 * 3600);

        let port = settings
            .get_int("server.port")
            .ok()
            .and_then(|p| u16::try_from(p).ok())
            .or_else(|| env::var("PORT").ok().and_then(|p| p.parse::<u16>().ok()))
            .unwrap_or(5000);

        let frontend_url = settings
            .get_string("frontend.url")
            .or_else(|_| env::var("FRONTEND_URL"))
            .or_else(|_| env::var("CLIENT_URL"))
            .unwrap_or_else(|_| "http://localhost:3000".to_string());

        let mut cors_origins = settings
            .get_string("cors.origins")
            .or_else(|_| env::var("CORS_ORIGINS"))
            .map(|raw| split_list(&raw))
            .unwrap_or_default();
        if !cors_origins.contains(&frontend_url) {
            cors_origins.push(frontend_url.clone());
        }
        if !is_prod && !cors_origins.iter().any(|o| o == "http://localhost:3000") {
            cors_origins.push("http://localhost:3000".to_string());
        }

        let cookie = CookieSettings {
            secure: settings
                .get_bool("cookie.secure")
                .ok()
                .or_else(|| env::var("COOKIE_SECURE").ok().map(|v| parse_flag(&v)))
                .unwrap_or(true),
            same_site: settings
                .get_string("cookie.same_site")
                .or_else(|_| env::var("COOKIE_SAME_SITE"))
                .unwrap_or_else(|_| "none".to_string()),
        };

        let static_dir = settings
            .get_string("server.static_dir")
            .or_else(|_| env::var("STATIC_DIR"))
            .ok()
            .filter(|dir| !dir.trim().is_empty());

        let smtp = match settings.get_string("smtp.server").or_else(|_| env::var("SMTP_SERVER")) {
            Ok(server) => Some(SmtpSettings {
                server,
                port: settings
                    .get_int("smtp.port")
                    .ok()
                    .and_then(|p| u16::try_from(p).ok())
                    .or_else(|| env::var("SMTP_PORT").ok().and_then(|p| p.parse().ok()))
                    .unwrap_or(587),
                login: settings
                    .get_string("smtp.login")
                    .or_else(|_| env::var("SMTP_LOGIN"))
                    .unwrap_or_default(),
                password: settings
                    .get_string("smtp.password")
                    .or_else(|_| env::var("SMTP_PASSWORD"))
                    .unwrap_or_default(),
                from_email: settings
                    .get_string("smtp.from_email")
                    .or_else(|_| env::var("SMTP_FROM_EMAIL"))
                    .unwrap_or_else(|_| "no-reply@cyberarena.com".to_string()),
                from_name: settings
                    .get_string("smtp.from_name")
                    .or_else(|_| env::var("SMTP_FROM_NAME"))
                    .unwrap_or_else(|_| "CyberArena".to_string()),
                use_tls: settings
                    .get_bool("smtp.use_tls")
                    .ok()
                    .or_else(|| env::var("SMTP_USE_TLS").ok().map(|v| parse_flag(&v)))
                    .unwrap_or(true),
            }),
            Err(_) => None,
        };

        let seed_teacher = match (
            settings
                .get_string("seed.teacher_email")
                .or_else(|_| env::var("SEED_TEACHER_EMAIL")),
            settings
                .get_string("seed.teacher_password")
                .or_else(|_| env::var("SEED_TEACHER_PASSWORD")),
        ) {
            (Ok(email), Ok(password)) => Some(SeedTeacher {
                email: email.trim().to_lowercase(),
                password,
                name: settings
                    .get_string("seed.teacher_name")
                    .or_else(|_| env::var("SEED_TEACHER_NAME"))
                    .unwrap_or_else(|_| "Administrator".to_string()),
            }),
            _ => None,
        };

        let code_execution_enabled = settings
            .get_bool("code_runner.enabled")
            .ok()
            .or_else(|| {
                env::var("CODE_EXECUTION_ENABLED")
                    .ok()
                    .map(|v| parse_flag(&v))
            })
            .unwrap_or(!is_prod);

        let phone_country_code = settings
            .get_string("sms.country_code")
            .or_else(|_| env::var("PHONE_COUNTRY_CODE"))
            .unwrap_or_else(|_| "92".to_string());

        Ok(Config {
            app_env,
            port,
            mongo_uri,
            redis_uri,
            mongo_database,
            jwt_secret,
            jwt_ttl_seconds,
            frontend_url,
            cors_origins,
            cookie,
            static_dir,
            smtp,
            seed_teacher,
            code_execution_enabled,
            phone_country_code,
        })
    }

    pub fn is_production(&self) -> bool {
        self.app_env == "prod" || self.app_env == "production"
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim().trim_end_matches('/').to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn parse_flag(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("yes")
}
