use crate::config::Config;
use mongodb::{Client as MongoClient, Database};
use redis::aio::ConnectionManager;

pub struct AppState {
    pub config: Config,
    pub mongo: Database,
    pub redis: ConnectionManager,
}

impl AppState {
    pub async fn new(
        config: Config,
        mongo_client: MongoClient,
        redis_client: redis::Client,
    ) -> anyhow::Result<Self> {
        let mongo = mongo_client.database(&config.mongo_database);

        tracing::info!("Attempting to connect to Redis...");

        let redis = tokio::time::timeout(
            std::time::Duration::from_secs(30),
            ConnectionManager::new(redis_client),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis connection timeout after 30s"))??;

        let mut conn = redis.clone();
        tokio::time::timeout(
            std::time::Duration::from_secs(5),
            redis::cmd("PING").query_async::<String>(&mut conn),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis PING timeout after 5s"))??;

        tracing::info!("Redis connection established successfully");

        Ok(Self {
            config,
            mongo,
            redis,
        })
    }
}

/// Domain failures that handlers map to specific HTTP statuses
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Locked(String),
}

/// True when MongoDB rejected a write because of a unique index (code 11000)
pub fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match *err.kind {
        mongodb::error::ErrorKind::Write(mongodb::error::WriteFailure::WriteError(ref we)) => {
            we.code == 11000
        }
        mongodb::error::ErrorKind::Command(ref ce) => ce.code == 11000,
        _ => false,
    }
}

pub mod auth_service;
pub mod cheating_log_service;
pub mod code_runner;
pub mod coding_service;
pub mod credentials;
pub mod csv_import_service;
pub mod email_service;
pub mod exam_service;
pub mod export_service;
pub mod indexes;
pub mod question_service;
pub mod result_service;
pub mod scoring;
pub mod sms_service;
pub mod teacher_seed;
pub mod user_service;
