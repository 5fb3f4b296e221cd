use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::services::dispatcher::DEFAULT_BATCH_SIZE;

/// Storage backend selection, made once at process start.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Redis,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub storage: StorageConfig,
    pub push: PushConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub env: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub redis_url: String,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushConfig {
    /// Shared secret the ingestion worker presents on /api/v1/push/send
    pub api_secret: String,
    pub vapid_subject: String,
    pub vapid_private_key: String,
    pub batch_size: usize,
    /// Refresh subscription TTLs on every successful send. Disabled by
    /// default: it costs one read + one write per delivery and the 90-day
    /// TTL is already refreshed by every resubscribe.
    pub refresh_on_send: bool,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let backend = match env_or("STORAGE_BACKEND", "redis").to_lowercase().as_str() {
            "redis" => StorageBackend::Redis,
            "postgres" => StorageBackend::Postgres,
            other => {
                return Err(AppError::Config(format!(
                    "unsupported STORAGE_BACKEND '{other}' (expected 'redis' or 'postgres')"
                )))
            }
        };

        let api_secret = std::env::var("PUSH_API_SECRET")
            .map_err(|_| AppError::Config("PUSH_API_SECRET is required".to_string()))?;
        let vapid_subject = std::env::var("VAPID_SUBJECT")
            .map_err(|_| AppError::Config("VAPID_SUBJECT is required".to_string()))?;
        let vapid_private_key = std::env::var("VAPID_PRIVATE_KEY")
            .map_err(|_| AppError::Config("VAPID_PRIVATE_KEY is required".to_string()))?;

        Ok(Config {
            app: AppConfig {
                env: env_or("APP_ENV", "development"),
                port: env_or("APP_PORT", "8000")
                    .parse()
                    .map_err(|_| AppError::Config("APP_PORT must be a port number".to_string()))?,
            },
            storage: StorageConfig {
                backend,
                redis_url: env_or("REDIS_URL", "redis://localhost:6379"),
                database_url: std::env::var("DATABASE_URL").ok(),
                database_max_connections: env_or("DATABASE_MAX_CONNECTIONS", "10")
                    .parse()
                    .map_err(|_| {
                        AppError::Config("DATABASE_MAX_CONNECTIONS must be an integer".to_string())
                    })?,
            },
            push: PushConfig {
                api_secret,
                vapid_subject,
                vapid_private_key,
                batch_size: env_or("PUSH_BATCH_SIZE", &DEFAULT_BATCH_SIZE.to_string())
                    .parse()
                    .map_err(|_| {
                        AppError::Config("PUSH_BATCH_SIZE must be an integer".to_string())
                    })?,
                refresh_on_send: env_or("PUSH_REFRESH_ON_SEND", "false")
                    .parse()
                    .unwrap_or(false),
            },
        })
    }
}
