use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use redis::{Client, RedisError, RedisResult};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Duration;
use tracing::info;

/// Shared Redis connection manager guarded by a Tokio mutex.
pub type SharedConnectionManager = Arc<Mutex<ConnectionManager>>;

/// Upper bound on a single Redis command before it is abandoned.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// Redis connection pool built on the crate's auto-reconnecting manager.
pub struct RedisPool {
    manager: SharedConnectionManager,
}

impl RedisPool {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)
            .context("failed to parse REDIS_URL connection string")?;
        let connection_manager = ConnectionManager::new(client)
            .await
            .context("failed to initialize Redis connection manager")?;

        info!("Redis connection manager initialized");

        Ok(Self {
            manager: Arc::new(Mutex::new(connection_manager)),
        })
    }

    pub fn manager(&self) -> SharedConnectionManager {
        self.manager.clone()
    }
}

/// Runs a Redis command future with [`COMMAND_TIMEOUT`] applied.
///
/// A hung command surfaces as an IO-kind `RedisError` instead of stalling
/// the caller indefinitely.
pub async fn with_timeout<T>(fut: impl Future<Output = RedisResult<T>>) -> RedisResult<T> {
    match tokio::time::timeout(COMMAND_TIMEOUT, fut).await {
        Ok(result) => result,
        Err(_) => Err(RedisError::from((
            redis::ErrorKind::IoError,
            "redis command timed out",
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn with_timeout_passes_through_results() {
        let ok = with_timeout(async { RedisResult::Ok(42u32) }).await;
        assert_eq!(ok.unwrap(), 42);

        let err: RedisResult<u32> = with_timeout(async {
            Err(RedisError::from((redis::ErrorKind::TypeError, "bad type")))
        })
        .await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn with_timeout_cuts_off_hung_commands() {
        let slow = async {
            tokio::time::sleep(COMMAND_TIMEOUT + Duration::from_secs(1)).await;
            RedisResult::Ok(0u32)
        };

        tokio::time::pause();
        let result = with_timeout(slow).await;
        assert!(result.is_err());
    }
}
