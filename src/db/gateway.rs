use super::retry::{execute_with_retry, PoolLifecycle, RetryPolicy};
use super::GatewayError;
use crate::config::DatabaseConfig;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Sole owner of the process-wide connection pool.
///
/// The pool is created lazily on first use and torn down wholesale whenever a
/// persistence attempt fails; the next attempt recreates it. No component
/// other than this gateway may construct or destroy the pool.
pub struct PersistenceGateway {
    config: DatabaseConfig,
    policy: RetryPolicy,
    pool: Mutex<Option<PgPool>>,
}

impl PersistenceGateway {
    pub fn new(config: DatabaseConfig) -> Self {
        let policy = RetryPolicy {
            max_attempts: config.retry_attempts,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
        };
        Self {
            config,
            policy,
            pool: Mutex::new(None),
        }
    }

    fn build_pool(&self) -> Result<PgPool, sqlx::Error> {
        let statement_timeout_ms = self.config.statement_timeout_secs * 1000;
        let options = PgConnectOptions::from_str(&self.config.url)?
            .application_name("voicenote")
            .options([("statement_timeout", statement_timeout_ms.to_string())]);

        let pool = PgPoolOptions::new()
            .max_connections(self.config.max_connections)
            .acquire_timeout(Duration::from_secs(self.config.acquire_timeout_secs))
            .connect_lazy_with(options);

        info!(
            max_connections = self.config.max_connections,
            "connection pool created"
        );
        Ok(pool)
    }

    /// Run `op` against the pool under the retry policy. Each failed attempt
    /// tears the pool down; after the final attempt the last error surfaces.
    pub async fn with_retry<T, F, Fut>(&self, op: F) -> Result<T, GatewayError>
    where
        F: Fn(PgPool) -> Fut,
        Fut: Future<Output = Result<T, sqlx::Error>>,
    {
        execute_with_retry(self.policy, self, op)
            .await
            .map_err(GatewayError::from)
    }

    /// Close the pool explicitly (shutdown path).
    pub async fn close(&self) {
        if let Some(pool) = self.pool.lock().await.take() {
            pool.close().await;
            info!("connection pool closed");
        }
    }
}

#[async_trait::async_trait]
impl PoolLifecycle for PersistenceGateway {
    type Pool = PgPool;

    async fn acquire(&self) -> Result<PgPool, sqlx::Error> {
        let mut guard = self.pool.lock().await;
        let pool = match guard.as_ref() {
            Some(pool) => pool.clone(),
            None => {
                let pool = self.build_pool()?;
                *guard = Some(pool.clone());
                pool
            }
        };
        drop(guard);

        // Verify a connection can actually be established, bounded by its own
        // timeout so a hung dial cannot block the pool indefinitely.
        let connect_timeout = Duration::from_secs(self.config.connect_timeout_secs);
        let conn = tokio::time::timeout(connect_timeout, pool.acquire())
            .await
            .map_err(|_| sqlx::Error::PoolTimedOut)??;
        drop(conn);

        Ok(pool)
    }

    async fn discard(&self) {
        if let Some(pool) = self.pool.lock().await.take() {
            warn!("discarding connection pool after failure");
            pool.close().await;
        }
    }
}
