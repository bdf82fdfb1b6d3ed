use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

/// Retry policy for persistence operations: bounded attempts with linear
/// backoff (`attempt * base_delay`, so 1s then 2s at the defaults).
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

/// Lifecycle of the shared pool as the retry engine sees it: hand out a
/// handle, or throw the whole pool away after a failure. Recreation is lazy,
/// on the next `acquire`.
#[async_trait::async_trait]
pub trait PoolLifecycle: Send + Sync {
    type Pool: Send;

    async fn acquire(&self) -> Result<Self::Pool, sqlx::Error>;
    async fn discard(&self);
}

/// Run `op` against the pool with up to `policy.max_attempts` attempts.
///
/// Any failure, in acquisition or in the operation itself, discards the
/// entire pool before the next attempt. This protects against a poisoned
/// pool at the cost of dropping healthy connections on a transient blip
/// (observed behavior, kept as-is; see DESIGN.md).
pub(crate) async fn execute_with_retry<L, T, F, Fut>(
    policy: RetryPolicy,
    lifecycle: &L,
    op: F,
) -> Result<T, sqlx::Error>
where
    L: PoolLifecycle,
    F: Fn(L::Pool) -> Fut,
    Fut: Future<Output = Result<T, sqlx::Error>>,
{
    let mut last_error: Option<sqlx::Error> = None;

    for attempt in 1..=policy.max_attempts.max(1) {
        let result = match lifecycle.acquire().await {
            Ok(pool) => op(pool).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(value) => {
                if attempt > 1 {
                    info!(attempt, "persistence succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) => {
                warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    "persistence attempt failed: {}",
                    e
                );
                lifecycle.discard().await;
                last_error = Some(e);

                if attempt < policy.max_attempts {
                    let delay = policy.backoff(attempt);
                    warn!(?delay, "waiting before retry");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    Err(last_error.unwrap_or(sqlx::Error::PoolClosed))
}
