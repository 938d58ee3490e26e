use std::future::Future;
use std::sync::Arc;

use tracing::{debug, error, warn};

use super::connector::{PgConnector, PoolConnector};
use super::pool::PoolManager;
use crate::common::{DatabaseResult, RetryConfig};

/// Runs units of database work with bounded retries on transient failures.
///
/// Every attempt fetches the pool from the [`PoolManager`] again, so an
/// attempt that failed during pool initialization re-runs the handshake.
/// Permanent errors (see [`DatabaseError::is_transient`](crate::DatabaseError::is_transient))
/// are returned after the first attempt.
pub struct RetryExecutor<C: PoolConnector = PgConnector> {
    pool: Arc<PoolManager<C>>,
    config: RetryConfig,
}

impl<C: PoolConnector> Clone for RetryExecutor<C> {
    fn clone(&self) -> Self {
        Self {
            pool: Arc::clone(&self.pool),
            config: self.config.clone(),
        }
    }
}

impl<C: PoolConnector> RetryExecutor<C> {
    pub fn new(pool: Arc<PoolManager<C>>, config: RetryConfig) -> Self {
        Self { pool, config }
    }

    pub fn pool_manager(&self) -> &Arc<PoolManager<C>> {
        &self.pool
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.config
    }

    /// Execute `work` against the pool, retrying transient failures.
    ///
    /// `operation` names the unit of work in logs.
    pub async fn run<F, Fut, T>(&self, operation: &str, mut work: F) -> DatabaseResult<T>
    where
        F: FnMut(C::Pool) -> Fut,
        Fut: Future<Output = DatabaseResult<T>>,
    {
        let mut attempt: u32 = 0;
        let mut delay = self.config.initial_delay_ms;

        loop {
            let outcome = match self.pool.acquire_pool().await {
                Ok(pool) => work(pool).await,
                Err(e) => Err(e),
            };

            match outcome {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(operation, retries = attempt, "Database operation recovered");
                    }
                    return Ok(value);
                }
                Err(e) if !e.is_transient() => {
                    error!(operation, error = %e, "Database operation failed");
                    return Err(e);
                }
                Err(e) => {
                    attempt += 1;
                    if attempt > self.config.max_retries {
                        error!(
                            operation,
                            attempts = attempt,
                            error = %e,
                            "Maximum retries exceeded"
                        );
                        return Err(e);
                    }

                    let sleep = self.config.sleep_for(delay);
                    warn!(
                        operation,
                        attempt,
                        max_retries = self.config.max_retries,
                        backoff_ms = sleep.as_millis() as u64,
                        error = %e,
                        "Transient database error, retrying"
                    );
                    tokio::time::sleep(sleep).await;
                    delay = self.config.next_delay(delay);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::DatabaseError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct StaticConnector;

    #[async_trait]
    impl PoolConnector for StaticConnector {
        type Pool = ();

        async fn connect(&self) -> DatabaseResult<()> {
            Ok(())
        }

        async fn close(&self, _pool: ()) -> DatabaseResult<()> {
            Ok(())
        }

        fn describe(&self) -> String {
            "static".to_string()
        }
    }

    fn executor(max_retries: u32) -> RetryExecutor<StaticConnector> {
        RetryExecutor::new(
            Arc::new(PoolManager::new(StaticConnector)),
            RetryConfig::new()
                .with_max_retries(max_retries)
                .with_initial_delay(5),
        )
    }

    #[tokio::test]
    async fn test_transient_then_success_retries_once() {
        let attempts = AtomicU32::new(0);

        let result = executor(3)
            .run("test", |_| {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(DatabaseError::Transient("connection reset".into()))
                    } else {
                        Ok("second")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "second");
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_exhausted_retries_return_last_error() {
        let attempts = AtomicU32::new(0);

        let result: DatabaseResult<()> = executor(2)
            .run("test", |_| {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move { Err(DatabaseError::Transient(format!("timeout #{n}"))) }
            })
            .await;

        assert_eq!(
            result.unwrap_err(),
            DatabaseError::Transient("timeout #2".into())
        );
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let attempts = AtomicU32::new(0);

        let result: DatabaseResult<()> = executor(3)
            .run("test", |_| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(DatabaseError::Query("duplicate key".into())) }
            })
            .await;

        assert!(matches!(result, Err(DatabaseError::Query(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_closed_pool_is_not_retried() {
        let executor = executor(3);
        executor.pool_manager().close().await.unwrap();

        let result: DatabaseResult<()> = executor.run("test", |_| async { Ok(()) }).await;
        assert_eq!(result.unwrap_err(), DatabaseError::PoolClosed);
    }
}
