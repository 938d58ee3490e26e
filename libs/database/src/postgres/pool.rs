//! Lazily initialized, process-wide connection pool.
//!
//! ```text
//!  Uninitialized ──acquire──▶ Opening ──ok──▶ Ready
//!        ▲                       │              │
//!        └────────err────────────┘              │
//!  (any) ──────────────close──────────────────▶ Closed
//! ```
//!
//! The `Opening` state holds a shared future, so concurrent first callers all
//! await the same handshake and observe the same pool or the same error.

use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, info, warn};

use super::connector::PoolConnector;
use crate::common::{DatabaseError, DatabaseResult};

type OpeningFuture<P> = Shared<BoxFuture<'static, DatabaseResult<P>>>;

enum PoolState<P: Clone> {
    Uninitialized,
    Opening {
        generation: u64,
        handshake: OpeningFuture<P>,
    },
    Ready(P),
    Closed,
}

/// Externally observable lifecycle phase of a [`PoolManager`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolStatus {
    Uninitialized,
    Opening,
    Ready,
    Closed,
}

struct Inner<P: Clone> {
    state: PoolState<P>,
    next_generation: u64,
}

/// Owns the pool lifecycle for one endpoint
pub struct PoolManager<C: PoolConnector> {
    connector: Arc<C>,
    inner: Mutex<Inner<C::Pool>>,
}

impl<C: PoolConnector> PoolManager<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector: Arc::new(connector),
            inner: Mutex::new(Inner {
                state: PoolState::Uninitialized,
                next_generation: 0,
            }),
        }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    fn lock(&self) -> MutexGuard<'_, Inner<C::Pool>> {
        // The guarded sections never panic midway, a poisoned lock still holds a valid state.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn status(&self) -> PoolStatus {
        match self.lock().state {
            PoolState::Uninitialized => PoolStatus::Uninitialized,
            PoolState::Opening { .. } => PoolStatus::Opening,
            PoolState::Ready(_) => PoolStatus::Ready,
            PoolState::Closed => PoolStatus::Closed,
        }
    }

    /// Return the ready pool, opening it on first use.
    ///
    /// At most one handshake runs at a time. A failed handshake is reported to
    /// every caller that was waiting on it and the manager returns to
    /// `Uninitialized`, so the next call tries again from scratch.
    pub async fn acquire_pool(&self) -> DatabaseResult<C::Pool> {
        let (generation, handshake) = {
            let mut inner = self.lock();
            match &inner.state {
                PoolState::Ready(pool) => return Ok(pool.clone()),
                PoolState::Closed => return Err(DatabaseError::PoolClosed),
                PoolState::Opening {
                    generation,
                    handshake,
                } => (*generation, handshake.clone()),
                PoolState::Uninitialized => {
                    inner.next_generation += 1;
                    let generation = inner.next_generation;
                    let connector = Arc::clone(&self.connector);
                    let handshake = async move { connector.connect().await }.boxed().shared();

                    debug!(generation, target_db = %self.connector.describe(), "Starting pool handshake");
                    inner.state = PoolState::Opening {
                        generation,
                        handshake: handshake.clone(),
                    };
                    (generation, handshake)
                }
            }
        };

        let result = handshake.await;

        let mut inner = self.lock();
        let owns_attempt = matches!(
            &inner.state,
            PoolState::Opening { generation: current, .. } if *current == generation
        );

        if owns_attempt {
            inner.state = match &result {
                Ok(pool) => PoolState::Ready(pool.clone()),
                Err(e) => {
                    warn!(generation, error = %e, "Pool initialization failed");
                    PoolState::Uninitialized
                }
            };
            return result;
        }

        // `close` ran while we were waiting and owns the opened pool now.
        if matches!(inner.state, PoolState::Closed) {
            return Err(DatabaseError::PoolClosed);
        }
        result
    }

    /// Release all pooled connections. Idempotent; the manager stays closed.
    pub async fn close(&self) -> DatabaseResult<()> {
        let previous = std::mem::replace(&mut self.lock().state, PoolState::Closed);

        match previous {
            PoolState::Ready(pool) => self.connector.close(pool).await,
            PoolState::Opening { handshake, .. } => match handshake.await {
                Ok(pool) => self.connector.close(pool).await,
                Err(_) => Ok(()),
            },
            PoolState::Uninitialized => Ok(()),
            PoolState::Closed => {
                info!("Pool already closed");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Counts handshakes and closes; fails the first `fail_first` handshakes.
    struct FakeConnector {
        handshakes: AtomicU32,
        closes: AtomicU32,
        fail_first: u32,
        delay: Duration,
    }

    impl FakeConnector {
        fn new(fail_first: u32) -> Self {
            Self {
                handshakes: AtomicU32::new(0),
                closes: AtomicU32::new(0),
                fail_first,
                delay: Duration::from_millis(50),
            }
        }
    }

    #[async_trait]
    impl PoolConnector for FakeConnector {
        type Pool = Arc<u32>;

        async fn connect(&self) -> DatabaseResult<Arc<u32>> {
            let attempt = self.handshakes.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(self.delay).await;
            if attempt <= self.fail_first {
                Err(DatabaseError::Transient(format!("refused #{attempt}")))
            } else {
                Ok(Arc::new(attempt))
            }
        }

        async fn close(&self, _pool: Arc<u32>) -> DatabaseResult<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn describe(&self) -> String {
            "fake".to_string()
        }
    }

    #[tokio::test]
    async fn test_concurrent_first_callers_share_one_handshake() {
        let manager = Arc::new(PoolManager::new(FakeConnector::new(0)));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let manager = Arc::clone(&manager);
                tokio::spawn(async move { manager.acquire_pool().await })
            })
            .collect();

        let pools: Vec<Arc<u32>> = futures::future::join_all(tasks)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().unwrap())
            .collect();

        assert_eq!(manager.connector().handshakes.load(Ordering::SeqCst), 1);
        assert!(pools.iter().all(|pool| Arc::ptr_eq(pool, &pools[0])));
        assert_eq!(manager.status(), PoolStatus::Ready);
    }

    #[tokio::test]
    async fn test_failed_handshake_reaches_all_waiters_then_retries() {
        let manager = Arc::new(PoolManager::new(FakeConnector::new(1)));

        let (a, b) = tokio::join!(manager.acquire_pool(), manager.acquire_pool());
        assert_eq!(a.unwrap_err(), DatabaseError::Transient("refused #1".into()));
        assert_eq!(b.unwrap_err(), DatabaseError::Transient("refused #1".into()));
        assert_eq!(manager.status(), PoolStatus::Uninitialized);

        let pool = manager.acquire_pool().await.unwrap();
        assert_eq!(*pool, 2);
        assert_eq!(manager.connector().handshakes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_ready_pool_is_reused_without_handshake() {
        let manager = PoolManager::new(FakeConnector::new(0));
        let first = manager.acquire_pool().await.unwrap();
        let second = manager.acquire_pool().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(manager.connector().handshakes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_terminal() {
        let manager = PoolManager::new(FakeConnector::new(0));
        manager.acquire_pool().await.unwrap();

        manager.close().await.unwrap();
        manager.close().await.unwrap();

        assert_eq!(manager.connector().closes.load(Ordering::SeqCst), 1);
        assert_eq!(manager.status(), PoolStatus::Closed);
        assert_eq!(
            manager.acquire_pool().await.unwrap_err(),
            DatabaseError::PoolClosed
        );
    }

    #[tokio::test]
    async fn test_close_before_first_use() {
        let manager = PoolManager::new(FakeConnector::new(0));
        manager.close().await.unwrap();
        assert_eq!(manager.connector().handshakes.load(Ordering::SeqCst), 0);
        assert_eq!(manager.connector().closes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_close_during_handshake_releases_pool() {
        let manager = Arc::new(PoolManager::new(FakeConnector::new(0)));

        let waiter = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.acquire_pool().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(manager.status(), PoolStatus::Opening);

        manager.close().await.unwrap();

        assert_eq!(waiter.await.unwrap().unwrap_err(), DatabaseError::PoolClosed);
        assert_eq!(manager.connector().closes.load(Ordering::SeqCst), 1);
    }
}
