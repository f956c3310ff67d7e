//! Resource count keeper: holds the number of available resources between
//! `min_spare` and `max_spare`

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinSet;

use crate::errors::PoolResult;
use crate::logging::PoolEvent;
use crate::metrics::MetricsTracker;
use crate::pool::PoolInner;
use crate::sleep::sleep_in_parts;

pub(crate) async fn run_resource_count_keeper<T: Send + Sync + 'static>(
    inner: Arc<PoolInner<T>>,
    enabled: Arc<AtomicBool>,
) -> PoolResult<()> {
    while enabled.load(Ordering::SeqCst) {
        keep_resource_count(&inner).await?;

        sleep_in_parts(
            inner.resource_count_keeper_sleep_time(),
            inner.config.sleep_part,
            || enabled.load(Ordering::SeqCst),
        )
        .await;
    }

    inner.log(&PoolEvent::ResourceCountKeeperStopped)?;
    Ok(())
}

/// One keeper cycle. Only a failing logger makes it return an error.
pub(crate) async fn keep_resource_count<T: Send + Sync + 'static>(
    inner: &Arc<PoolInner<T>>,
) -> PoolResult<()> {
    inner.log(&PoolEvent::ResourceCountKeeperCycleStart)?;

    let (state, generation) = {
        let store = inner.store.lock();
        (store.state(), store.generation())
    };
    let min_spare = inner.min_spare();
    let max_spare = inner.max_spare();

    if state.available < min_spare {
        let needed = min_spare - state.available;
        inner.log(&PoolEvent::ResourceCountKeeperTooLittleResources {
            available: state.available,
            needed,
            used: state.used(),
            size: state.size,
        })?;
        add_resources(inner, needed, generation).await
    } else if state.available > max_spare {
        let remove = state.available - max_spare;
        inner.log(&PoolEvent::ResourceCountKeeperTooManyResources {
            available: state.available,
            remove,
        })?;

        let disposed = inner.store.lock().dispose(remove);
        let count = disposed.len();
        MetricsTracker::add(&inner.metrics.disposed, count);
        drop(disposed);

        inner.log(&PoolEvent::ResourceCountKeeperDisposingResources { count })?;
        Ok(())
    } else {
        inner.log(&PoolEvent::ResourceCountKeeperStateOk {
            available: state.available,
            used: state.used(),
            size: state.size,
        })?;
        Ok(())
    }
}

/// Create `needed` resources concurrently and admit those that succeeded,
/// provided the pool was not cleared in the meantime
async fn add_resources<T: Send + Sync + 'static>(
    inner: &Arc<PoolInner<T>>,
    needed: usize,
    generation: u64,
) -> PoolResult<()> {
    let mut creations = JoinSet::new();
    for _ in 0..needed {
        let factory = Arc::clone(&inner.factory);
        creations.spawn(async move { factory.create().await });
    }

    let mut created = Vec::with_capacity(needed);
    while let Some(joined) = creations.join_next().await {
        match joined {
            Ok(Ok(resource)) => created.push(resource),
            Ok(Err(err)) => {
                MetricsTracker::add(&inner.metrics.factory_failures, 1);
                inner.log(&PoolEvent::ResourceCountKeeperAddingResourcesException {
                    count: needed,
                    error: &*err,
                })?;
            }
            Err(err) => {
                MetricsTracker::add(&inner.metrics.factory_failures, 1);
                inner.log(&PoolEvent::ResourceCountKeeperAddingResourcesException {
                    count: needed,
                    error: &err,
                })?;
            }
        }
    }
    if created.is_empty() {
        return Ok(());
    }
    MetricsTracker::add(&inner.metrics.total_created, created.len());

    let admitted = inner.store.lock().admit_available(created, generation);
    match admitted {
        Ok(count) => inner.log(&PoolEvent::ResourceCountKeeperAddedResources { count })?,
        Err(rejected) => {
            let count = rejected.len();
            drop(rejected);
            inner.log(&PoolEvent::ResourceCountKeeperAdditionSkippedForNewPopulation { count })?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolConfiguration;
    use crate::errors::PoolError;
    use crate::pool::SharedPool;
    use crate::slots::PoolState;
    use crate::testing::{CountingFactory, RecordingLogger};

    fn keeper_pool(
        factory: CountingFactory,
        logger: RecordingLogger,
        min_spare: usize,
        max_spare: usize,
    ) -> SharedPool<u32> {
        SharedPool::new(
            factory,
            PoolConfiguration::default()
                .with_min_spare(min_spare)
                .with_max_spare(max_spare)
                .with_logger(logger),
        )
    }

    #[tokio::test]
    async fn test_grows_to_min_spare() {
        let logger = RecordingLogger::new();
        let pool = keeper_pool(CountingFactory::new(), logger.clone(), 3, 5);

        keep_resource_count(pool.inner()).await.unwrap();
        assert_eq!(pool.pool_state(), PoolState { size: 3, available: 3 });
        assert_eq!(logger.count("too little resources"), 1);
        assert_eq!(logger.count("added resources"), 1);

        keep_resource_count(pool.inner()).await.unwrap();
        assert_eq!(pool.pool_state(), PoolState { size: 3, available: 3 });
        assert_eq!(logger.count("state OK"), 1);
    }

    #[tokio::test]
    async fn test_counts_leased_resources_as_used() {
        let pool = keeper_pool(CountingFactory::new(), RecordingLogger::new(), 2, 5);
        let _lease = pool.get().await.unwrap();

        keep_resource_count(pool.inner()).await.unwrap();
        assert_eq!(pool.pool_state(), PoolState { size: 3, available: 2 });
    }

    #[tokio::test]
    async fn test_trims_to_max_spare_oldest_first() {
        let factory = CountingFactory::new();
        let pool = keeper_pool(factory.clone(), RecordingLogger::new(), 0, 1);
        {
            let _a = pool.get().await.unwrap();
            let _b = pool.get().await.unwrap();
            let _c = pool.get().await.unwrap();
        }
        assert_eq!(pool.pool_state().available, 3);

        keep_resource_count(pool.inner()).await.unwrap();
        assert_eq!(pool.pool_state(), PoolState { size: 1, available: 1 });
        assert_eq!(factory.alive(), 1);
        assert_eq!(pool.metrics().disposed, 2);
    }

    #[tokio::test]
    async fn test_factory_failures_are_logged_not_raised() {
        let factory = CountingFactory::new();
        factory.set_failing(true);
        let logger = RecordingLogger::new();
        let pool = keeper_pool(factory, logger.clone(), 2, 4);

        keep_resource_count(pool.inner()).await.unwrap();
        assert_eq!(pool.pool_state(), PoolState::default());
        assert_eq!(logger.count("adding resources exception"), 2);
        assert_eq!(pool.metrics().factory_failures, 2);
    }

    #[tokio::test]
    async fn test_addition_skipped_when_cleared_during_creation() {
        let factory = CountingFactory::new();
        let gate = factory.hold();
        let logger = RecordingLogger::new();
        let pool = Arc::new(keeper_pool(factory.clone(), logger.clone(), 2, 4));

        let cycle = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { keep_resource_count(pool.inner()).await })
        };
        factory.wait_for_pending(2).await;
        pool.clear_pool();
        gate.release();
        cycle.await.unwrap().unwrap();

        assert_eq!(pool.pool_state(), PoolState::default());
        assert_eq!(factory.alive(), 0);
        assert_eq!(logger.count("addition skipped for new population"), 1);
    }

    #[tokio::test]
    async fn test_logger_failure_ends_cycle() {
        let logger = RecordingLogger::new();
        logger.set_failing(true);
        let pool = keeper_pool(CountingFactory::new(), logger, 1, 2);

        let err = keep_resource_count(pool.inner()).await.unwrap_err();
        assert!(matches!(err, PoolError::Logging(_)));
    }
}
