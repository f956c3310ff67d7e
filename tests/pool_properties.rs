mod common;

use common::{init_tracing, wait_until};
use esox_sharedpool::{BoxError, PoolConfiguration, PoolState, SharedPool};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

fn numbered_pool(config: PoolConfiguration<usize>) -> SharedPool<usize> {
    let next = Arc::new(AtomicUsize::new(0));
    SharedPool::new(
        move || {
            let id = next.fetch_add(1, Ordering::SeqCst);
            async move {
                tokio::task::yield_now().await;
                Ok::<_, BoxError>(Arc::new(id))
            }
        },
        config,
    )
}

#[tokio::test]
async fn emergency_lease_without_jobs() {
    let pool = numbered_pool(PoolConfiguration::default());
    {
        let lease = pool.get().await.unwrap();
        assert_eq!(*lease, 0);
    }
    assert_eq!(pool.pool_state(), PoolState { size: 1, available: 1 });
}

#[tokio::test]
async fn sequential_clears_are_noops() {
    let pool = numbered_pool(PoolConfiguration::default());
    pool.clear_pool();
    pool.clear_pool();
    assert_eq!(pool.pool_state(), PoolState::default());
    assert_eq!(pool.metrics().clears, 2);
}

#[tokio::test]
async fn outstanding_leases_are_discarded_after_clear() {
    let pool = numbered_pool(PoolConfiguration::default());
    let mut leases = Vec::new();
    for _ in 0..5 {
        leases.push(pool.get().await.unwrap());
    }
    pool.clear_pool();
    assert_eq!(pool.pool_state().size, 0);

    while let Some(lease) = leases.pop() {
        drop(lease);
        assert_eq!(pool.pool_state(), PoolState::default());
    }
    assert_eq!(pool.metrics().discarded_returns, 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn available_never_exceeds_size_under_contention() {
    init_tracing();
    let pool = Arc::new(numbered_pool(
        PoolConfiguration::new()
            .with_min_spare(2)
            .with_max_spare(4)
            .with_resource_count_keeper_sleep_time(Duration::from_millis(1))
            .with_health_check(|id: &usize| id % 7 != 0)
            .with_health_care_job_sleep_time(Duration::from_millis(1))
            .with_sleep_part(Duration::from_millis(1)),
    ));
    pool.start_resource_count_keeper().await.unwrap();
    pool.start_health_care_job().await.unwrap();

    let running = Arc::new(AtomicBool::new(true));
    let observer = {
        let pool = Arc::clone(&pool);
        let running = Arc::clone(&running);
        tokio::spawn(async move {
            let mut observations = 0usize;
            while running.load(Ordering::SeqCst) {
                let state = pool.pool_state();
                assert!(state.available <= state.size, "{state:?}");
                observations += 1;
                tokio::task::yield_now().await;
            }
            observations
        })
    };

    let mut workers = Vec::new();
    for worker in 0..8 {
        let pool = Arc::clone(&pool);
        workers.push(tokio::spawn(async move {
            for round in 0..200 {
                let lease = pool.get().await.unwrap();
                if (worker + round) % 50 == 0 {
                    pool.clear_pool();
                }
                tokio::task::yield_now().await;
                drop(lease);
            }
        }));
    }
    for worker in workers {
        worker.await.unwrap();
    }
    running.store(false, Ordering::SeqCst);
    assert!(observer.await.unwrap() > 0);

    pool.stop_all_jobs().await.unwrap();
    let state = pool.pool_full_state().await;
    assert!(state.available <= state.size);
    assert!(state.unhealthy <= state.size);
    assert_eq!(pool.pool_state().used(), 0);
}

#[tokio::test]
async fn dropping_the_pool_stops_its_jobs() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let pool = {
        let attempts = Arc::clone(&attempts);
        SharedPool::new(
            move || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err::<Arc<u8>, BoxError>("backing service down".into()) }
            },
            PoolConfiguration::new()
                .with_min_spare(1)
                .with_resource_count_keeper_sleep_time(Duration::from_millis(5))
                .with_sleep_part(Duration::from_millis(5)),
        )
    };
    pool.start_resource_count_keeper().await.unwrap();
    wait_until(Duration::from_secs(5), || attempts.load(Ordering::SeqCst) >= 3).await;

    drop(pool);
    tokio::time::sleep(Duration::from_millis(50)).await;
    let after_drop = attempts.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(attempts.load(Ordering::SeqCst), after_drop);
}
