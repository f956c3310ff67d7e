//! Background job examples

use esox_sharedpool::{BoxError, PoolConfiguration, SharedPool};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug)]
struct Connection {
    id: u32,
    broken: AtomicBool,
}

static NEXT_ID: AtomicU32 = AtomicU32::new(1);

async fn connect() -> Result<Arc<Connection>, BoxError> {
    sleep(Duration::from_millis(10)).await;
    Ok(Arc::new(Connection {
        id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
        broken: AtomicBool::new(false),
    }))
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== EsoxSolutions.SharedPool - Background Jobs ===\n");

    // Example 1: Resource count keeper
    resource_count_keeper().await?;

    // Example 2: Health care job
    health_care_job().await?;

    // Example 3: Concurrent access
    concurrent_access().await?;

    Ok(())
}

async fn resource_count_keeper() -> Result<(), BoxError> {
    println!("1. Resource Count Keeper:");

    let config = PoolConfiguration::new()
        .with_min_spare(3)
        .with_max_spare(5)
        .with_resource_count_keeper_sleep_time(Duration::from_millis(100));
    let pool = SharedPool::new(connect, config);

    pool.start_resource_count_keeper().await?;
    sleep(Duration::from_millis(300)).await;
    println!("   Warmed up: {:?}", pool.pool_state());

    pool.set_min_spare(1);
    pool.set_max_spare(1);
    sleep(Duration::from_millis(300)).await;
    println!("   After shrinking bounds: {:?}", pool.pool_state());

    pool.stop_resource_count_keeper().await?;
    println!("   Keeper running: {}\n", pool.is_resource_count_keeper_running());
    Ok(())
}

async fn health_care_job() -> Result<(), BoxError> {
    println!("2. Health Care Job:");

    let config = PoolConfiguration::new()
        .with_health_care_job_sleep_time(Duration::from_millis(100))
        .with_health_check(|conn: &Connection| !conn.broken.load(Ordering::Relaxed));
    let pool = SharedPool::new(connect, config);

    let leases = vec![pool.get().await?, pool.get().await?, pool.get().await?];
    leases[1].broken.store(true, Ordering::Relaxed);
    drop(leases);
    println!("   Before health care: {:?}", pool.pool_full_state().await);

    pool.start_health_care_job().await?;
    sleep(Duration::from_millis(200)).await;
    pool.stop_health_care_job().await?;

    println!("   After health care: {:?}", pool.pool_full_state().await);
    println!("   Evicted: {}\n", pool.metrics().evicted);
    Ok(())
}

async fn concurrent_access() -> Result<(), BoxError> {
    println!("3. Concurrent Access:");

    let pool = Arc::new(SharedPool::new(
        connect,
        PoolConfiguration::new().with_min_spare(2),
    ));
    pool.start_resource_count_keeper().await?;

    let mut handles = vec![];

    for i in 0..10 {
        let pool_clone = Arc::clone(&pool);
        let handle = tokio::spawn(async move {
            match pool_clone.get().await {
                Ok(conn) => {
                    println!("   Task {} got connection #{}", i, conn.id);
                    sleep(Duration::from_millis(50)).await;
                }
                Err(e) => println!("   Task {} failed: {}", i, e),
            }
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.await?;
    }

    pool.stop_resource_count_keeper().await?;
    println!("   Final state: {:?}", pool.pool_state());
    Ok(())
}
