//! Basic usage examples for SharedPool

use esox_sharedpool::{BoxError, PoolConfiguration, ResourceFactory, SharedPool};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// Stand-in for a real database connection
#[derive(Debug)]
struct Connection {
    id: u32,
}

static NEXT_ID: AtomicU32 = AtomicU32::new(1);

fn connection_factory() -> impl ResourceFactory<Connection> {
    || async {
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        Ok::<_, BoxError>(Arc::new(Connection { id }))
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== EsoxSolutions.SharedPool - Basic Examples ===\n");

    // Example 1: Emergency creation and automatic return
    simple_pool().await?;

    // Example 2: Clearing the pool
    clear_pool().await?;

    // Example 3: Try methods
    try_methods().await?;

    // Example 4: Metrics
    metrics().await?;

    Ok(())
}

async fn simple_pool() -> Result<(), BoxError> {
    println!("1. Simple Pool:");
    let pool = SharedPool::new(connection_factory(), PoolConfiguration::default());

    {
        let conn = pool.get().await?;
        println!("   Got connection #{}", conn.id);
        println!("   State while leased: {:?}", pool.pool_state());
        // Connection automatically returned when dropped
    }

    println!("   State after return: {:?}\n", pool.pool_state());
    Ok(())
}

async fn clear_pool() -> Result<(), BoxError> {
    println!("2. Clear Pool:");
    let pool = SharedPool::new(connection_factory(), PoolConfiguration::default());

    let leased = pool.get().await?;
    drop(pool.get().await?);
    println!("   Before clear: {:?}", pool.pool_state());

    pool.clear_pool();
    println!("   After clear: {:?}", pool.pool_state());

    // leased before the clear: discarded on return
    drop(leased);
    println!("   After old lease returned: {:?}\n", pool.pool_state());
    Ok(())
}

async fn try_methods() -> Result<(), BoxError> {
    println!("3. Try Methods:");
    let pool = SharedPool::new(connection_factory(), PoolConfiguration::default());

    println!("   try_get on empty pool: {:?}", pool.try_get().map(|c| c.id));
    drop(pool.get().await?);
    println!("   try_get after one return: {:?}\n", pool.try_get().map(|c| c.id));
    Ok(())
}

async fn metrics() -> Result<(), BoxError> {
    println!("4. Metrics:");
    let pool = SharedPool::new(connection_factory(), PoolConfiguration::default());

    for _ in 0..3 {
        let _conn = pool.get().await?;
    }
    pool.clear_pool();

    let metrics = pool.metrics();
    println!("   Created: {}", metrics.total_created);
    println!("   Leased: {}", metrics.total_leased);
    println!("   Returned: {}", metrics.total_returned);
    println!("   Clears: {}", metrics.clears);
    println!("   Utilization: {:.1}%\n", metrics.utilization * 100.0);
    Ok(())
}
