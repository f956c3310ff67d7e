//! Advanced features: pool management policies, custom loggers, Prometheus

use async_trait::async_trait;
use esox_sharedpool::{
    BoxError, DnsAwarePoolManagement, LogError, PoolConfiguration, PoolControl, PoolEvent,
    PoolLogger, PoolManagement, Resolve, SharedPool,
};
use std::collections::HashMap;
use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug)]
struct Connection {
    host: String,
}

async fn connect() -> Result<Arc<Connection>, BoxError> {
    Ok(Arc::new(Connection {
        host: "db.internal".to_string(),
    }))
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== EsoxSolutions.SharedPool - Advanced Features ===\n");

    // Example 1: DNS aware pool management
    dns_failover().await?;

    // Example 2: Custom pool management policy
    custom_policy().await?;

    // Example 3: Custom logger
    custom_logger().await?;

    // Example 4: Prometheus metrics
    prometheus_export().await?;

    Ok(())
}

/// Simulated DNS whose answer changes on every failover
struct FailoverResolver {
    octet: Arc<AtomicU8>,
}

#[async_trait]
impl Resolve for FailoverResolver {
    async fn resolve(&self, _hostname: &str) -> io::Result<Vec<IpAddr>> {
        let last = self.octet.load(Ordering::Relaxed);
        Ok(vec![IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))])
    }
}

async fn dns_failover() -> Result<(), BoxError> {
    println!("1. DNS Aware Pool Management:");

    let octet = Arc::new(AtomicU8::new(1));
    let policy = {
        let octet = Arc::clone(&octet);
        DnsAwarePoolManagement::with_resolver("db.internal", move || FailoverResolver {
            octet: Arc::clone(&octet),
        })
    };
    let config = PoolConfiguration::new()
        .with_pool_management(policy, false)
        .with_pool_management_sleep_time(Duration::from_millis(100));
    let pool = SharedPool::new(connect, config);

    pool.start_pool_management().await?;
    sleep(Duration::from_millis(150)).await;

    let lease = pool.get().await?;
    println!("   Leased connection to {}", lease.host);
    drop(lease);
    println!("   Before failover: {:?}", pool.pool_state());

    octet.store(2, Ordering::Relaxed);
    sleep(Duration::from_millis(250)).await;
    println!("   After failover: {:?}", pool.pool_state());
    println!("   Clears: {}\n", pool.metrics().clears);

    pool.stop_pool_management().await?;
    Ok(())
}

/// Clears the pool once it has handed out a fixed number of leases
struct RecycleAfter {
    leases: usize,
    seen: AtomicUsize,
}

#[async_trait]
impl PoolManagement for RecycleAfter {
    fn label(&self) -> &str {
        "recycle-after"
    }

    async fn on_tick(&self, pool: &PoolControl<'_>) -> Result<(), BoxError> {
        let used = pool.pool_state().used();
        if self.seen.fetch_add(used, Ordering::Relaxed) + used >= self.leases {
            self.seen.store(0, Ordering::Relaxed);
            pool.clear_pool();
        }
        Ok(())
    }
}

async fn custom_policy() -> Result<(), BoxError> {
    println!("2. Custom Pool Management Policy:");

    let policy = RecycleAfter {
        leases: 2,
        seen: AtomicUsize::new(0),
    };
    let config = PoolConfiguration::new()
        .with_pool_management(policy, false)
        .with_pool_management_sleep_time(Duration::from_millis(50));
    let pool = SharedPool::new(connect, config);
    pool.start_pool_management().await?;

    let first = pool.get().await?;
    let second = pool.get().await?;
    sleep(Duration::from_millis(120)).await;
    drop((first, second));

    println!("   State: {:?}", pool.pool_state());
    println!("   Discarded returns: {}\n", pool.metrics().discarded_returns);

    pool.stop_pool_management().await?;
    Ok(())
}

/// Prints every pool event on stdout
struct StdoutLogger;

impl PoolLogger for StdoutLogger {
    fn log(&self, pool_id: u64, event: &PoolEvent<'_>) -> Result<(), LogError> {
        println!("   [pool {}] {}", pool_id, event.name());
        Ok(())
    }
}

async fn custom_logger() -> Result<(), BoxError> {
    println!("3. Custom Logger:");

    let pool = SharedPool::new(connect, PoolConfiguration::new().with_logger(StdoutLogger));
    drop(pool.get().await?);
    pool.clear_pool();

    println!();
    Ok(())
}

async fn prometheus_export() -> Result<(), BoxError> {
    println!("4. Prometheus Export:");

    let pool = SharedPool::new(connect, PoolConfiguration::default());
    drop(pool.get().await?);

    let mut tags = HashMap::new();
    tags.insert("service".to_string(), "orders".to_string());

    let output = pool.export_metrics_prometheus("orders_db", Some(&tags))?;
    for line in output.lines().filter(|line| !line.starts_with('#')) {
        println!("   {}", line);
    }

    println!();
    Ok(())
}
