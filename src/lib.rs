//! # EsoxSolutions.SharedPool
//!
//! Self-maintaining pool of shared, asynchronously created resources such as
//! database connections.
//!
//! ## Features
//!
//! - Thread-safe leasing with automatic return via RAII (Drop trait)
//! - On-demand "emergency" creation when the pool runs dry
//! - Non-blocking invalidation of the whole pool through generations
//! - Resource count keeper holding spare resources between two bounds
//! - Health care job evicting idle resources that fail a liveness check
//! - Pluggable pool management policies, e.g. clearing the pool on DNS changes
//! - Structured event logging through `tracing` or a custom sink
//! - Metrics with Prometheus export
//!
//! ## Quick Start
//!
//! ```rust
//! use esox_sharedpool::{BoxError, PoolConfiguration, SharedPool};
//! use std::sync::Arc;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let pool = SharedPool::new(
//!     || async { Ok::<_, BoxError>(Arc::new(vec![0u8; 16])) },
//!     PoolConfiguration::default().with_min_spare(2).with_max_spare(4),
//! );
//! pool.start_resource_count_keeper().await.unwrap();
//!
//! {
//!     let buffer = pool.get().await.unwrap();
//!     println!("Got a buffer of {} bytes", buffer.len());
//!     // Returned to the pool when `buffer` goes out of scope
//! }
//!
//! pool.stop_resource_count_keeper().await.unwrap();
//! # });
//! ```

mod config;
mod dns;
mod errors;
mod health;
mod job;
mod keeper;
mod lease;
mod logging;
mod management;
mod metrics;
mod pool;
mod resource;
mod sleep;
mod slots;

#[cfg(test)]
mod testing;

pub use config::PoolConfiguration;
pub use dns::{DnsAwarePoolManagement, Resolve, SystemResolver};
pub use errors::{BoxError, PoolError, PoolResult};
pub use job::JobKind;
pub use lease::Lease;
pub use logging::{LogError, PoolEvent, PoolLogger, SilentLogger, SlotId, TracingLogger};
pub use management::{PoolControl, PoolManagement};
#[cfg(feature = "metrics")]
pub use metrics::MetricsExporter;
pub use metrics::PoolMetrics;
pub use pool::SharedPool;
pub use resource::{HealthCheck, ResourceFactory};
pub use sleep::{MIN_SLEEP_PART, sleep_in_parts};
pub use slots::{PoolFullState, PoolState};
