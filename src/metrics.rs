//! Metrics collection and export for shared pools

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::slots::PoolState;

/// Lifetime counters of a pool combined with its current population
///
/// # Examples
///
/// ```
/// use esox_sharedpool::{BoxError, PoolConfiguration, SharedPool};
/// use std::sync::Arc;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let pool = SharedPool::new(
///     || async { Ok::<_, BoxError>(Arc::new(1u32)) },
///     PoolConfiguration::default(),
/// );
///
/// {
///     let _lease = pool.get().await.unwrap();
///     let metrics = pool.metrics();
///     assert_eq!(metrics.emergency_created, 1);
///     assert_eq!(metrics.size, 1);
///     assert_eq!(metrics.available, 0);
/// }
/// # });
/// ```
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct PoolMetrics {
    /// Resources produced by the factory, whether admitted or not
    pub total_created: usize,

    /// Resources created synchronously by `get`
    pub emergency_created: usize,

    /// Leases handed out
    pub total_leased: usize,

    /// Leases whose resource went back to the available set
    pub total_returned: usize,

    /// Leases whose resource was dropped on return
    pub discarded_returns: usize,

    /// Resources removed after failing a health check
    pub evicted: usize,

    /// Resources removed by the resource count keeper
    pub disposed: usize,

    /// Factory invocations that failed
    pub factory_failures: usize,

    /// Calls to `clear_pool`
    pub clears: usize,

    pub size: usize,
    pub available: usize,
    /// Members failing the health check at the latest `pool_full_state` call
    pub unhealthy: usize,

    /// Share of the population currently leased (0.0 to 1.0)
    pub utilization: f64,
}

impl PoolMetrics {
    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("total_created".to_string(), self.total_created.to_string());
        metrics.insert("emergency_created".to_string(), self.emergency_created.to_string());
        metrics.insert("total_leased".to_string(), self.total_leased.to_string());
        metrics.insert("total_returned".to_string(), self.total_returned.to_string());
        metrics.insert("discarded_returns".to_string(), self.discarded_returns.to_string());
        metrics.insert("evicted".to_string(), self.evicted.to_string());
        metrics.insert("disposed".to_string(), self.disposed.to_string());
        metrics.insert("factory_failures".to_string(), self.factory_failures.to_string());
        metrics.insert("clears".to_string(), self.clears.to_string());
        metrics.insert("size".to_string(), self.size.to_string());
        metrics.insert("available".to_string(), self.available.to_string());
        metrics.insert("unhealthy".to_string(), self.unhealthy.to_string());
        metrics.insert("utilization".to_string(), format!("{:.2}", self.utilization));
        metrics
    }
}

/// Metrics exporter for Prometheus format
#[cfg(feature = "metrics")]
pub struct MetricsExporter;

#[cfg(feature = "metrics")]
impl MetricsExporter {
    /// Export metrics in Prometheus exposition format
    ///
    /// Every series carries a `pool` label plus the given tags.
    ///
    /// # Examples
    ///
    /// ```
    /// use esox_sharedpool::{MetricsExporter, PoolMetrics};
    /// use std::collections::HashMap;
    ///
    /// let metrics = PoolMetrics { size: 3, available: 1, ..Default::default() };
    ///
    /// let mut tags = HashMap::new();
    /// tags.insert("service".to_string(), "api".to_string());
    ///
    /// let output = MetricsExporter::export_prometheus(&metrics, "orders_db", Some(&tags)).unwrap();
    /// assert!(output.contains("sharedpool_resources_available"));
    /// assert!(output.contains("service=\"api\""));
    /// ```
    pub fn export_prometheus(
        metrics: &PoolMetrics,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> Result<String, prometheus::Error> {
        use prometheus::{Encoder, IntCounter, IntGauge, Opts, Registry, TextEncoder};

        let mut labels = HashMap::new();
        labels.insert("pool".to_string(), pool_name.to_string());
        if let Some(tags) = tags {
            labels.extend(tags.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        let registry = Registry::new_custom(Some("sharedpool".to_string()), Some(labels))?;

        let gauges = [
            ("resources_size", "Leased plus available resources", metrics.size),
            ("resources_available", "Resources ready to be leased", metrics.available),
            ("resources_unhealthy", "Members failing the last health check", metrics.unhealthy),
        ];
        for (name, help, value) in gauges {
            let gauge = IntGauge::with_opts(Opts::new(name, help))?;
            gauge.set(value as i64);
            registry.register(Box::new(gauge))?;
        }

        let counters = [
            ("created_total", "Resources created by the factory", metrics.total_created),
            ("emergency_created_total", "Resources created on demand", metrics.emergency_created),
            ("leased_total", "Leases handed out", metrics.total_leased),
            ("returned_total", "Leases recycled", metrics.total_returned),
            ("discarded_total", "Leases discarded on return", metrics.discarded_returns),
            ("evicted_total", "Resources evicted as unhealthy", metrics.evicted),
            ("disposed_total", "Surplus resources disposed", metrics.disposed),
            ("factory_failures_total", "Failed factory invocations", metrics.factory_failures),
            ("clears_total", "Pool invalidations", metrics.clears),
        ];
        for (name, help, value) in counters {
            let counter = IntCounter::with_opts(Opts::new(name, help))?;
            counter.inc_by(value as u64);
            registry.register(Box::new(counter))?;
        }

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|err| prometheus::Error::Msg(err.to_string()))
    }
}

/// Internal metrics tracker
#[derive(Default)]
pub(crate) struct MetricsTracker {
    pub total_created: AtomicUsize,
    pub emergency_created: AtomicUsize,
    pub total_leased: AtomicUsize,
    pub total_returned: AtomicUsize,
    pub discarded_returns: AtomicUsize,
    pub evicted: AtomicUsize,
    pub disposed: AtomicUsize,
    pub factory_failures: AtomicUsize,
    pub clears: AtomicUsize,
    /// Members found failing by the latest full state query
    pub unhealthy: AtomicUsize,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(counter: &AtomicUsize, value: usize) {
        counter.fetch_add(value, Ordering::Relaxed);
    }

    pub fn get_metrics(&self, state: PoolState) -> PoolMetrics {
        let utilization = if state.size > 0 {
            (state.size - state.available) as f64 / state.size as f64
        } else {
            0.0
        };

        PoolMetrics {
            total_created: self.total_created.load(Ordering::Relaxed),
            emergency_created: self.emergency_created.load(Ordering::Relaxed),
            total_leased: self.total_leased.load(Ordering::Relaxed),
            total_returned: self.total_returned.load(Ordering::Relaxed),
            discarded_returns: self.discarded_returns.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            disposed: self.disposed.load(Ordering::Relaxed),
            factory_failures: self.factory_failures.load(Ordering::Relaxed),
            clears: self.clears.load(Ordering::Relaxed),
            size: state.size,
            available: state.available,
            unhealthy: self.unhealthy.load(Ordering::Relaxed),
            utilization,
        }
    }
}
