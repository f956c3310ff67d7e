//! Pool configuration options

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::logging::{PoolLogger, TracingLogger};
use crate::management::PoolManagement;
use crate::resource::HealthCheck;

/// Configuration for shared pool behavior
///
/// Population bounds and sleep intervals are only initial values; they can be
/// changed on a live pool and are picked up by the next job cycle. The
/// `enable_*`, `terminate_*` and `invalidate_resource_on_access` flags are
/// fixed for the lifetime of the pool.
///
/// # Examples
///
/// ```
/// use esox_sharedpool::PoolConfiguration;
/// use std::time::Duration;
///
/// let config = PoolConfiguration::<String>::new()
///     .with_min_spare(5)
///     .with_max_spare(20)
///     .with_health_care_job_sleep_time(Duration::from_millis(500))
///     .with_health_check(|conn: &String| !conn.is_empty());
///
/// assert_eq!(config.min_spare, 5);
/// assert_eq!(config.max_spare, 20);
/// assert!(config.health_check.is_some());
/// ```
pub struct PoolConfiguration<T> {
    /// Lower bound of available resources kept by the resource count keeper
    pub min_spare: usize,

    /// Upper bound of available resources kept by the resource count keeper
    pub max_spare: usize,

    /// Pause between two resource count keeper cycles
    pub resource_count_keeper_sleep_time: Duration,

    /// Pause between two health care job cycles
    pub health_care_job_sleep_time: Duration,

    /// Pause between two pool management policy cycles
    pub pool_management_sleep_time: Duration,

    /// Granularity at which sleeping jobs notice a stop request
    pub sleep_part: Duration,

    /// Run the health check on every resource before handing it out
    pub invalidate_resource_on_access: bool,

    pub enable_resource_count_keeper: bool,

    /// Abort the process when the resource count keeper fails to report
    pub terminate_on_resource_count_keeper_failure: bool,

    pub enable_health_care_job: bool,

    /// Abort the process when the health care job fails to report
    pub terminate_on_health_care_job_failure: bool,

    /// Abort the process when the pool management policy fails
    pub terminate_on_pool_management_failure: bool,

    /// Liveness check used by the health care job and on-access checks
    pub health_check: Option<Arc<dyn HealthCheck<T>>>,

    /// Sink for pool events
    pub logger: Arc<dyn PoolLogger>,

    /// Policy run by the pool management job
    pub pool_management: Option<Arc<dyn PoolManagement>>,
}

impl<T> Default for PoolConfiguration<T> {
    fn default() -> Self {
        Self {
            min_spare: 0,
            max_spare: 16,
            resource_count_keeper_sleep_time: Duration::from_secs(1),
            health_care_job_sleep_time: Duration::from_secs(1),
            pool_management_sleep_time: Duration::from_secs(10),
            sleep_part: Duration::from_millis(50),
            invalidate_resource_on_access: false,
            enable_resource_count_keeper: true,
            terminate_on_resource_count_keeper_failure: false,
            enable_health_care_job: true,
            terminate_on_health_care_job_failure: false,
            terminate_on_pool_management_failure: true,
            health_check: None,
            logger: Arc::new(TracingLogger),
            pool_management: None,
        }
    }
}

impl<T> Clone for PoolConfiguration<T> {
    fn clone(&self) -> Self {
        Self {
            min_spare: self.min_spare,
            max_spare: self.max_spare,
            resource_count_keeper_sleep_time: self.resource_count_keeper_sleep_time,
            health_care_job_sleep_time: self.health_care_job_sleep_time,
            pool_management_sleep_time: self.pool_management_sleep_time,
            sleep_part: self.sleep_part,
            invalidate_resource_on_access: self.invalidate_resource_on_access,
            enable_resource_count_keeper: self.enable_resource_count_keeper,
            terminate_on_resource_count_keeper_failure: self
                .terminate_on_resource_count_keeper_failure,
            enable_health_care_job: self.enable_health_care_job,
            terminate_on_health_care_job_failure: self.terminate_on_health_care_job_failure,
            terminate_on_pool_management_failure: self.terminate_on_pool_management_failure,
            health_check: self.health_check.clone(),
            logger: Arc::clone(&self.logger),
            pool_management: self.pool_management.clone(),
        }
    }
}

impl<T> fmt::Debug for PoolConfiguration<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolConfiguration")
            .field("min_spare", &self.min_spare)
            .field("max_spare", &self.max_spare)
            .field(
                "resource_count_keeper_sleep_time",
                &self.resource_count_keeper_sleep_time,
            )
            .field("health_care_job_sleep_time", &self.health_care_job_sleep_time)
            .field("pool_management_sleep_time", &self.pool_management_sleep_time)
            .field("sleep_part", &self.sleep_part)
            .field(
                "invalidate_resource_on_access",
                &self.invalidate_resource_on_access,
            )
            .field("enable_resource_count_keeper", &self.enable_resource_count_keeper)
            .field("enable_health_care_job", &self.enable_health_care_job)
            .field("health_check", &self.health_check.is_some())
            .field(
                "pool_management",
                &self.pool_management.as_ref().map(|p| p.label().to_string()),
            )
            .finish()
    }
}

impl<T> PoolConfiguration<T> {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the minimum number of spare (available) resources
    pub fn with_min_spare(mut self, count: usize) -> Self {
        self.min_spare = count;
        self
    }

    /// Set the maximum number of spare (available) resources
    pub fn with_max_spare(mut self, count: usize) -> Self {
        self.max_spare = count;
        self
    }

    pub fn with_resource_count_keeper_sleep_time(mut self, time: Duration) -> Self {
        self.resource_count_keeper_sleep_time = time;
        self
    }

    pub fn with_health_care_job_sleep_time(mut self, time: Duration) -> Self {
        self.health_care_job_sleep_time = time;
        self
    }

    pub fn with_pool_management_sleep_time(mut self, time: Duration) -> Self {
        self.pool_management_sleep_time = time;
        self
    }

    /// Set how often sleeping jobs check for a stop request
    ///
    /// Values below [`MIN_SLEEP_PART`](crate::MIN_SLEEP_PART) are
    /// raised to it when the jobs sleep.
    pub fn with_sleep_part(mut self, part: Duration) -> Self {
        self.sleep_part = part;
        self
    }

    /// Run the health check on resources before every lease
    pub fn with_invalidate_on_access(mut self, enabled: bool) -> Self {
        self.invalidate_resource_on_access = enabled;
        self
    }

    /// Enable or disable the resource count keeper and its failure policy
    ///
    /// # Examples
    ///
    /// ```
    /// use esox_sharedpool::PoolConfiguration;
    ///
    /// let config = PoolConfiguration::<u32>::new()
    ///     .with_resource_count_keeper(true, true);
    ///
    /// assert!(config.enable_resource_count_keeper);
    /// assert!(config.terminate_on_resource_count_keeper_failure);
    /// ```
    pub fn with_resource_count_keeper(mut self, enabled: bool, terminate_on_failure: bool) -> Self {
        self.enable_resource_count_keeper = enabled;
        self.terminate_on_resource_count_keeper_failure = terminate_on_failure;
        self
    }

    /// Enable or disable the health care job and its failure policy
    pub fn with_health_care_job(mut self, enabled: bool, terminate_on_failure: bool) -> Self {
        self.enable_health_care_job = enabled;
        self.terminate_on_health_care_job_failure = terminate_on_failure;
        self
    }

    /// Set the liveness check
    pub fn with_health_check<H>(mut self, check: H) -> Self
    where
        H: HealthCheck<T>,
    {
        self.health_check = Some(Arc::new(check));
        self
    }

    /// Replace the default `tracing` logger
    pub fn with_logger<L>(mut self, logger: L) -> Self
    where
        L: PoolLogger,
    {
        self.logger = Arc::new(logger);
        self
    }

    /// Install a pool management policy and its failure policy
    pub fn with_pool_management<P>(mut self, policy: P, terminate_on_failure: bool) -> Self
    where
        P: PoolManagement,
    {
        self.pool_management = Some(Arc::new(policy));
        self.terminate_on_pool_management_failure = terminate_on_failure;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PoolConfiguration::<u32>::default();
        assert_eq!(config.min_spare, 0);
        assert_eq!(config.max_spare, 16);
        assert_eq!(config.sleep_part, Duration::from_millis(50));
        assert!(config.enable_resource_count_keeper);
        assert!(config.enable_health_care_job);
        assert!(!config.terminate_on_health_care_job_failure);
        assert!(config.health_check.is_none());
        assert!(config.pool_management.is_none());
    }

    #[test]
    fn test_builder_chain() {
        let config = PoolConfiguration::<u32>::new()
            .with_min_spare(2)
            .with_max_spare(4)
            .with_resource_count_keeper_sleep_time(Duration::from_millis(10))
            .with_invalidate_on_access(true)
            .with_health_care_job(false, false);

        assert_eq!(config.min_spare, 2);
        assert_eq!(config.max_spare, 4);
        assert_eq!(
            config.resource_count_keeper_sleep_time,
            Duration::from_millis(10)
        );
        assert!(config.invalidate_resource_on_access);
        assert!(!config.enable_health_care_job);

        let debug = format!("{:?}", config.clone());
        assert!(debug.contains("min_spare: 2"));
    }
}
