//! Core shared pool implementation

use crossbeam::atomic::AtomicCell;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use crate::config::PoolConfiguration;
use crate::errors::{PoolError, PoolResult};
use crate::health::run_health_care_job;
use crate::job::{JobKind, JobRegistry, supervise};
use crate::keeper::run_resource_count_keeper;
use crate::lease::Lease;
use crate::logging::{LogError, PoolEvent, SlotId};
use crate::management::{ControlTarget, run_pool_management};
use crate::metrics::{MetricsTracker, PoolMetrics};
use crate::resource::ResourceFactory;
use crate::slots::{PoolFullState, PoolState, Release, SlotStore};

#[cfg(feature = "metrics")]
use crate::metrics::MetricsExporter;

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// State shared between a pool, its leases and its background jobs
pub(crate) struct PoolInner<T> {
    pub(crate) id: u64,
    pub(crate) store: Mutex<SlotStore<T>>,
    pub(crate) factory: Arc<dyn ResourceFactory<T>>,
    pub(crate) config: PoolConfiguration<T>,
    pub(crate) metrics: MetricsTracker,
    min_spare: AtomicUsize,
    max_spare: AtomicUsize,
    resource_count_keeper_sleep_time: AtomicCell<Duration>,
    health_care_job_sleep_time: AtomicCell<Duration>,
    pool_management_sleep_time: AtomicCell<Duration>,
}

impl<T: Send + Sync + 'static> PoolInner<T> {
    pub(crate) fn log(&self, event: &PoolEvent<'_>) -> Result<(), LogError> {
        self.config.logger.log(self.id, event)
    }

    /// Log from a path that has nobody to report a logger failure to
    fn log_quietly(&self, event: &PoolEvent<'_>) {
        let _ = self.log(event);
    }

    pub(crate) fn min_spare(&self) -> usize {
        self.min_spare.load(Ordering::Relaxed)
    }

    pub(crate) fn max_spare(&self) -> usize {
        self.max_spare.load(Ordering::Relaxed)
    }

    pub(crate) fn resource_count_keeper_sleep_time(&self) -> Duration {
        self.resource_count_keeper_sleep_time.load()
    }

    pub(crate) fn health_care_job_sleep_time(&self) -> Duration {
        self.health_care_job_sleep_time.load()
    }

    pub(crate) fn pool_management_sleep_time(&self) -> Duration {
        self.pool_management_sleep_time.load()
    }

    pub(crate) fn clear(&self) {
        let (generation, dropped) = self.store.lock().clear();
        MetricsTracker::add(&self.metrics.clears, 1);
        self.log_quietly(&PoolEvent::ClearPool {
            generation,
            dropped: dropped.len(),
        });
        drop(dropped);
    }

    /// Take back a leased resource; called from `Lease::drop`
    pub(crate) fn release(&self, resource: Arc<T>, slot: Option<SlotId>, generation: u64) {
        let outcome = match slot {
            Some(id) => self.store.lock().release(id, generation),
            None => Release::Discarded,
        };
        match outcome {
            Release::Recycled => MetricsTracker::add(&self.metrics.total_returned, 1),
            Release::Discarded => {
                MetricsTracker::add(&self.metrics.discarded_returns, 1);
                self.log_quietly(&PoolEvent::ReturnDiscarded { slot });
            }
        }
        drop(resource);
    }

    /// Drop a leased slot from the books without recycling it
    pub(crate) fn forget(&self, slot: SlotId) {
        self.store.lock().remove(slot);
    }

    async fn is_healthy(&self, resource: &T) -> bool {
        match &self.config.health_check {
            Some(check) => matches!(check.check(resource).await, Ok(true)),
            None => true,
        }
    }

    async fn create_emergency(self: &Arc<Self>) -> PoolResult<Lease<T>> {
        self.log_quietly(&PoolEvent::EmergencyResourceCreation);

        let generation = self.store.lock().generation();
        let resource = match self.factory.create().await {
            Ok(resource) => resource,
            Err(err) => {
                MetricsTracker::add(&self.metrics.factory_failures, 1);
                return Err(PoolError::factory(err));
            }
        };
        MetricsTracker::add(&self.metrics.total_created, 1);
        MetricsTracker::add(&self.metrics.emergency_created, 1);
        MetricsTracker::add(&self.metrics.total_leased, 1);

        let slot = self
            .store
            .lock()
            .admit_leased(Arc::clone(&resource), generation);
        match slot {
            Some(slot) => self.log_quietly(&PoolEvent::EmergencyResourceAdded { slot }),
            None => self.log_quietly(&PoolEvent::EmergencyResourceAdditionSkippedForNewPopulation),
        }

        Ok(Lease::new(resource, slot, generation, Arc::downgrade(self)))
    }
}

impl<T: Send + Sync + 'static> ControlTarget for PoolInner<T> {
    fn pool_id(&self) -> u64 {
        self.id
    }

    fn clear_pool(&self) {
        self.clear();
    }

    fn pool_state(&self) -> PoolState {
        self.store.lock().state()
    }

    fn log(&self, event: &PoolEvent<'_>) -> Result<(), LogError> {
        PoolInner::log(self, event)
    }
}

/// Thread-safe pool of shared, asynchronously created resources
///
/// Resources are handed out as [`Lease`]s. When no resource is available,
/// [`get`](Self::get) creates one on the spot. Three optional background jobs
/// keep the pool in shape:
///
/// - the resource count keeper holds the number of available resources
///   between `min_spare` and `max_spare`,
/// - the health care job evicts idle resources failing the health check,
/// - the pool management job runs a [`PoolManagement`] policy that may clear
///   the whole pool.
///
/// Dropping the pool asks all of its jobs to stop; they exit within one
/// `sleep_part`. Use the `stop_*` methods to wait for them.
///
/// # Examples
///
/// ```
/// use esox_sharedpool::{BoxError, PoolConfiguration, SharedPool};
/// use std::sync::Arc;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let pool = SharedPool::new(
///     || async { Ok::<_, BoxError>(Arc::new(String::from("connection"))) },
///     PoolConfiguration::default(),
/// );
///
/// {
///     let conn = pool.get().await.unwrap();
///     assert_eq!(conn.as_str(), "connection");
///     assert_eq!(pool.pool_state().size, 1);
///     assert_eq!(pool.pool_state().available, 0);
/// }
///
/// // returned on drop
/// assert_eq!(pool.pool_state().available, 1);
/// # });
/// ```
///
/// [`PoolManagement`]: crate::PoolManagement
pub struct SharedPool<T: Send + Sync + 'static> {
    inner: Arc<PoolInner<T>>,
    jobs: JobRegistry,
}

impl<T: Send + Sync + 'static> SharedPool<T> {
    /// Create an empty pool; no job is started
    pub fn new<F>(factory: F, config: PoolConfiguration<T>) -> Self
    where
        F: ResourceFactory<T>,
    {
        let inner = Arc::new(PoolInner {
            id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            store: Mutex::new(SlotStore::new()),
            factory: Arc::new(factory),
            metrics: MetricsTracker::new(),
            min_spare: AtomicUsize::new(config.min_spare),
            max_spare: AtomicUsize::new(config.max_spare),
            resource_count_keeper_sleep_time: AtomicCell::new(
                config.resource_count_keeper_sleep_time,
            ),
            health_care_job_sleep_time: AtomicCell::new(config.health_care_job_sleep_time),
            pool_management_sleep_time: AtomicCell::new(config.pool_management_sleep_time),
            config,
        });

        Self {
            inner,
            jobs: JobRegistry::new(),
        }
    }

    /// Process-unique id attached to every event of this pool
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    #[cfg(test)]
    pub(crate) fn inner(&self) -> &Arc<PoolInner<T>> {
        &self.inner
    }

    /// Lease a resource, creating one if none is available
    ///
    /// With `invalidate_resource_on_access`, available resources failing the
    /// health check are erased and the next one is tried. A resource created
    /// here while the pool is being cleared is handed out but never pooled.
    ///
    /// Fails only when the factory fails.
    pub async fn get(&self) -> PoolResult<Lease<T>> {
        loop {
            let claimed = self.inner.store.lock().claim();
            let Some((slot, resource, generation)) = claimed else {
                break;
            };
            // built before the check so a cancelled get hands the slot back
            let lease = Lease::new(resource, Some(slot), generation, Arc::downgrade(&self.inner));

            if self.inner.config.invalidate_resource_on_access
                && !self.inner.is_healthy(&lease).await
            {
                self.inner.log_quietly(&PoolEvent::ErasingResource { slot });
                MetricsTracker::add(&self.inner.metrics.evicted, 1);
                drop(lease.detach());
                continue;
            }

            MetricsTracker::add(&self.inner.metrics.total_leased, 1);
            return Ok(lease);
        }

        self.inner.create_emergency().await
    }

    /// Lease an available resource without creating or checking anything
    pub fn try_get(&self) -> Option<Lease<T>> {
        let (slot, resource, generation) = self.inner.store.lock().claim()?;
        MetricsTracker::add(&self.inner.metrics.total_leased, 1);
        Some(Lease::new(
            resource,
            Some(slot),
            generation,
            Arc::downgrade(&self.inner),
        ))
    }

    /// Invalidate every resource of the pool without waiting for leases
    ///
    /// Available resources are dropped immediately; leased ones are dropped
    /// when their lease comes back. Clearing an empty pool changes nothing
    /// observable.
    pub fn clear_pool(&self) {
        self.inner.clear();
    }

    pub fn pool_state(&self) -> PoolState {
        self.inner.store.lock().state()
    }

    /// [`pool_state`](Self::pool_state) plus the number of members failing
    /// the health check
    ///
    /// Every member is checked, leased ones included, outside the store lock.
    /// Without a configured health check nothing is checked and `unhealthy`
    /// is 0.
    pub async fn pool_full_state(&self) -> PoolFullState {
        let (state, members) = self.inner.store.lock().members();

        let mut unhealthy = 0;
        if self.inner.config.health_check.is_some() {
            for member in &members {
                if !self.inner.is_healthy(member).await {
                    unhealthy += 1;
                }
            }
        }
        drop(members);
        self.inner.metrics.unhealthy.store(unhealthy, Ordering::Relaxed);

        PoolFullState {
            size: state.size,
            available: state.available,
            unhealthy,
        }
    }

    pub fn min_spare(&self) -> usize {
        self.inner.min_spare()
    }

    /// Takes effect on the next resource count keeper cycle
    pub fn set_min_spare(&self, count: usize) {
        self.inner.min_spare.store(count, Ordering::Relaxed);
    }

    pub fn max_spare(&self) -> usize {
        self.inner.max_spare()
    }

    /// Takes effect on the next resource count keeper cycle
    pub fn set_max_spare(&self, count: usize) {
        self.inner.max_spare.store(count, Ordering::Relaxed);
    }

    pub fn resource_count_keeper_sleep_time(&self) -> Duration {
        self.inner.resource_count_keeper_sleep_time()
    }

    pub fn set_resource_count_keeper_sleep_time(&self, time: Duration) {
        self.inner.resource_count_keeper_sleep_time.store(time);
    }

    pub fn health_care_job_sleep_time(&self) -> Duration {
        self.inner.health_care_job_sleep_time()
    }

    pub fn set_health_care_job_sleep_time(&self, time: Duration) {
        self.inner.health_care_job_sleep_time.store(time);
    }

    pub fn pool_management_sleep_time(&self) -> Duration {
        self.inner.pool_management_sleep_time()
    }

    pub fn set_pool_management_sleep_time(&self, time: Duration) {
        self.inner.pool_management_sleep_time.store(time);
    }

    /// Start (or restart) the resource count keeper
    pub async fn start_resource_count_keeper(&self) -> PoolResult<()> {
        if !self.inner.config.enable_resource_count_keeper {
            return Err(PoolError::JobDisabled(JobKind::ResourceCountKeeper));
        }
        let inner = Arc::clone(&self.inner);
        self.jobs
            .start(JobKind::ResourceCountKeeper, move |enabled| async move {
                let outcome = run_resource_count_keeper(Arc::clone(&inner), enabled).await;
                supervise(
                    JobKind::ResourceCountKeeper,
                    outcome,
                    inner.config.logger.as_ref(),
                    inner.id,
                    None,
                    inner.config.terminate_on_resource_count_keeper_failure,
                );
            })
            .await
    }

    /// Stop the resource count keeper and wait for it to exit
    pub async fn stop_resource_count_keeper(&self) -> PoolResult<()> {
        self.jobs.stop(JobKind::ResourceCountKeeper).await
    }

    pub fn is_resource_count_keeper_running(&self) -> bool {
        self.jobs.is_running(JobKind::ResourceCountKeeper)
    }

    /// Start (or restart) the health care job
    pub async fn start_health_care_job(&self) -> PoolResult<()> {
        if !self.inner.config.enable_health_care_job {
            return Err(PoolError::JobDisabled(JobKind::HealthCareJob));
        }
        let Some(check) = self.inner.config.health_check.clone() else {
            return Err(PoolError::NotConfigured("health check"));
        };
        let inner = Arc::clone(&self.inner);
        self.jobs
            .start(JobKind::HealthCareJob, move |enabled| async move {
                let outcome = run_health_care_job(Arc::clone(&inner), check, enabled).await;
                supervise(
                    JobKind::HealthCareJob,
                    outcome,
                    inner.config.logger.as_ref(),
                    inner.id,
                    None,
                    inner.config.terminate_on_health_care_job_failure,
                );
            })
            .await
    }

    /// Stop the health care job and wait for it to exit
    pub async fn stop_health_care_job(&self) -> PoolResult<()> {
        self.jobs.stop(JobKind::HealthCareJob).await
    }

    pub fn is_health_care_job_running(&self) -> bool {
        self.jobs.is_running(JobKind::HealthCareJob)
    }

    /// Start (or restart) the configured pool management policy
    pub async fn start_pool_management(&self) -> PoolResult<()> {
        let Some(policy) = self.inner.config.pool_management.clone() else {
            return Err(PoolError::NotConfigured("pool management policy"));
        };
        let inner = Arc::clone(&self.inner);
        self.jobs
            .start(JobKind::PoolManagement, move |enabled| async move {
                let label = policy.label().to_owned();
                let outcome = run_pool_management(Arc::clone(&inner), policy, enabled).await;
                supervise(
                    JobKind::PoolManagement,
                    outcome,
                    inner.config.logger.as_ref(),
                    inner.id,
                    Some(&label),
                    inner.config.terminate_on_pool_management_failure,
                );
            })
            .await
    }

    /// Stop the pool management policy and wait for it to exit
    pub async fn stop_pool_management(&self) -> PoolResult<()> {
        self.jobs.stop(JobKind::PoolManagement).await
    }

    pub fn is_pool_management_running(&self) -> bool {
        self.jobs.is_running(JobKind::PoolManagement)
    }

    /// Stop every background job and wait for all of them
    pub async fn stop_all_jobs(&self) -> PoolResult<()> {
        self.stop_resource_count_keeper().await?;
        self.stop_health_care_job().await?;
        self.stop_pool_management().await
    }

    /// Get pool metrics
    pub fn metrics(&self) -> PoolMetrics {
        self.inner.metrics.get_metrics(self.pool_state())
    }

    /// Export metrics
    pub fn export_metrics(&self) -> HashMap<String, String> {
        self.metrics().export()
    }

    /// Export metrics in Prometheus format
    #[cfg(feature = "metrics")]
    pub fn export_metrics_prometheus(
        &self,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> Result<String, prometheus::Error> {
        MetricsExporter::export_prometheus(&self.metrics(), pool_name, tags)
    }
}

impl<T: Send + Sync + 'static> Drop for SharedPool<T> {
    fn drop(&mut self) {
        self.jobs.disable_all();
    }
}
