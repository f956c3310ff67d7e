//! Health care job: checks idle resources and evicts the broken ones

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::errors::PoolResult;
use crate::logging::PoolEvent;
use crate::metrics::MetricsTracker;
use crate::pool::PoolInner;
use crate::resource::HealthCheck;
use crate::sleep::sleep_in_parts;

pub(crate) async fn run_health_care_job<T: Send + Sync + 'static>(
    inner: Arc<PoolInner<T>>,
    check: Arc<dyn HealthCheck<T>>,
    enabled: Arc<AtomicBool>,
) -> PoolResult<()> {
    while enabled.load(Ordering::SeqCst) {
        care_for_health(&inner, check.as_ref()).await?;

        sleep_in_parts(
            inner.health_care_job_sleep_time(),
            inner.config.sleep_part,
            || enabled.load(Ordering::SeqCst),
        )
        .await;
    }

    inner.log(&PoolEvent::HealthCareJobStopped)?;
    Ok(())
}

/// One health care cycle over the resources available when it starts.
///
/// Slots leased or removed after the snapshot are skipped. The check runs
/// without the store lock, so a resource may be leased while it is being
/// checked; if it turns out broken it is removed anyway and its lease is
/// discarded on return.
pub(crate) async fn care_for_health<T: Send + Sync + 'static>(
    inner: &PoolInner<T>,
    check: &dyn HealthCheck<T>,
) -> PoolResult<()> {
    inner.log(&PoolEvent::HealthCareJobCycleStart)?;

    let slots = inner.store.lock().available_ids();
    inner.log(&PoolEvent::HealthCareJobLockedSize { size: slots.len() })?;

    let mut locked = 0;
    for &slot in &slots {
        let resource = inner.store.lock().lock_available(slot);
        let Some(resource) = resource else {
            inner.log(&PoolEvent::HealthCareJobUnableToLockPtr { slot })?;
            continue;
        };
        locked += 1;
        inner.log(&PoolEvent::HealthCareJobLockedPtr { slot })?;
        inner.log(&PoolEvent::HealthCareJobHealthCheckForPtr { slot })?;

        let healthy = match check.check(&resource).await {
            Ok(healthy) => healthy,
            Err(err) => {
                inner.log(&PoolEvent::HealthCareJobHealthCheckError {
                    slot,
                    error: &*err,
                })?;
                false
            }
        };
        if healthy {
            inner.log(&PoolEvent::HealthCareJobLeavingHealthyResource { slot })?;
            continue;
        }

        // finish the eviction even if the logger is failing
        let logged = inner.log(&PoolEvent::HealthCareJobErasingPtr { slot });
        let taken = inner.store.lock().remove(slot);
        if taken.is_some() {
            MetricsTracker::add(&inner.metrics.evicted, 1);
        }
        drop(taken);
        drop(resource);
        logged?;
    }

    inner.log(&PoolEvent::HealthCareJobHealthCheckCompleted {
        checked: slots.len(),
        locked,
    })?;
    inner.log(&PoolEvent::HealthCareJobHealthCheckFinished)?;
    inner.log(&PoolEvent::HealthCareJobCycleFinished)?;
    Ok(())
}
