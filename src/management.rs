//! Pluggable pool management policies
//!
//! A policy is a periodic job that watches some external signal and
//! invalidates the pool when that signal says existing resources have gone
//! stale. The pool drives the loop; the policy only decides, once per tick,
//! whether to call [`PoolControl::clear_pool`].

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::errors::{BoxError, PoolError, PoolResult};
use crate::logging::{LogError, PoolEvent};
use crate::pool::PoolInner;
use crate::sleep::sleep_in_parts;
use crate::slots::PoolState;

/// A background policy that may invalidate the pool
///
/// `on_tick` should handle failures of the signal it watches itself (log them
/// and return `Ok`); an `Err` is treated as a failure of the policy and is
/// escalated according to `terminate_on_pool_management_failure`.
#[async_trait]
pub trait PoolManagement: Send + Sync + 'static {
    /// Tag attached to every event of this policy, e.g. a hostname
    fn label(&self) -> &str;

    /// Called each time the policy job starts
    fn on_start(&self) {}

    async fn on_tick(&self, pool: &PoolControl<'_>) -> Result<(), BoxError>;

    /// Called when the policy job leaves its loop
    fn on_stop(&self) {}
}

/// Type-erased view of a pool handed to policies
pub(crate) trait ControlTarget: Send + Sync {
    fn pool_id(&self) -> u64;
    fn clear_pool(&self);
    fn pool_state(&self) -> PoolState;
    fn log(&self, event: &PoolEvent<'_>) -> Result<(), LogError>;
}

/// What a policy may do to the pool it manages
pub struct PoolControl<'a> {
    target: &'a dyn ControlTarget,
}

impl<'a> PoolControl<'a> {
    pub(crate) fn new(target: &'a dyn ControlTarget) -> Self {
        Self { target }
    }

    pub fn pool_id(&self) -> u64 {
        self.target.pool_id()
    }

    /// Invalidate every resource of the pool, see [`SharedPool::clear_pool`]
    ///
    /// [`SharedPool::clear_pool`]: crate::SharedPool::clear_pool
    pub fn clear_pool(&self) {
        self.target.clear_pool();
    }

    pub fn pool_state(&self) -> PoolState {
        self.target.pool_state()
    }

    /// Report an event through the pool's logger
    pub fn log(&self, event: &PoolEvent<'_>) -> Result<(), LogError> {
        self.target.log(event)
    }
}

pub(crate) async fn run_pool_management<T: Send + Sync + 'static>(
    inner: Arc<PoolInner<T>>,
    policy: Arc<dyn PoolManagement>,
    enabled: Arc<AtomicBool>,
) -> PoolResult<()> {
    let label = policy.label().to_owned();
    let control = PoolControl::new(inner.as_ref());

    policy.on_start();
    while enabled.load(Ordering::SeqCst) {
        inner.log(&PoolEvent::PoolManagementCycleStart { label: &label })?;

        if let Err(err) = policy.on_tick(&control).await {
            if inner.config.terminate_on_pool_management_failure {
                policy.on_stop();
                return Err(PoolError::Management(err.to_string()));
            }
            inner.log(&PoolEvent::PoolManagementError {
                label: &label,
                error: &*err,
            })?;
        }

        inner.log(&PoolEvent::PoolManagementCycleEnd { label: &label })?;

        sleep_in_parts(inner.pool_management_sleep_time(), inner.config.sleep_part, || {
            enabled.load(Ordering::SeqCst)
        })
        .await;
    }
    policy.on_stop();

    inner.log(&PoolEvent::PoolManagementStopped { label: &label })?;
    Ok(())
}
