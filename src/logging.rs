//! Pool events and the logger seam they are reported through
//!
//! Every internal state transition of a pool is described by a [`PoolEvent`]
//! and handed to the pool's [`PoolLogger`] together with the pool id. The
//! default [`TracingLogger`] forwards events to `tracing`; other sinks can be
//! injected through [`PoolConfiguration::with_logger`].
//!
//! [`PoolConfiguration::with_logger`]: crate::PoolConfiguration::with_logger

use std::error::Error;
use std::fmt;
use thiserror::Error;

/// Opaque token identifying a slot inside a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub(crate) u64);

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

type EventError<'a> = &'a (dyn Error + Send + Sync + 'static);

/// A state transition reported by the pool or one of its jobs
#[derive(Debug, Clone, Copy)]
#[non_exhaustive]
pub enum PoolEvent<'a> {
    EmergencyResourceCreation,
    EmergencyResourceAdded { slot: SlotId },
    EmergencyResourceAdditionSkippedForNewPopulation,
    /// A resource failed its on-access check and left the pool
    ErasingResource { slot: SlotId },
    ClearPool { generation: u64, dropped: usize },
    /// A lease came back after its slot was invalidated
    ReturnDiscarded { slot: Option<SlotId> },

    ResourceCountKeeperCycleStart,
    ResourceCountKeeperTooLittleResources {
        available: usize,
        needed: usize,
        used: usize,
        size: usize,
    },
    ResourceCountKeeperAddedResources { count: usize },
    ResourceCountKeeperAdditionSkippedForNewPopulation { count: usize },
    ResourceCountKeeperAddingResourcesException { count: usize, error: EventError<'a> },
    ResourceCountKeeperTooManyResources { available: usize, remove: usize },
    ResourceCountKeeperDisposingResources { count: usize },
    ResourceCountKeeperStateOk { available: usize, used: usize, size: usize },
    ResourceCountKeeperStopped,
    ResourceCountKeeperError { error: EventError<'a> },

    HealthCareJobCycleStart,
    HealthCareJobLockedSize { size: usize },
    HealthCareJobLockedPtr { slot: SlotId },
    HealthCareJobUnableToLockPtr { slot: SlotId },
    HealthCareJobHealthCheckForPtr { slot: SlotId },
    HealthCareJobHealthCheckError { slot: SlotId, error: EventError<'a> },
    HealthCareJobErasingPtr { slot: SlotId },
    HealthCareJobLeavingHealthyResource { slot: SlotId },
    HealthCareJobHealthCheckCompleted { checked: usize, locked: usize },
    HealthCareJobHealthCheckFinished,
    HealthCareJobCycleFinished,
    HealthCareJobStopped,
    HealthCareJobError { error: EventError<'a> },

    PoolManagementCycleStart { label: &'a str },
    PoolManagementCycleEnd { label: &'a str },
    PoolManagementStopped { label: &'a str },
    PoolManagementError { label: &'a str, error: EventError<'a> },
    DnsChangeDetected { hostname: &'a str, previous: usize, current: usize },
    DnsCheckError { hostname: &'a str, error: EventError<'a> },
}

impl PoolEvent<'_> {
    /// Stable, human readable name of the event
    pub fn name(&self) -> &'static str {
        match self {
            PoolEvent::EmergencyResourceCreation => "emergency resource creation",
            PoolEvent::EmergencyResourceAdded { .. } => "emergency resource added",
            PoolEvent::EmergencyResourceAdditionSkippedForNewPopulation => {
                "emergency resource addition skipped for new population"
            }
            PoolEvent::ErasingResource { .. } => "erasing resource",
            PoolEvent::ClearPool { .. } => "clear pool",
            PoolEvent::ReturnDiscarded { .. } => "returned resource discarded",
            PoolEvent::ResourceCountKeeperCycleStart => "resource count keeper cycle start",
            PoolEvent::ResourceCountKeeperTooLittleResources { .. } => "too little resources",
            PoolEvent::ResourceCountKeeperAddedResources { .. } => "added resources",
            PoolEvent::ResourceCountKeeperAdditionSkippedForNewPopulation { .. } => {
                "addition skipped for new population"
            }
            PoolEvent::ResourceCountKeeperAddingResourcesException { .. } => {
                "adding resources exception"
            }
            PoolEvent::ResourceCountKeeperTooManyResources { .. } => "too many resources",
            PoolEvent::ResourceCountKeeperDisposingResources { .. } => "disposing resources",
            PoolEvent::ResourceCountKeeperStateOk { .. } => "state OK",
            PoolEvent::ResourceCountKeeperStopped => "resource count keeper stopped",
            PoolEvent::ResourceCountKeeperError { .. } => "resource count keeper error",
            PoolEvent::HealthCareJobCycleStart => "health care job cycle start",
            PoolEvent::HealthCareJobLockedSize { .. } => "locked size",
            PoolEvent::HealthCareJobLockedPtr { .. } => "locked pointer",
            PoolEvent::HealthCareJobUnableToLockPtr { .. } => "unable to lock",
            PoolEvent::HealthCareJobHealthCheckForPtr { .. } => "health check for pointer",
            PoolEvent::HealthCareJobHealthCheckError { .. } => "health check error",
            PoolEvent::HealthCareJobErasingPtr { .. } => "erasing pointer",
            PoolEvent::HealthCareJobLeavingHealthyResource { .. } => "leaving healthy resource",
            PoolEvent::HealthCareJobHealthCheckCompleted { .. } => "health check completed",
            PoolEvent::HealthCareJobHealthCheckFinished => "health check finished",
            PoolEvent::HealthCareJobCycleFinished => "health care job cycle finished",
            PoolEvent::HealthCareJobStopped => "health care job stopped",
            PoolEvent::HealthCareJobError { .. } => "health care job error",
            PoolEvent::PoolManagementCycleStart { .. } => "pool management cycle start",
            PoolEvent::PoolManagementCycleEnd { .. } => "pool management cycle end",
            PoolEvent::PoolManagementStopped { .. } => "pool management stopped",
            PoolEvent::PoolManagementError { .. } => "pool management error",
            PoolEvent::DnsChangeDetected { .. } => "DNS change detected",
            PoolEvent::DnsCheckError { .. } => "DNS check error",
        }
    }
}

/// Failure of a logger to record an event
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("logger rejected event: {0}")]
pub struct LogError(pub String);

/// Sink for pool events
///
/// Implementations must be cheap; they are called while background jobs are
/// running and, for lease returns, from `Drop`. A returned error is treated as
/// a failure of the reporting job and handled according to that job's
/// terminate-on-failure flag.
pub trait PoolLogger: Send + Sync + 'static {
    fn log(&self, pool_id: u64, event: &PoolEvent<'_>) -> Result<(), LogError>;
}

/// Logger that drops every event
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentLogger;

impl PoolLogger for SilentLogger {
    fn log(&self, _pool_id: u64, _event: &PoolEvent<'_>) -> Result<(), LogError> {
        Ok(())
    }
}

/// Logger forwarding events to `tracing` with structured fields
///
/// Per-cycle chatter is emitted at `trace`, population changes at `debug` or
/// `info`, failures at `warn` and job errors at `error`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl PoolLogger for TracingLogger {
    fn log(&self, pool_id: u64, event: &PoolEvent<'_>) -> Result<(), LogError> {
        let name = event.name();
        match *event {
            PoolEvent::EmergencyResourceCreation
            | PoolEvent::EmergencyResourceAdditionSkippedForNewPopulation => {
                tracing::debug!(pool_id, "{name}");
            }
            PoolEvent::EmergencyResourceAdded { slot } => {
                tracing::debug!(pool_id, %slot, "{name}");
            }
            PoolEvent::ErasingResource { slot } => {
                tracing::info!(pool_id, %slot, "{name}");
            }
            PoolEvent::ClearPool { generation, dropped } => {
                tracing::info!(pool_id, generation, dropped, "{name}");
            }
            PoolEvent::ReturnDiscarded { slot } => {
                tracing::debug!(pool_id, slot = ?slot, "{name}");
            }
            PoolEvent::ResourceCountKeeperTooLittleResources {
                available,
                needed,
                used,
                size,
            } => {
                tracing::debug!(pool_id, available, needed, used, size, "{name}");
            }
            PoolEvent::ResourceCountKeeperAddedResources { count }
            | PoolEvent::ResourceCountKeeperDisposingResources { count } => {
                tracing::info!(pool_id, count, "{name}");
            }
            PoolEvent::ResourceCountKeeperAdditionSkippedForNewPopulation { count } => {
                tracing::debug!(pool_id, count, "{name}");
            }
            PoolEvent::ResourceCountKeeperAddingResourcesException { count, error } => {
                tracing::warn!(pool_id, count, error = %error, "{name}");
            }
            PoolEvent::ResourceCountKeeperTooManyResources { available, remove } => {
                tracing::debug!(pool_id, available, remove, "{name}");
            }
            PoolEvent::ResourceCountKeeperStateOk { available, used, size } => {
                tracing::trace!(pool_id, available, used, size, "{name}");
            }
            PoolEvent::ResourceCountKeeperError { error }
            | PoolEvent::HealthCareJobError { error } => {
                tracing::error!(pool_id, error = %error, "{name}");
            }
            PoolEvent::HealthCareJobLockedSize { size } => {
                tracing::trace!(pool_id, size, "{name}");
            }
            PoolEvent::HealthCareJobLockedPtr { slot }
            | PoolEvent::HealthCareJobHealthCheckForPtr { slot }
            | PoolEvent::HealthCareJobLeavingHealthyResource { slot } => {
                tracing::trace!(pool_id, %slot, "{name}");
            }
            PoolEvent::HealthCareJobUnableToLockPtr { slot } => {
                tracing::debug!(pool_id, %slot, "{name}");
            }
            PoolEvent::HealthCareJobHealthCheckError { slot, error } => {
                tracing::warn!(pool_id, %slot, error = %error, "{name}");
            }
            PoolEvent::HealthCareJobErasingPtr { slot } => {
                tracing::info!(pool_id, %slot, "{name}");
            }
            PoolEvent::HealthCareJobHealthCheckCompleted { checked, locked } => {
                tracing::trace!(pool_id, checked, locked, "{name}");
            }
            PoolEvent::PoolManagementCycleStart { label }
            | PoolEvent::PoolManagementCycleEnd { label } => {
                tracing::trace!(pool_id, label, "{name}");
            }
            PoolEvent::PoolManagementStopped { label } => {
                tracing::debug!(pool_id, label, "{name}");
            }
            PoolEvent::PoolManagementError { label, error } => {
                tracing::error!(pool_id, label, error = %error, "{name}");
            }
            PoolEvent::DnsChangeDetected {
                hostname,
                previous,
                current,
            } => {
                tracing::info!(pool_id, hostname, previous, current, "{name}");
            }
            PoolEvent::DnsCheckError { hostname, error } => {
                tracing::warn!(pool_id, hostname, error = %error, "{name}");
            }
            PoolEvent::ResourceCountKeeperCycleStart
            | PoolEvent::HealthCareJobCycleStart
            | PoolEvent::HealthCareJobHealthCheckFinished
            | PoolEvent::HealthCareJobCycleFinished => {
                tracing::trace!(pool_id, "{name}");
            }
            PoolEvent::ResourceCountKeeperStopped | PoolEvent::HealthCareJobStopped => {
                tracing::debug!(pool_id, "{name}");
            }
        }
        Ok(())
    }
}
