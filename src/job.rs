//! Lifecycle of the background jobs attached to a pool

use dashmap::DashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinHandle;

use crate::errors::{PoolError, PoolResult};
use crate::logging::{PoolEvent, PoolLogger};

/// The background jobs a pool can run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    ResourceCountKeeper,
    HealthCareJob,
    PoolManagement,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobKind::ResourceCountKeeper => "resource count keeper",
            JobKind::HealthCareJob => "health care job",
            JobKind::PoolManagement => "pool management job",
        };
        f.write_str(name)
    }
}

struct RunningJob {
    enabled: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Running jobs of one pool, at most one per [`JobKind`]
#[derive(Default)]
pub(crate) struct JobRegistry {
    jobs: DashMap<JobKind, RunningJob>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `body` as the job of `kind`, stopping a previous instance first.
    ///
    /// `body` receives the enabled flag it must poll; it is expected to leave
    /// its loop shortly after the flag is cleared.
    pub async fn start<F, Fut>(&self, kind: JobKind, body: F) -> PoolResult<()>
    where
        F: FnOnce(Arc<AtomicBool>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.stop(kind).await?;

        let enabled = Arc::new(AtomicBool::new(true));
        let handle = tokio::spawn(body(Arc::clone(&enabled)));
        if let Some(previous) = self.jobs.insert(kind, RunningJob { enabled, handle }) {
            // lost a race against a concurrent start of the same job
            previous.enabled.store(false, Ordering::SeqCst);
        }
        Ok(())
    }

    /// Clear the job's enabled flag and wait until it has exited
    pub async fn stop(&self, kind: JobKind) -> PoolResult<()> {
        let Some((_, job)) = self.jobs.remove(&kind) else {
            return Ok(());
        };
        job.enabled.store(false, Ordering::SeqCst);
        job.handle
            .await
            .map_err(|err| PoolError::Join(err.to_string()))
    }

    pub fn is_running(&self, kind: JobKind) -> bool {
        self.jobs
            .get(&kind)
            .is_some_and(|job| !job.handle.is_finished())
    }

    /// Ask every job to stop without waiting for it
    pub fn disable_all(&self) {
        for job in self.jobs.iter() {
            job.enabled.store(false, Ordering::SeqCst);
        }
    }
}

/// Handle the outcome of a job loop.
///
/// A failed job reports itself through `error_event` on a best-effort basis
/// and, when configured to, takes the whole process down: losing sight of a
/// pool's health is treated as fatal as losing the pool.
pub(crate) fn supervise(
    kind: JobKind,
    outcome: PoolResult<()>,
    logger: &dyn PoolLogger,
    pool_id: u64,
    label: Option<&str>,
    terminate_on_failure: bool,
) {
    let Err(err) = outcome else {
        return;
    };

    let event = match kind {
        JobKind::ResourceCountKeeper => PoolEvent::ResourceCountKeeperError { error: &err },
        JobKind::HealthCareJob => PoolEvent::HealthCareJobError { error: &err },
        JobKind::PoolManagement => PoolEvent::PoolManagementError {
            label: label.unwrap_or_default(),
            error: &err,
        },
    };
    let _ = logger.log(pool_id, &event);

    if terminate_on_failure {
        tracing::error!(pool_id, job = %kind, error = %err, "terminating after job failure");
        std::process::abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn spin(enabled: Arc<AtomicBool>) {
        while enabled.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let jobs = JobRegistry::new();
        jobs.start(JobKind::HealthCareJob, spin).await.unwrap();
        assert!(jobs.is_running(JobKind::HealthCareJob));
        assert!(!jobs.is_running(JobKind::ResourceCountKeeper));

        jobs.stop(JobKind::HealthCareJob).await.unwrap();
        assert!(!jobs.is_running(JobKind::HealthCareJob));
    }

    #[tokio::test]
    async fn test_restart_stops_previous_instance() {
        let jobs = JobRegistry::new();
        let first = Arc::new(AtomicBool::new(false));
        let observed = Arc::clone(&first);
        jobs.start(JobKind::ResourceCountKeeper, move |enabled| {
            observed.store(true, Ordering::SeqCst);
            let watch = Arc::clone(&observed);
            async move {
                spin(enabled).await;
                watch.store(false, Ordering::SeqCst);
            }
        })
        .await
        .unwrap();
        assert!(first.load(Ordering::SeqCst));

        jobs.start(JobKind::ResourceCountKeeper, spin).await.unwrap();
        // the first instance ran to completion before the second was spawned
        assert!(!first.load(Ordering::SeqCst));
        assert!(jobs.is_running(JobKind::ResourceCountKeeper));
        jobs.stop(JobKind::ResourceCountKeeper).await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_unknown_job_is_noop() {
        let jobs = JobRegistry::new();
        assert!(jobs.stop(JobKind::PoolManagement).await.is_ok());
    }

    #[tokio::test]
    async fn test_disable_all_lets_jobs_exit() {
        let jobs = JobRegistry::new();
        jobs.start(JobKind::HealthCareJob, spin).await.unwrap();
        jobs.start(JobKind::PoolManagement, spin).await.unwrap();
        jobs.disable_all();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!jobs.is_running(JobKind::HealthCareJob));
        assert!(!jobs.is_running(JobKind::PoolManagement));
    }

    #[test]
    fn test_supervise_ignores_success() {
        supervise(
            JobKind::HealthCareJob,
            Ok(()),
            &crate::logging::SilentLogger,
            1,
            None,
            true,
        );
    }

    #[test]
    fn test_supervise_logs_failure_without_terminating() {
        let err = PoolError::Management("resolver crashed".into());
        supervise(
            JobKind::PoolManagement,
            Err(err),
            &crate::logging::SilentLogger,
            1,
            Some("db.local"),
            false,
        );
    }
}
