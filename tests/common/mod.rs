#![allow(dead_code)]

use esox_sharedpool::{LogError, PoolEvent, PoolLogger};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Logger remembering event names
#[derive(Clone, Default)]
pub struct RecordingLogger {
    events: Arc<Mutex<Vec<&'static str>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn count(&self, name: &str) -> usize {
        self.events.lock().iter().filter(|event| **event == name).count()
    }
}

impl PoolLogger for RecordingLogger {
    fn log(&self, _pool_id: u64, event: &PoolEvent<'_>) -> Result<(), LogError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(LogError("sink offline".into()));
        }
        self.events.lock().push(event.name());
        Ok(())
    }
}

/// Poll `condition` every few milliseconds, failing the test after `limit`
pub async fn wait_until<C>(limit: Duration, mut condition: C)
where
    C: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + limit;
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached within {limit:?}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
