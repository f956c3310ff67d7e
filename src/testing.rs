//! Test doubles shared by the unit tests

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;

use crate::errors::BoxError;
use crate::logging::{LogError, PoolEvent, PoolLogger};
use crate::resource::ResourceFactory;

struct FactoryState {
    next: AtomicU32,
    failing: AtomicBool,
    pending: AtomicUsize,
    held: watch::Sender<bool>,
    created: Mutex<Vec<Weak<u32>>>,
}

/// Factory producing 0, 1, 2, ... and tracking which values are still alive
#[derive(Clone)]
pub(crate) struct CountingFactory {
    state: Arc<FactoryState>,
}

/// Keeps factory calls waiting until released
pub(crate) struct Gate {
    state: Arc<FactoryState>,
}

impl Gate {
    pub fn release(self) {
        self.state.held.send_replace(false);
    }
}

impl CountingFactory {
    pub fn new() -> Self {
        let (held, _) = watch::channel(false);
        Self {
            state: Arc::new(FactoryState {
                next: AtomicU32::new(0),
                failing: AtomicBool::new(false),
                pending: AtomicUsize::new(0),
                held,
                created: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.state.failing.store(failing, Ordering::SeqCst);
    }

    pub fn hold(&self) -> Gate {
        self.state.held.send_replace(true);
        Gate {
            state: Arc::clone(&self.state),
        }
    }

    /// Wait until `count` calls are blocked on the gate
    pub async fn wait_for_pending(&self, count: usize) {
        while self.state.pending.load(Ordering::SeqCst) < count {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    pub fn created(&self) -> usize {
        self.state.created.lock().len()
    }

    pub fn alive(&self) -> usize {
        self.state
            .created
            .lock()
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}

#[async_trait]
impl ResourceFactory<u32> for CountingFactory {
    async fn create(&self) -> Result<Arc<u32>, BoxError> {
        self.state.pending.fetch_add(1, Ordering::SeqCst);
        let mut held = self.state.held.subscribe();
        let _ = held.wait_for(|held| !*held).await;
        self.state.pending.fetch_sub(1, Ordering::SeqCst);

        if self.state.failing.load(Ordering::SeqCst) {
            return Err("connection refused".into());
        }
        let resource = Arc::new(self.state.next.fetch_add(1, Ordering::SeqCst));
        self.state.created.lock().push(Arc::downgrade(&resource));
        Ok(resource)
    }
}

#[derive(Default)]
struct Recorded {
    events: Vec<(u64, &'static str)>,
    failing: bool,
    fail_on: Option<&'static str>,
}

/// Logger remembering event names, optionally rejecting events
#[derive(Clone, Default)]
pub(crate) struct RecordingLogger {
    recorded: Arc<Mutex<Recorded>>,
}

impl RecordingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.recorded.lock().failing = failing;
    }

    /// Reject events with this name only
    pub fn fail_on(&self, name: &'static str) {
        self.recorded.lock().fail_on = Some(name);
    }

    pub fn count(&self, name: &str) -> usize {
        self.recorded
            .lock()
            .events
            .iter()
            .filter(|(_, event)| *event == name)
            .count()
    }

    pub fn pool_ids(&self) -> Vec<u64> {
        self.recorded.lock().events.iter().map(|(id, _)| *id).collect()
    }
}

impl PoolLogger for RecordingLogger {
    fn log(&self, pool_id: u64, event: &PoolEvent<'_>) -> Result<(), LogError> {
        let name = event.name();
        let mut recorded = self.recorded.lock();
        if recorded.failing || recorded.fail_on == Some(name) {
            return Err(LogError(format!("sink offline while logging {name}")));
        }
        recorded.events.push((pool_id, name));
        Ok(())
    }
}
