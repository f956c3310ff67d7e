//! RAII handle to a leased resource

use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Weak};

use crate::logging::SlotId;
use crate::pool::PoolInner;

/// A leased resource that goes back to its pool when dropped
///
/// Whether the resource is recycled depends on the pool generation: if the
/// pool was cleared while the lease was out, the resource is discarded on
/// return instead of being made available again.
pub struct Lease<T: Send + Sync + 'static> {
    resource: Option<Arc<T>>,
    slot: Option<SlotId>,
    generation: u64,
    pool: Weak<PoolInner<T>>,
}

impl<T: Send + Sync + 'static> Lease<T> {
    pub(crate) fn new(
        resource: Arc<T>,
        slot: Option<SlotId>,
        generation: u64,
        pool: Weak<PoolInner<T>>,
    ) -> Self {
        Self {
            resource: Some(resource),
            slot,
            generation,
            pool,
        }
    }

    /// Shared handle to the leased resource
    pub fn resource(&self) -> &Arc<T> {
        self.resource.as_ref().expect("Resource already taken")
    }

    /// Pool generation this lease was issued against
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// `false` for one-shot resources that will never be recycled
    pub fn is_pooled(&self) -> bool {
        self.slot.is_some()
    }

    /// Take the resource out of the pool for good
    ///
    /// The slot is forgotten and the pool size shrinks by one.
    pub fn detach(mut self) -> Arc<T> {
        if let (Some(slot), Some(pool)) = (self.slot.take(), self.pool.upgrade()) {
            pool.forget(slot);
        }
        self.resource.take().expect("Resource already taken")
    }
}

impl<T: Send + Sync + 'static> Deref for Lease<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.resource()
    }
}

impl<T: Send + Sync + 'static> Drop for Lease<T> {
    fn drop(&mut self) {
        let Some(resource) = self.resource.take() else {
            return;
        };
        match self.pool.upgrade() {
            Some(pool) => pool.release(resource, self.slot, self.generation),
            None => drop(resource),
        }
    }
}

impl<T: Send + Sync + fmt::Debug + 'static> fmt::Debug for Lease<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease")
            .field("resource", &self.resource)
            .field("slot", &self.slot)
            .field("generation", &self.generation)
            .finish()
    }
}
