//! Slot arena, generation counter and population snapshots
//!
//! The store is never shared on its own: the pool wraps it in a single
//! `parking_lot::Mutex`, so every method here runs under that lock and every
//! snapshot it produces is self-consistent.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::logging::SlotId;

/// Point-in-time population of a pool
///
/// # Examples
///
/// ```
/// use esox_sharedpool::PoolState;
///
/// let state = PoolState { size: 3, available: 1 };
/// assert_eq!(state.used(), 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct PoolState {
    /// Leased plus available resources of the current generation
    pub size: usize,

    /// Resources ready to be leased
    pub available: usize,
}

impl PoolState {
    /// Resources currently leased out
    pub fn used(&self) -> usize {
        self.size - self.available
    }
}

/// [`PoolState`] plus the number of members, leased or available, currently
/// failing the health check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct PoolFullState {
    pub size: usize,
    pub available: usize,
    pub unhealthy: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SlotStatus {
    Available,
    Leased,
}

pub(crate) struct Slot<T> {
    resource: Arc<T>,
    generation: u64,
    status: SlotStatus,
}

/// Outcome of handing a leased resource back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Release {
    Recycled,
    Discarded,
}

pub(crate) struct SlotStore<T> {
    generation: u64,
    next_id: u64,
    slots: HashMap<SlotId, Slot<T>>,
    /// Available slots, oldest first
    available: VecDeque<SlotId>,
}

impl<T> SlotStore<T> {
    pub fn new() -> Self {
        Self {
            generation: 0,
            next_id: 0,
            slots: HashMap::new(),
            available: VecDeque::new(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn state(&self) -> PoolState {
        PoolState {
            size: self.slots.len(),
            available: self.available.len(),
        }
    }

    /// State plus a handle to every member of the current generation
    pub fn members(&self) -> (PoolState, Vec<Arc<T>>) {
        let members = self
            .slots
            .values()
            .map(|slot| Arc::clone(&slot.resource))
            .collect();
        (self.state(), members)
    }

    fn insert(&mut self, resource: Arc<T>, status: SlotStatus) -> SlotId {
        let id = SlotId(self.next_id);
        self.next_id += 1;
        self.slots.insert(
            id,
            Slot {
                resource,
                generation: self.generation,
                status,
            },
        );
        if status == SlotStatus::Available {
            self.available.push_back(id);
        }
        id
    }

    /// Admit a freshly created resource that is already leased out.
    ///
    /// Returns `None` when `generation` is no longer current.
    pub fn admit_leased(&mut self, resource: Arc<T>, generation: u64) -> Option<SlotId> {
        if generation != self.generation {
            return None;
        }
        Some(self.insert(resource, SlotStatus::Leased))
    }

    /// Admit a batch of new available resources created against `generation`.
    ///
    /// On a generation mismatch the whole batch is handed back so the caller
    /// can drop it outside the lock.
    pub fn admit_available(
        &mut self,
        resources: Vec<Arc<T>>,
        generation: u64,
    ) -> Result<usize, Vec<Arc<T>>> {
        if generation != self.generation {
            return Err(resources);
        }
        let count = resources.len();
        for resource in resources {
            self.insert(resource, SlotStatus::Available);
        }
        Ok(count)
    }

    /// Lease the most recently returned available slot
    pub fn claim(&mut self) -> Option<(SlotId, Arc<T>, u64)> {
        let id = self.available.pop_back()?;
        let slot = self.slots.get_mut(&id)?;
        slot.status = SlotStatus::Leased;
        Some((id, Arc::clone(&slot.resource), self.generation))
    }

    /// Hand a leased slot back, recycling it only if it belongs to the
    /// current generation and is still known to the store
    pub fn release(&mut self, id: SlotId, generation: u64) -> Release {
        if generation != self.generation {
            return Release::Discarded;
        }
        match self.slots.get_mut(&id) {
            Some(slot) if slot.status == SlotStatus::Leased && slot.generation == generation => {
                slot.status = SlotStatus::Available;
                self.available.push_back(id);
                Release::Recycled
            }
            _ => Release::Discarded,
        }
    }

    /// Remove a slot whatever its status; a leased one is discarded when its
    /// lease comes back
    pub fn remove(&mut self, id: SlotId) -> Option<Arc<T>> {
        let slot = self.slots.remove(&id)?;
        if slot.status == SlotStatus::Available {
            self.available.retain(|candidate| *candidate != id);
        }
        Some(slot.resource)
    }

    /// Strong handle to a slot that is still available
    pub fn lock_available(&self, id: SlotId) -> Option<Arc<T>> {
        self.slots
            .get(&id)
            .filter(|slot| slot.status == SlotStatus::Available)
            .map(|slot| Arc::clone(&slot.resource))
    }

    pub fn available_ids(&self) -> Vec<SlotId> {
        self.available.iter().copied().collect()
    }

    /// Remove up to `count` of the longest idle available slots
    pub fn dispose(&mut self, count: usize) -> Vec<Arc<T>> {
        let mut disposed = Vec::with_capacity(count.min(self.available.len()));
        while disposed.len() < count {
            let Some(id) = self.available.pop_front() else {
                break;
            };
            if let Some(slot) = self.slots.remove(&id) {
                disposed.push(slot.resource);
            }
        }
        disposed
    }

    /// Start a new generation and forget every slot.
    ///
    /// Returns the new generation and the available resources, which the
    /// caller drops outside the lock. Leased resources are reclaimed by their
    /// leases.
    pub fn clear(&mut self) -> (u64, Vec<Arc<T>>) {
        self.generation += 1;
        let mut dropped = Vec::with_capacity(self.available.len());
        for (_, slot) in self.slots.drain() {
            if slot.status == SlotStatus::Available {
                dropped.push(slot.resource);
            }
        }
        self.available.clear();
        (self.generation, dropped)
    }
}
