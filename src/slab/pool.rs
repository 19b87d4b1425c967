//! Slab pool: fixed-size slot storage with construct-once reuse

use super::slot::{SlotId, SlotState};
use crate::error::{Error, Result};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One-time initializer run over a slot's bytes when it is first carved
pub type Constructor = Arc<dyn Fn(&mut [u8]) + Send + Sync>;

/// A contiguous region of backing storage split into equal slots
struct Slab {
    memory: Vec<u8>,
    states: Vec<SlotState>,
    /// Slots handed out at least once; everything past this is uninitialized
    carved: usize,
}

impl Slab {
    fn new(slot_count: usize, object_size: usize) -> Result<Self> {
        let bytes = slot_count.checked_mul(object_size).ok_or_else(|| {
            Error::ResourceExhausted(format!(
                "Slab of {} x {} bytes overflows address space",
                slot_count, object_size
            ))
        })?;

        let mut memory = Vec::new();
        memory.try_reserve_exact(bytes).map_err(|e| {
            Error::ResourceExhausted(format!("Failed to reserve {} bytes: {}", bytes, e))
        })?;
        memory.resize(bytes, 0);

        Ok(Self {
            memory,
            states: vec![SlotState::Uninitialized; slot_count],
            carved: 0,
        })
    }

    fn has_uncarved(&self) -> bool {
        self.carved < self.states.len()
    }
}

/// Slab pool
///
/// Hands out fixed-size slots. Reclaimed slots are reused LIFO without
/// running the constructor again; a slot is only constructed the first
/// time it is carved out of a slab.
pub struct SlabPool {
    name: String,
    object_size: usize,
    slots_per_slab: usize,
    max_slabs: Option<usize>,
    constructor: Constructor,
    slabs: Vec<Slab>,
    /// Reclaimed (constructed, not live) slots
    free_slots: Vec<SlotId>,
    live: usize,
    constructor_calls: u64,
    destroyed: bool,
}

impl SlabPool {
    /// Create a new pool
    ///
    /// No backing storage is reserved until the first allocation.
    pub fn new(
        name: impl Into<String>,
        object_size: usize,
        slots_per_slab: usize,
        max_slabs: Option<usize>,
        constructor: Constructor,
    ) -> Result<Self> {
        let name = name.into();
        if object_size == 0 {
            return Err(Error::InvalidConfig("object_size must be > 0".to_string()));
        }
        if slots_per_slab == 0 || slots_per_slab > u32::MAX as usize {
            return Err(Error::InvalidConfig(format!(
                "slots_per_slab must be in 1..={}",
                u32::MAX
            )));
        }

        info!(
            cache = %name,
            object_size,
            slots_per_slab,
            ?max_slabs,
            "Initializing slab pool"
        );

        Ok(Self {
            name,
            object_size,
            slots_per_slab,
            max_slabs,
            constructor,
            slabs: Vec::new(),
            free_slots: Vec::new(),
            live: 0,
            constructor_calls: 0,
            destroyed: false,
        })
    }

    /// Allocate a slot
    ///
    /// Prefers a reclaimed slot, then an uncarved slot of the newest slab,
    /// and only grows backing storage when neither exists.
    pub fn allocate(&mut self) -> Result<SlotId> {
        self.ensure_open()?;

        if let Some(slot_id) = self.free_slots.pop() {
            self.set_state(slot_id, SlotState::Live);
            self.live += 1;
            debug!("Reused {}", slot_id);
            return Ok(slot_id);
        }

        let needs_slab = self.slabs.last().map_or(true, |slab| !slab.has_uncarved());
        if needs_slab {
            self.grow()?;
        }

        let slot_id = self.carve()?;
        self.set_state(slot_id, SlotState::Live);
        self.live += 1;
        debug!("Carved {}", slot_id);
        Ok(slot_id)
    }

    /// Return a live slot to the free list
    ///
    /// The destructor is not run: the slot keeps whatever its constructor
    /// (and previous occupants) left in it. Returns `false` if the slot was
    /// not live.
    pub fn release(&mut self, slot_id: SlotId) -> bool {
        if self.state(slot_id) != Some(SlotState::Live) {
            warn!(cache = %self.name, "Release of non-live {}", slot_id);
            return false;
        }

        self.set_state(slot_id, SlotState::Free);
        self.free_slots.push(slot_id);
        self.live -= 1;
        debug!("Released {}", slot_id);
        true
    }

    /// Tear down the pool and drop all backing storage
    ///
    /// Fails with `CacheBusy` while any slot is live; the pool stays usable
    /// in that case.
    pub fn destroy(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.live > 0 {
            return Err(Error::CacheBusy(self.live));
        }

        let released: usize = self.slabs.iter().map(|slab| slab.memory.len()).sum();
        self.slabs = Vec::new();
        self.free_slots = Vec::new();
        self.destroyed = true;

        info!(cache = %self.name, bytes = released, "Slab pool destroyed");
        Ok(())
    }

    /// Current state of a slot, if it exists
    pub fn state(&self, slot_id: SlotId) -> Option<SlotState> {
        self.slabs
            .get(slot_id.slab as usize)
            .and_then(|slab| slab.states.get(slot_id.index as usize))
            .copied()
    }

    /// Bytes backing a constructed slot
    pub fn slot_bytes(&self, slot_id: SlotId) -> Option<&[u8]> {
        match self.state(slot_id)? {
            SlotState::Uninitialized => None,
            _ => {
                let start = slot_id.byte_offset(self.object_size);
                let slab = &self.slabs[slot_id.slab as usize];
                Some(&slab.memory[start..start + self.object_size])
            }
        }
    }

    /// Mutable bytes backing a live slot
    pub fn slot_bytes_mut(&mut self, slot_id: SlotId) -> Option<&mut [u8]> {
        if self.state(slot_id)? != SlotState::Live {
            return None;
        }
        let start = slot_id.byte_offset(self.object_size);
        let slab = &mut self.slabs[slot_id.slab as usize];
        Some(&mut slab.memory[start..start + self.object_size])
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn object_size(&self) -> usize {
        self.object_size
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Get statistics about the pool
    pub fn stats(&self) -> PoolStats {
        let constructed: usize = self.slabs.iter().map(|slab| slab.carved).sum();
        PoolStats {
            slabs: self.slabs.len(),
            total_slots: self.slabs.len() * self.slots_per_slab,
            constructed_slots: constructed,
            free_slots: self.free_slots.len(),
            live_slots: self.live,
            constructor_calls: self.constructor_calls,
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.destroyed {
            return Err(Error::CacheDestroyed(self.name.clone()));
        }
        Ok(())
    }

    /// Reserve a new slab of uninitialized slots
    fn grow(&mut self) -> Result<()> {
        if let Some(max) = self.max_slabs {
            if self.slabs.len() >= max {
                return Err(Error::ResourceExhausted(format!(
                    "Cache '{}' reached its limit of {} slabs",
                    self.name, max
                )));
            }
        }
        if self.slabs.len() >= u32::MAX as usize {
            return Err(Error::ResourceExhausted("Slab index space exhausted".to_string()));
        }

        let slab = Slab::new(self.slots_per_slab, self.object_size)?;
        self.slabs.push(slab);
        crate::metrics::SLABS_CARVED
            .with_label_values(&[self.name.as_str()])
            .inc();

        info!(
            cache = %self.name,
            slab = self.slabs.len() - 1,
            bytes = self.slots_per_slab * self.object_size,
            "Carved new slab"
        );
        Ok(())
    }

    /// Take the next uninitialized slot of the newest slab and construct it
    fn carve(&mut self) -> Result<SlotId> {
        let slab_idx = self.slabs.len().checked_sub(1).ok_or_else(|| {
            Error::ResourceExhausted("No slab available to carve from".to_string())
        })?;
        let object_size = self.object_size;
        let constructor = self.constructor.as_ref();
        let slab = &mut self.slabs[slab_idx];

        let index = slab.carved;
        let start = index * object_size;
        constructor(&mut slab.memory[start..start + object_size]);
        slab.carved += 1;
        self.constructor_calls += 1;

        let slot_id = SlotId::new(slab_idx as u32, index as u32);
        self.set_state(slot_id, SlotState::Free);
        Ok(slot_id)
    }

    fn set_state(&mut self, slot_id: SlotId, next: SlotState) {
        let slab = &mut self.slabs[slot_id.slab as usize];
        let state = &mut slab.states[slot_id.index as usize];
        debug_assert!(
            state.can_transition_to(next),
            "illegal slot transition {:?} -> {:?}",
            state,
            next
        );
        *state = next;
    }
}

impl fmt::Debug for SlabPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlabPool")
            .field("name", &self.name)
            .field("object_size", &self.object_size)
            .field("slots_per_slab", &self.slots_per_slab)
            .field("max_slabs", &self.max_slabs)
            .field("stats", &self.stats())
            .field("destroyed", &self.destroyed)
            .finish()
    }
}

/// Statistics for the slab pool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub slabs: usize,
    pub total_slots: usize,
    pub constructed_slots: usize,
    pub free_slots: usize,
    pub live_slots: usize,
    pub constructor_calls: u64,
}
