//! Slab cache
//!
//! A fixed-object-size cache that reuses constructed slots instead of
//! allocating and initializing fresh memory for every object.
//!
//! # Architecture
//!
//! ```text
//! SlabCache (handle, cloneable)
//!   └─→ Mutex<CacheState>
//!        ├─→ SlabPool
//!        │    ├─→ Slab 0 → [Live, Free, Live, Uninitialized, ...]
//!        │    │             payload bytes live inside each slot
//!        │    ├─→ Slab 1 → [Uninitialized, ...]
//!        │    └─→ Free list: [Slot(0,1)]
//!        └─→ ObjectRegistry
//!             └─→ id → LiveObject { payload_len, created_at, access_count, slot }
//! ```
//!
//! A slot's constructor runs once, when the slot is first carved out of a
//! slab. Freed slots go on the free list and are handed out again as-is.

pub mod cache;
pub mod pool;
pub mod registry;
pub mod slot;
pub mod stats;

pub use cache::SlabCache;
pub use pool::{Constructor, PoolStats, SlabPool};
pub use registry::{truncate_payload, LiveObject, ObjectRegistry};
pub use slot::{SlotId, SlotState};
pub use stats::{CacheSnapshot, CacheStats, ObjectSnapshot, StatsReporter};
