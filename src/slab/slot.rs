//! Slot identity and lifecycle for the slab pool

use serde::Serialize;
use std::fmt;

/// Location of a slot inside the pool's backing storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SlotId {
    /// Slab index (order in which slabs were carved)
    pub slab: u32,
    /// Slot index within the slab
    pub index: u32,
}

impl SlotId {
    /// Create a new slot ID
    pub fn new(slab: u32, index: u32) -> Self {
        Self { slab, index }
    }

    /// Byte offset of this slot inside its slab
    pub fn byte_offset(&self, object_size: usize) -> usize {
        self.index as usize * object_size
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Slot(slab={}, index={})", self.slab, self.index)
    }
}

/// Lifecycle state of a slot
///
/// A slot leaves `Uninitialized` exactly once, when its constructor runs.
/// After that it only cycles between `Free` and `Live`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SlotState {
    Uninitialized,
    Free,
    Live,
}

impl SlotState {
    /// Whether moving from `self` to `next` is a legal transition
    pub fn can_transition_to(self, next: SlotState) -> bool {
        matches!(
            (self, next),
            (SlotState::Uninitialized, SlotState::Free)
                | (SlotState::Free, SlotState::Live)
                | (SlotState::Live, SlotState::Free)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_id_offset() {
        let id = SlotId::new(2, 5);
        assert_eq!(id.slab, 2);
        assert_eq!(id.index, 5);
        assert_eq!(id.byte_offset(64), 320);
        assert_eq!(id.to_string(), "Slot(slab=2, index=5)");
    }

    #[test]
    fn test_slot_transitions() {
        use SlotState::*;

        assert!(Uninitialized.can_transition_to(Free));
        assert!(Free.can_transition_to(Live));
        assert!(Live.can_transition_to(Free));

        // Construction happens once, and never straight to Live
        assert!(!Free.can_transition_to(Uninitialized));
        assert!(!Live.can_transition_to(Uninitialized));
        assert!(!Uninitialized.can_transition_to(Live));
        assert!(!Live.can_transition_to(Live));
    }
}
