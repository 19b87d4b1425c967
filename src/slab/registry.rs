//! Object registry - identity and metadata for live objects

use super::pool::SlabPool;
use super::slot::SlotId;
use super::stats::ObjectSnapshot;
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::debug;

/// A live object tracked by the registry
#[derive(Debug, Clone)]
pub struct LiveObject {
    /// Identifier, unique for the lifetime of the cache
    pub id: u64,
    /// Bytes of payload stored at the start of the slot
    pub payload_len: usize,
    /// Monotonic creation time
    pub created_at: Instant,
    /// Number of `touch` calls since creation
    pub access_count: u64,
    /// Backing slot in the pool
    pub slot: SlotId,
}

impl LiveObject {
    /// Payload text read back from the backing slot
    pub fn payload(&self, pool: &SlabPool) -> String {
        pool.slot_bytes(self.slot)
            .and_then(|bytes| bytes.get(..self.payload_len))
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .unwrap_or_default()
    }

    /// Listing row as of `now`
    pub fn snapshot(&self, pool: &SlabPool, now: Instant) -> ObjectSnapshot {
        ObjectSnapshot {
            id: self.id,
            payload: self.payload(pool),
            age_ms: now.saturating_duration_since(self.created_at).as_millis() as u64,
            access_count: self.access_count,
        }
    }
}

/// Object registry
///
/// Keyed by id in a `BTreeMap` so listings come out in a stable order.
/// Ids come from a counter that is never reset, so a freed id is never
/// handed out again.
#[derive(Debug)]
pub struct ObjectRegistry {
    objects: BTreeMap<u64, LiveObject>,
    next_id: u64,
    max_payload_len: usize,
    total_allocated: u64,
    total_freed: u64,
}

impl ObjectRegistry {
    pub fn new(max_payload_len: usize) -> Self {
        Self {
            objects: BTreeMap::new(),
            next_id: 0,
            max_payload_len,
            total_allocated: 0,
            total_freed: 0,
        }
    }

    /// Create a live object backed by a fresh slot
    ///
    /// The payload is truncated to fit both the configured maximum and the
    /// slot, then copied into the slot followed by a NUL byte when there is
    /// room. Nothing is consumed (slot or id) when the pool cannot allocate.
    pub fn create(&mut self, pool: &mut SlabPool, payload: &str) -> Result<u64> {
        let id = self.next_id;
        let next_id = id
            .checked_add(1)
            .ok_or_else(|| Error::ResourceExhausted("Object id space exhausted".to_string()))?;

        let limit = self.max_payload_len.min(pool.object_size());
        let payload = truncate_payload(payload, limit);

        let slot = pool.allocate()?;
        let Some(bytes) = pool.slot_bytes_mut(slot) else {
            pool.release(slot);
            return Err(Error::ResourceExhausted(format!("{} is not writable", slot)));
        };
        bytes[..payload.len()].copy_from_slice(payload.as_bytes());
        if let Some(terminator) = bytes.get_mut(payload.len()) {
            *terminator = 0;
        }

        self.next_id = next_id;
        self.objects.insert(
            id,
            LiveObject {
                id,
                payload_len: payload.len(),
                created_at: Instant::now(),
                access_count: 0,
                slot,
            },
        );
        self.total_allocated += 1;

        debug!(id, %slot, payload_len = payload.len(), "Created object");
        Ok(id)
    }

    /// Free a live object and release its slot
    pub fn free(&mut self, pool: &mut SlabPool, id: u64) -> Result<LiveObject> {
        let object = self.objects.remove(&id).ok_or(Error::NotFound(id))?;
        pool.release(object.slot);
        self.total_freed += 1;

        debug!(id, slot = %object.slot, "Freed object");
        Ok(object)
    }

    /// Record an access, returning the new access count
    pub fn touch(&mut self, id: u64) -> Result<u64> {
        let object = self.objects.get_mut(&id).ok_or(Error::NotFound(id))?;
        object.access_count += 1;
        Ok(object.access_count)
    }

    /// Free every live object, returning how many were removed
    pub fn free_all(&mut self, pool: &mut SlabPool) -> usize {
        let objects = std::mem::take(&mut self.objects);
        let count = objects.len();

        for object in objects.into_values() {
            pool.release(object.slot);
        }
        self.total_freed += count as u64;

        debug!(count, "Freed all objects");
        count
    }

    /// Look up a live object
    pub fn get(&self, id: u64) -> Option<&LiveObject> {
        self.objects.get(&id)
    }

    /// Live objects, most recently created first
    pub fn list(&self) -> Vec<LiveObject> {
        self.objects.values().rev().cloned().collect()
    }

    /// Iterate live objects, most recently created first
    pub fn iter(&self) -> impl Iterator<Item = &LiveObject> {
        self.objects.values().rev()
    }

    /// Listing rows with payloads read from `pool`, most recent first
    pub fn snapshots(&self, pool: &SlabPool, now: Instant) -> Vec<ObjectSnapshot> {
        self.iter().map(|object| object.snapshot(pool, now)).collect()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn total_allocated(&self) -> u64 {
        self.total_allocated
    }

    pub fn total_freed(&self) -> u64 {
        self.total_freed
    }

    /// Id the next successful `create` will assign
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    pub fn max_payload_len(&self) -> usize {
        self.max_payload_len
    }
}

/// Cut `payload` to at most `max_len` bytes without splitting a character
pub fn truncate_payload(payload: &str, max_len: usize) -> &str {
    if payload.len() <= max_len {
        return payload;
    }
    let mut end = max_len;
    while !payload.is_char_boundary(end) {
        end -= 1;
    }
    &payload[..end]
}
