//! Slab cache handle
//!
//! A `SlabCache` is a cheap, cloneable handle to one cache instance. The
//! pool and the registry sit behind a single mutex, so every operation is
//! linearizable and a failed operation leaves no partial mutation behind.

use super::pool::{Constructor, PoolStats, SlabPool};
use super::registry::ObjectRegistry;
use super::stats::{CacheSnapshot, CacheStats, ObjectSnapshot};
use crate::config::CacheConfig;
use crate::error::{Error, Result};
use crate::metrics;
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

struct CacheState {
    pool: SlabPool,
    registry: ObjectRegistry,
}

impl CacheState {
    fn ensure_open(&self) -> Result<()> {
        if self.pool.is_destroyed() {
            return Err(Error::CacheDestroyed(self.pool.name().to_string()));
        }
        Ok(())
    }

    fn stats(&self) -> CacheStats {
        CacheStats::new(
            self.pool.object_size(),
            self.registry.total_allocated(),
            self.registry.total_freed(),
        )
    }
}

struct CacheInner {
    config: CacheConfig,
    state: Mutex<CacheState>,
}

/// Handle to a slab cache instance
#[derive(Clone)]
pub struct SlabCache {
    inner: Arc<CacheInner>,
}

impl SlabCache {
    /// Open a cache with default settings and the given constructor
    pub fn open<F>(name: &str, object_size: usize, constructor: F) -> Result<Self>
    where
        F: Fn(&mut [u8]) + Send + Sync + 'static,
    {
        Self::with_config(CacheConfig::new(name, object_size), Arc::new(constructor))
    }

    /// Open a cache whose slots are left zeroed on construction
    pub fn from_config(config: CacheConfig) -> Result<Self> {
        Self::with_config(config, Arc::new(|_: &mut [u8]| {}))
    }

    /// Open a cache from a full configuration
    pub fn with_config(config: CacheConfig, constructor: Constructor) -> Result<Self> {
        config.validate()?;

        let pool = SlabPool::new(
            config.name.clone(),
            config.object_size,
            config.slots_per_slab,
            config.max_slabs,
            constructor,
        )?;
        let registry = ObjectRegistry::new(config.max_payload_len);

        info!(cache = %config.name, object_size = config.object_size, "Cache created");
        metrics::ACTIVE_OBJECTS
            .with_label_values(&[config.name.as_str()])
            .set(0);

        Ok(Self {
            inner: Arc::new(CacheInner {
                config,
                state: Mutex::new(CacheState { pool, registry }),
            }),
        })
    }

    /// Allocate a new object holding `payload`, returning its id
    pub fn alloc(&self, payload: &str) -> Result<u64> {
        let mut state = self.lock();
        state.ensure_open()?;

        let CacheState { pool, registry } = &mut *state;
        let id = registry.create(pool, payload)?;
        self.publish_active(&state);

        info!(cache = %self.name(), id, "Allocated object");
        Ok(id)
    }

    /// Free a live object
    pub fn free(&self, id: u64) -> Result<()> {
        let mut state = self.lock();
        state.ensure_open()?;

        let CacheState { pool, registry } = &mut *state;
        registry.free(pool, id)?;
        self.publish_active(&state);

        info!(cache = %self.name(), id, "Freed object");
        Ok(())
    }

    /// Increment an object's access count, returning the new count
    pub fn touch(&self, id: u64) -> Result<u64> {
        let mut state = self.lock();
        state.ensure_open()?;

        let count = state.registry.touch(id)?;
        debug!(cache = %self.name(), id, count, "Accessed object");
        Ok(count)
    }

    /// Free every live object, returning how many were freed
    pub fn free_all(&self) -> Result<usize> {
        let mut state = self.lock();
        state.ensure_open()?;

        let CacheState { pool, registry } = &mut *state;
        let count = registry.free_all(pool);
        self.publish_active(&state);

        info!(cache = %self.name(), count, "Freed all objects");
        Ok(count)
    }

    /// Aggregate counters
    pub fn stats(&self) -> Result<CacheStats> {
        let state = self.lock();
        state.ensure_open()?;
        Ok(state.stats())
    }

    /// Pool-level counters
    pub fn pool_stats(&self) -> Result<PoolStats> {
        let state = self.lock();
        state.ensure_open()?;
        Ok(state.pool.stats())
    }

    /// Live objects with payloads read from their slots, most recent first
    pub fn list(&self) -> Result<Vec<ObjectSnapshot>> {
        let state = self.lock();
        state.ensure_open()?;
        Ok(state.registry.snapshots(&state.pool, Instant::now()))
    }

    /// Consistent point-in-time view for reporting
    pub fn snapshot(&self) -> Result<CacheSnapshot> {
        let state = self.lock();
        state.ensure_open()?;

        Ok(CacheSnapshot::capture(
            self.name(),
            state.stats(),
            state.pool.stats(),
            state.registry.snapshots(&state.pool, Instant::now()),
        ))
    }

    /// Run `f` over the bytes of a live object's slot
    pub fn with_object_bytes<R>(&self, id: u64, f: impl FnOnce(&mut [u8]) -> R) -> Result<R> {
        let mut state = self.lock();
        state.ensure_open()?;

        let slot = state.registry.get(id).ok_or(Error::NotFound(id))?.slot;
        let bytes = state.pool.slot_bytes_mut(slot).ok_or(Error::NotFound(id))?;
        Ok(f(bytes))
    }

    /// Destroy the cache
    ///
    /// Fails with `CacheBusy` while objects are live; the cache stays fully
    /// usable in that case. Afterwards every operation fails with
    /// `CacheDestroyed`.
    pub fn close(&self) -> Result<()> {
        let mut state = self.lock();
        state.pool.destroy()?;

        metrics::forget_cache(self.name());
        info!(cache = %self.name(), "Cache destroyed");
        Ok(())
    }

    pub fn is_destroyed(&self) -> bool {
        self.lock().pool.is_destroyed()
    }

    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    pub fn object_size(&self) -> usize {
        self.inner.config.object_size
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.inner.state.lock()
    }

    fn publish_active(&self, state: &CacheState) {
        metrics::ACTIVE_OBJECTS
            .with_label_values(&[self.name()])
            .set(state.registry.len() as i64);
    }
}

impl std::fmt::Debug for SlabCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlabCache")
            .field("name", &self.name())
            .field("object_size", &self.object_size())
            .finish()
    }
}
