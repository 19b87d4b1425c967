//! Cache statistics and report rendering
//!
//! Reports are rendered from a [`CacheSnapshot`] captured under the cache
//! lock, so formatting never holds the lock and always reflects a single
//! point in time.

use super::pool::PoolStats;
use serde::Serialize;
use std::fmt::{self, Write};

/// Aggregate cache counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub object_size: usize,
    pub total_allocated: u64,
    pub total_freed: u64,
    /// Always `total_allocated - total_freed`
    pub active_count: u64,
}

impl CacheStats {
    pub fn new(object_size: usize, total_allocated: u64, total_freed: u64) -> Self {
        Self {
            object_size,
            total_allocated,
            total_freed,
            active_count: total_allocated - total_freed,
        }
    }
}

/// One row of the live-object listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectSnapshot {
    pub id: u64,
    pub payload: String,
    pub age_ms: u64,
    pub access_count: u64,
}

/// Point-in-time view of a cache
#[derive(Debug, Clone, Serialize)]
pub struct CacheSnapshot {
    pub name: String,
    pub stats: CacheStats,
    pub pool: PoolStats,
    /// Most recently created first
    pub objects: Vec<ObjectSnapshot>,
}

impl CacheSnapshot {
    /// Build a snapshot from rows already in listing order
    pub fn capture(
        name: &str,
        stats: CacheStats,
        pool: PoolStats,
        objects: impl IntoIterator<Item = ObjectSnapshot>,
    ) -> Self {
        Self {
            name: name.to_string(),
            stats,
            pool,
            objects: objects.into_iter().collect(),
        }
    }

    /// Ids in listing order
    pub fn ids(&self) -> Vec<u64> {
        self.objects.iter().map(|o| o.id).collect()
    }
}

impl fmt::Display for CacheSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&StatsReporter::render(self))
    }
}

/// Renders cache snapshots for humans and tools
pub struct StatsReporter;

impl StatsReporter {
    /// Plain-text report
    pub fn render(snapshot: &CacheSnapshot) -> String {
        let mut out = String::new();
        // Writing to a String cannot fail
        let _ = Self::write_report(&mut out, snapshot);
        out
    }

    /// Pretty JSON report
    pub fn render_json(snapshot: &CacheSnapshot) -> serde_json::Result<String> {
        serde_json::to_string_pretty(snapshot)
    }

    /// Command summary appended to reports and returned by `help`
    pub fn command_help() -> &'static str {
        "Commands:\n\
         \x20 alloc <data> - Allocate new object\n\
         \x20 free <id>    - Free object by ID\n\
         \x20 access <id>  - Increment access count\n\
         \x20 freeall      - Free all objects\n\
         \x20 stats        - Show this report\n"
    }

    fn write_report(out: &mut String, snapshot: &CacheSnapshot) -> fmt::Result {
        let stats = &snapshot.stats;
        let pool = &snapshot.pool;

        writeln!(out, "Slab Cache Statistics")?;
        writeln!(out, "=====================")?;
        writeln!(out)?;
        writeln!(out, "Cache name: {}", snapshot.name)?;
        writeln!(out, "Object size: {} bytes", stats.object_size)?;
        writeln!(out, "Total allocated: {}", stats.total_allocated)?;
        writeln!(out, "Total freed: {}", stats.total_freed)?;
        writeln!(out, "Currently active: {}", stats.active_count)?;
        writeln!(
            out,
            "Slabs: {} ({} slots, {} constructed, {} free)",
            pool.slabs, pool.total_slots, pool.constructed_slots, pool.free_slots
        )?;

        writeln!(out)?;
        writeln!(out, "Active Objects:")?;
        if snapshot.objects.is_empty() {
            writeln!(out, "  (none)")?;
        }
        for object in &snapshot.objects {
            writeln!(
                out,
                "  [{}] data='{}' age={} ms accesses={}",
                object.id, object.payload, object.age_ms, object.access_count
            )?;
        }

        writeln!(out)?;
        out.push_str(Self::command_help());
        Ok(())
    }
}
