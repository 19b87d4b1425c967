//! Prometheus metrics for cache activity
//!
//! - Command counts by command and outcome
//! - Live objects per cache
//! - Slabs carved per cache

use prometheus::{Encoder, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};
use std::sync::Once;
use tracing::{error, info};

lazy_static::lazy_static! {
    /// Global metrics registry
    pub static ref METRICS_REGISTRY: Registry = Registry::new();

    pub static ref COMMANDS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("slabcache_commands_total", "Total control commands handled"),
        &["command", "status"]
    ).unwrap();

    pub static ref ACTIVE_OBJECTS: IntGaugeVec = IntGaugeVec::new(
        Opts::new("slabcache_active_objects", "Objects currently live"),
        &["cache"]
    ).unwrap();

    pub static ref SLABS_CARVED: IntCounterVec = IntCounterVec::new(
        Opts::new("slabcache_slabs_carved_total", "Slabs carved from backing storage"),
        &["cache"]
    ).unwrap();
}

static INIT: Once = Once::new();

/// Register all metrics with the global registry
pub fn init_metrics() {
    INIT.call_once(|| {
        info!("Initializing Prometheus metrics");

        METRICS_REGISTRY.register(Box::new(COMMANDS_TOTAL.clone())).ok();
        METRICS_REGISTRY.register(Box::new(ACTIVE_OBJECTS.clone())).ok();
        METRICS_REGISTRY.register(Box::new(SLABS_CARVED.clone())).ok();
    });
}

/// Count one handled command
pub fn record_command(command: &str, success: bool) {
    let status = if success { "success" } else { "error" };
    COMMANDS_TOTAL.with_label_values(&[command, status]).inc();
}

/// Drop the per-cache series of a destroyed cache
pub fn forget_cache(name: &str) {
    // Missing series only means nothing was ever recorded for this cache
    let _ = ACTIVE_OBJECTS.remove_label_values(&[name]);
    let _ = SLABS_CARVED.remove_label_values(&[name]);
}

/// Export all metrics in Prometheus text format
pub fn export_metrics() -> String {
    init_metrics();

    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|_| String::from("# Error converting metrics\n"))
}
