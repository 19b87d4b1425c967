//! Configuration
//!
//! Loaded from TOML. Every field has a default, so an empty file (or no
//! file at all) yields a working setup. Payloads are stored inside their
//! slot, so `max_payload_len` may not exceed `object_size`:
//!
//! ```toml
//! [cache]
//! name = "demo_objects"
//! object_size = 128
//! slots_per_slab = 32
//! max_payload_len = 63
//! # max_slabs = 16
//!
//! [server]
//! bind_addr = "127.0.0.1:7070"
//! max_connections = 64
//! ```

use crate::error::{Error, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cache: CacheConfig,
    pub server: ServerConfig,
}

impl Config {
    /// Load and validate a TOML config file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text).map_err(|e| match e {
            Error::InvalidConfig(msg) => {
                Error::InvalidConfig(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    /// Parse and validate TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(text).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.cache.validate()?;
        self.server.validate()
    }
}

/// Cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache name shown in reports
    pub name: String,
    /// Size of every slot in bytes
    pub object_size: usize,
    /// Slots reserved per slab when backing storage grows
    pub slots_per_slab: usize,
    /// Upper bound on slabs (None = unbounded)
    pub max_slabs: Option<usize>,
    /// Longer payloads are truncated to this many bytes
    pub max_payload_len: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            name: "demo_objects".to_string(),
            object_size: 128,
            slots_per_slab: 32,
            max_slabs: None,
            max_payload_len: 63,
        }
    }
}

impl CacheConfig {
    /// Default settings with the given name and object size
    ///
    /// The payload limit is lowered to `object_size` for small objects.
    pub fn new(name: impl Into<String>, object_size: usize) -> Self {
        let defaults = Self::default();
        Self {
            name: name.into(),
            object_size,
            max_payload_len: defaults.max_payload_len.min(object_size),
            ..defaults
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidConfig("cache name must not be empty".to_string()));
        }
        if self.object_size == 0 {
            return Err(Error::InvalidConfig("object_size must be > 0".to_string()));
        }
        if self.slots_per_slab == 0 || self.slots_per_slab > u32::MAX as usize {
            return Err(Error::InvalidConfig(format!(
                "slots_per_slab must be in 1..={}",
                u32::MAX
            )));
        }
        if self.max_slabs == Some(0) {
            return Err(Error::InvalidConfig("max_slabs must be > 0".to_string()));
        }
        if self.max_payload_len == 0 {
            return Err(Error::InvalidConfig("max_payload_len must be > 0".to_string()));
        }
        if self.max_payload_len > self.object_size {
            return Err(Error::InvalidConfig(format!(
                "max_payload_len ({}) exceeds object_size ({})",
                self.max_payload_len, self.object_size
            )));
        }
        Ok(())
    }
}

/// TCP line server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub bind_addr: SocketAddr,

    /// Maximum concurrent connections
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 7070)),
            max_connections: 64,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(Error::InvalidConfig("max_connections must be > 0".to_string()));
        }
        Ok(())
    }
}
