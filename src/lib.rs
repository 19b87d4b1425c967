// slabcache - fixed-object-size slab cache
// Object pool with construct-once slots and a line-oriented control protocol

#![warn(rust_2018_idioms)]

pub mod command;
pub mod config;
pub mod metrics;
pub mod network;
pub mod slab;

// Re-exports for convenience
pub use command::{CommandProcessor, Request, Response};
pub use config::{CacheConfig, Config, ServerConfig};
pub use slab::{CacheSnapshot, CacheStats, SlabCache};

/// Slab cache error types
pub mod error {
    use thiserror::Error;

    /// Coarse classification of an [`Error`], with a stable wire code.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum ErrorKind {
        Parse,
        NotFound,
        ResourceExhausted,
        CacheBusy,
        CacheDestroyed,
        InvalidConfig,
        Io,
    }

    impl ErrorKind {
        pub fn code(self) -> &'static str {
            match self {
                ErrorKind::Parse => "parse",
                ErrorKind::NotFound => "not_found",
                ErrorKind::ResourceExhausted => "resource_exhausted",
                ErrorKind::CacheBusy => "cache_busy",
                ErrorKind::CacheDestroyed => "cache_destroyed",
                ErrorKind::InvalidConfig => "invalid_config",
                ErrorKind::Io => "io",
            }
        }
    }

    #[derive(Error, Debug)]
    pub enum Error {
        #[error("Parse error: {0}")]
        Parse(String),

        #[error("Object {0} not found")]
        NotFound(u64),

        #[error("Resource exhausted: {0}")]
        ResourceExhausted(String),

        #[error("Cache busy: {0} objects still live")]
        CacheBusy(usize),

        #[error("Cache '{0}' has been destroyed")]
        CacheDestroyed(String),

        #[error("Invalid config: {0}")]
        InvalidConfig(String),

        #[error("I/O error: {0}")]
        Io(#[from] std::io::Error),
    }

    impl Error {
        pub fn parse(message: impl Into<String>) -> Self {
            Error::Parse(message.into())
        }

        pub fn kind(&self) -> ErrorKind {
            match self {
                Error::Parse(_) => ErrorKind::Parse,
                Error::NotFound(_) => ErrorKind::NotFound,
                Error::ResourceExhausted(_) => ErrorKind::ResourceExhausted,
                Error::CacheBusy(_) => ErrorKind::CacheBusy,
                Error::CacheDestroyed(_) => ErrorKind::CacheDestroyed,
                Error::InvalidConfig(_) => ErrorKind::InvalidConfig,
                Error::Io(_) => ErrorKind::Io,
            }
        }
    }

    pub type Result<T> = std::result::Result<T, Error>;
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
