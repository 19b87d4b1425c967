//! Command processor - request/response dispatch over a slab cache

use super::parser::Request;
use crate::error::{Error, Result};
use crate::metrics;
use crate::slab::{CacheSnapshot, SlabCache, StatsReporter};
use std::fmt;
use tracing::{debug, warn};

/// Successful outcome of a request
#[derive(Debug, Clone)]
pub enum Response {
    /// New object id
    Allocated(u64),
    /// Id of the freed object
    Freed(u64),
    /// New access count
    Accessed { id: u64, count: u64 },
    /// Number of objects freed
    FreedAll(usize),
    /// Stats report
    Report(CacheSnapshot),
    /// Command summary
    Help,
}

impl Response {
    /// Multi-line responses need a terminator on line transports
    pub fn is_multiline(&self) -> bool {
        matches!(self, Response::Report(_) | Response::Help)
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Allocated(id) => write!(f, "OK {}", id),
            Response::Freed(id) => write!(f, "OK freed {}", id),
            Response::Accessed { count, .. } => write!(f, "OK {}", count),
            Response::FreedAll(count) => write!(f, "OK freed {}", count),
            Response::Report(snapshot) => f.write_str(&StatsReporter::render(snapshot)),
            Response::Help => f.write_str(StatsReporter::command_help()),
        }
    }
}

/// Wire rendering of an error: `ERR <code>: <message>`
pub fn render_error(err: &Error) -> String {
    let detail = match err {
        Error::Parse(msg) => msg.clone(),
        other => other.to_string(),
    };
    format!("ERR {}: {}", err.kind().code(), detail)
}

/// Parses command lines and applies them to one cache
///
/// Holds no state of its own between commands; every call is one
/// complete request/response exchange.
#[derive(Debug, Clone)]
pub struct CommandProcessor {
    cache: SlabCache,
}

impl CommandProcessor {
    pub fn new(cache: SlabCache) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &SlabCache {
        &self.cache
    }

    /// Handle one command line
    pub fn handle(&self, line: &str) -> Result<Response> {
        let request = match Request::parse(line) {
            Ok(request) => request,
            Err(e) => {
                warn!(cache = %self.cache.name(), line = %line.trim_end(), error = %e, "Rejected command");
                metrics::record_command("invalid", false);
                return Err(e);
            }
        };
        self.execute(request)
    }

    /// Apply an already-parsed request
    pub fn execute(&self, request: Request) -> Result<Response> {
        let name = request.name();
        let result = self.dispatch(request);

        metrics::record_command(name, result.is_ok());
        match &result {
            Ok(response) if !response.is_multiline() => {
                debug!(command = name, response = %response, "Command completed");
            }
            Ok(_) => debug!(command = name, "Command completed"),
            Err(e) => warn!(cache = %self.cache.name(), command = name, error = %e, "Command failed"),
        }
        result
    }

    /// Handle one line and render the outcome for a text transport
    pub fn handle_to_string(&self, line: &str) -> String {
        match self.handle(line) {
            Ok(response) => response.to_string(),
            Err(e) => render_error(&e),
        }
    }

    fn dispatch(&self, request: Request) -> Result<Response> {
        match request {
            Request::Alloc(payload) => self.cache.alloc(&payload).map(Response::Allocated),
            Request::Free(id) => self.cache.free(id).map(|()| Response::Freed(id)),
            Request::Access(id) => self
                .cache
                .touch(id)
                .map(|count| Response::Accessed { id, count }),
            Request::FreeAll => self.cache.free_all().map(Response::FreedAll),
            Request::Stats => self.cache.snapshot().map(Response::Report),
            Request::Help => {
                if self.cache.is_destroyed() {
                    return Err(Error::CacheDestroyed(self.cache.name().to_string()));
                }
                Ok(Response::Help)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;

    fn processor() -> CommandProcessor {
        let cache = SlabCache::from_config(CacheConfig::new("processor_test", 64)).unwrap();
        CommandProcessor::new(cache)
    }

    #[test]
    fn test_handle_success_values() -> Result<()> {
        let processor = processor();

        assert!(matches!(processor.handle("alloc first")?, Response::Allocated(0)));
        assert!(matches!(processor.handle("alloc second")?, Response::Allocated(1)));
        assert!(matches!(
            processor.handle("access 1")?,
            Response::Accessed { id: 1, count: 1 }
        ));
        assert!(matches!(processor.handle("free 0")?, Response::Freed(0)));
        assert!(matches!(processor.handle("freeall")?, Response::FreedAll(1)));
        assert!(matches!(processor.handle("freeall")?, Response::FreedAll(0)));
        Ok(())
    }

    #[test]
    fn test_validation_order() {
        let processor = processor();

        // Well-formed but not live
        assert!(matches!(processor.handle("free 3"), Err(Error::NotFound(3))));
        assert!(matches!(processor.handle("access 3"), Err(Error::NotFound(3))));
        // Parse errors win over lookups
        assert!(matches!(processor.handle("free x"), Err(Error::Parse(_))));
        assert!(matches!(processor.handle("bogus 3"), Err(Error::Parse(_))));
    }

    #[test]
    fn test_errors_leave_state_unchanged() -> Result<()> {
        let processor = processor();
        processor.handle("alloc keep")?;

        for line in ["", "free", "free -2", "access 9", "free 9", "nope"] {
            assert!(processor.handle(line).is_err());
        }

        let stats = processor.cache().stats()?;
        assert_eq!(stats.total_allocated, 1);
        assert_eq!(stats.total_freed, 0);
        assert_eq!(processor.cache().list()?[0].access_count, 0);
        Ok(())
    }

    #[test]
    fn test_wire_rendering() {
        let processor = processor();

        assert_eq!(processor.handle_to_string("alloc a"), "OK 0");
        assert_eq!(processor.handle_to_string("access 0"), "OK 1");
        assert_eq!(processor.handle_to_string("free 0"), "OK freed 0");
        assert_eq!(processor.handle_to_string("free 0"), "ERR not_found: Object 0 not found");
        assert_eq!(processor.handle_to_string("jump"), "ERR parse: unknown command");
        assert_eq!(processor.handle_to_string("freeall"), "OK freed 0");

        let report = processor.handle_to_string("stats");
        assert!(report.starts_with("Slab Cache Statistics\n"));
        assert!(report.contains("Cache name: processor_test"));
        assert!(processor.handle_to_string("help").starts_with("Commands:"));
    }

    #[test]
    fn test_destroyed_cache() -> Result<()> {
        let processor = processor();
        processor.cache().close()?;

        assert!(matches!(processor.handle("alloc x"), Err(Error::CacheDestroyed(_))));
        assert!(matches!(processor.handle("stats"), Err(Error::CacheDestroyed(_))));
        assert!(matches!(processor.handle("help"), Err(Error::CacheDestroyed(_))));
        // Parsing still reports malformed input first
        assert!(matches!(processor.handle("alloc"), Err(Error::Parse(_))));
        assert!(processor
            .handle_to_string("freeall")
            .starts_with("ERR cache_destroyed:"));
        Ok(())
    }
}
