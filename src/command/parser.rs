//! Command line grammar
//!
//! ```text
//! alloc <data>      -- <data> is the rest of the line
//! free <id>         -- non-negative integer
//! access <id>       -- non-negative integer
//! freeall
//! stats
//! help
//! ```
//!
//! Keywords are case-sensitive. Checks run in a fixed order: unknown
//! keyword, then missing argument, then malformed id.

use crate::error::{Error, Result};
use std::str::FromStr;

pub const UNKNOWN_COMMAND: &str = "unknown command";
pub const MISSING_ARGUMENT: &str = "missing argument";
pub const INVALID_ID: &str = "invalid id";
pub const UNEXPECTED_ARGUMENT: &str = "unexpected argument";

/// A parsed control request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Alloc(String),
    Free(u64),
    Access(u64),
    FreeAll,
    Stats,
    Help,
}

impl Request {
    /// Parse one command line; a trailing line ending is ignored
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        let (keyword, rest) = match line.find(char::is_whitespace) {
            Some(pos) => (&line[..pos], line[pos..].trim_start()),
            None => (line, ""),
        };

        match keyword {
            "alloc" => {
                if rest.is_empty() {
                    return Err(Error::parse(MISSING_ARGUMENT));
                }
                Ok(Request::Alloc(rest.to_string()))
            }
            "free" => parse_id(rest).map(Request::Free),
            "access" => parse_id(rest).map(Request::Access),
            "freeall" => no_arguments(rest, Request::FreeAll),
            "stats" => no_arguments(rest, Request::Stats),
            "help" => no_arguments(rest, Request::Help),
            _ => Err(Error::parse(UNKNOWN_COMMAND)),
        }
    }

    /// Keyword, used for logging and metrics labels
    pub fn name(&self) -> &'static str {
        match self {
            Request::Alloc(_) => "alloc",
            Request::Free(_) => "free",
            Request::Access(_) => "access",
            Request::FreeAll => "freeall",
            Request::Stats => "stats",
            Request::Help => "help",
        }
    }

    /// Whether this request can change cache state
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Request::Alloc(_) | Request::Free(_) | Request::Access(_) | Request::FreeAll
        )
    }
}

impl FromStr for Request {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Request::parse(s)
    }
}

fn parse_id(arg: &str) -> Result<u64> {
    if arg.is_empty() {
        return Err(Error::parse(MISSING_ARGUMENT));
    }
    // Digits only: rejects signs, trailing tokens and overflow alike
    if !arg.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::parse(INVALID_ID));
    }
    arg.parse::<u64>().map_err(|_| Error::parse(INVALID_ID))
}

fn no_arguments(rest: &str, request: Request) -> Result<Request> {
    if rest.is_empty() {
        Ok(request)
    } else {
        Err(Error::parse(UNEXPECTED_ARGUMENT))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_error(line: &str) -> String {
        match Request::parse(line) {
            Err(Error::Parse(msg)) => msg,
            other => panic!("expected parse error for {:?}, got {:?}", line, other),
        }
    }

    #[test]
    fn test_parse_alloc_keeps_interior_spaces() {
        assert_eq!(
            Request::parse("alloc hello  slab world\n").unwrap(),
            Request::Alloc("hello  slab world".to_string())
        );
        assert_eq!(
            Request::parse("alloc\tobject_one\r\n").unwrap(),
            Request::Alloc("object_one".to_string())
        );
    }

    #[test]
    fn test_parse_id_commands() {
        assert_eq!(Request::parse("free 1").unwrap(), Request::Free(1));
        assert_eq!(Request::parse("access 0\n").unwrap(), Request::Access(0));
        assert_eq!(
            Request::parse("free 18446744073709551615").unwrap(),
            Request::Free(u64::MAX)
        );
    }

    #[test]
    fn test_parse_bare_commands() {
        assert_eq!(Request::parse("freeall").unwrap(), Request::FreeAll);
        assert_eq!(Request::parse("  freeall  \n").unwrap(), Request::FreeAll);
        assert_eq!("stats".parse::<Request>().unwrap(), Request::Stats);
        assert_eq!(Request::parse("help").unwrap(), Request::Help);
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(parse_error("allocate x"), UNKNOWN_COMMAND);
        assert_eq!(parse_error("ALLOC x"), UNKNOWN_COMMAND);
        assert_eq!(parse_error(""), UNKNOWN_COMMAND);
        assert_eq!(parse_error("   \n"), UNKNOWN_COMMAND);
        assert_eq!(parse_error("freeall1"), UNKNOWN_COMMAND);
    }

    #[test]
    fn test_missing_argument() {
        assert_eq!(parse_error("alloc"), MISSING_ARGUMENT);
        assert_eq!(parse_error("alloc   \n"), MISSING_ARGUMENT);
        assert_eq!(parse_error("free"), MISSING_ARGUMENT);
        assert_eq!(parse_error("access "), MISSING_ARGUMENT);
    }

    #[test]
    fn test_invalid_id() {
        assert_eq!(parse_error("free abc"), INVALID_ID);
        assert_eq!(parse_error("free -1"), INVALID_ID);
        assert_eq!(parse_error("free +1"), INVALID_ID);
        assert_eq!(parse_error("access 1.5"), INVALID_ID);
        assert_eq!(parse_error("free 1 2"), INVALID_ID);
        assert_eq!(parse_error("free 18446744073709551616"), INVALID_ID);
    }

    #[test]
    fn test_unexpected_argument() {
        assert_eq!(parse_error("freeall now"), UNEXPECTED_ARGUMENT);
        assert_eq!(parse_error("stats please"), UNEXPECTED_ARGUMENT);
    }

    #[test]
    fn test_request_names() {
        assert_eq!(Request::Alloc("x".into()).name(), "alloc");
        assert_eq!(Request::FreeAll.name(), "freeall");
        assert!(Request::Access(1).is_mutation());
        assert!(!Request::Stats.is_mutation());
    }
}
