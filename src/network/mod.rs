//! Network transport
//!
//! Exposes the control protocol over TCP, one command per line.
//!
//! ## Protocol Flow
//!
//! 1. Client connects (bounded by `max_connections`)
//! 2. Client writes a command line, server writes the response
//! 3. Repeat until EOF or `quit`
//!
//! The transport only moves lines; parsing, validation and cache access
//! all happen in [`CommandProcessor`](crate::command::CommandProcessor).

pub mod connection;
pub mod server;

pub use connection::{ConnectionHandler, END_MARKER};
pub use server::LineServer;
