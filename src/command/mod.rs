//! Control protocol
//!
//! Line-oriented commands over a [`SlabCache`](crate::slab::SlabCache):
//!
//! ```text
//! line → Request::parse → CommandProcessor::execute → SlabCache → Response
//!                ↓                                                  ↓
//!          Error::Parse                                  Display (wire form)
//! ```
//!
//! The transport carrying the lines is not part of this module; see
//! [`network`](crate::network) for the TCP host.

pub mod parser;
pub mod processor;

pub use parser::Request;
pub use processor::{render_error, CommandProcessor, Response};
