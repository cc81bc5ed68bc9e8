//! IRC protocol plumbing.
//!
//! This module provides the line parser, inbound decoding, outbound line
//! builders, the flood-control pacer and the connection transport.

pub mod encoding;
pub mod outbound;
pub mod pacer;
pub mod parser;
mod transport;

pub use pacer::{FloodController, Priority, PROBE_TOKEN, SEND_BUDGET};
pub use parser::{parse_line, Event};
pub use transport::{connect, Connection, LineReader};
