//! Presence Protocol - Wire protocol for the presence server
//!
//! One command per line, UTF-8 text, terminated by `\n`:
//!
//! ```text
//! login <name>   -> login ok
//! ping           -> ping ok | ping client_list_changed
//! client_list    -> clients <name1> <name2> ...
//! ```
//!
//! This crate only frames, parses and encodes; it performs no I/O.

pub mod framing;
pub mod request;
pub mod response;

pub use framing::{extract_line, READ_WINDOW};
pub use request::{ProtocolError, Request};
pub use response::Response;
