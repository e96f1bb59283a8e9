//! Presence Client - talk to a presence server
//!
//! Provides `PresenceClient`, an async request/response wrapper around
//! the line protocol, used by the `presence` binary and by the daemon's
//! integration tests.
//!
//! **Panic-Free Policy:** No `.unwrap()`, `.expect()`, `panic!()`,
//! `unreachable!()`, or `todo!()` in this crate.

pub mod client;
pub mod error;

pub use client::{ClientConfig, PingStatus, PresenceClient};
pub use error::{ClientError, Result};
