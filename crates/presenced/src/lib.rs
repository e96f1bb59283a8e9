//! Presence Daemon - Session registry and poll loop
//!
//! This crate provides the server side of the presence protocol:
//! - `config` - Server configuration (defaults, TOML file, environment)
//! - `session` - Per-connection state and request handling
//! - `registry` - Lock-protected, ordered collection of sessions
//! - `server` - TCP listener and the fixed-interval poll loop
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                    presenced                          │
//! ├───────────────────────────────────────────────────────┤
//! │                                                       │
//! │  ┌─────────────────┐  insert  ┌────────────────────┐  │
//! │  │ PresenceServer  │─────────▶│     Registry       │  │
//! │  │ (TcpListener)   │          │ (one mutex, Vec)   │  │
//! │  └─────────────────┘          └─────────┬──────────┘  │
//! │                                         │ tick/evict  │
//! │                               ┌─────────┴──────────┐  │
//! │                               │     PollLoop       │  │
//! │                               └────────────────────┘  │
//! │                                                       │
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows a panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`

pub mod config;
pub mod registry;
pub mod server;
pub mod session;

#[cfg(test)]
mod test_support;

pub use config::{ConfigError, ServerConfig};
pub use registry::{Registry, RegistryError, TickReport};
pub use server::{PollLoop, PresenceServer, ServerError};
pub use session::{Connection, ConnectionError, Session, SessionId};
