//! TCP listener for the presence daemon.
//!
//! The server:
//! - Binds a TCP listener on the configured address
//! - Wraps every accepted connection in a `Session` and inserts it into the `Registry`
//! - Spawns the `PollLoop` that services all sessions
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │ PresenceServer  │
//! │                 │
//! │   TcpListener   │
//! └───────┬─────────┘
//!         │ accept()
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │    Session      │────▶│    Registry     │
//! │ (per client)    │     │                 │
//! └─────────────────┘     └────────┬────────┘
//!                                  │ tick every 1 ms
//!                                  ▼
//!                         ┌─────────────────┐
//!                         │    PollLoop     │
//!                         └─────────────────┘
//! ```
//!
//! An accept failure ends `run()` with an error; there is no retry.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?` or pattern matching

mod poll;

pub use poll::PollLoop;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::registry::Registry;
use crate::session::{Session, SessionId};

/// Presence server: accept loop plus the poll loop it drives.
pub struct PresenceServer {
    listener: TcpListener,

    local_addr: SocketAddr,

    registry: Registry,

    cancel_token: CancellationToken,

    /// Source of session ids
    connection_counter: AtomicU64,

    tick_interval: Duration,

    idle_timeout: Duration,
}

impl PresenceServer {
    /// Binds the listening socket.
    ///
    /// # Errors
    ///
    /// `ServerError::Bind` if the address cannot be bound.
    pub async fn bind(
        config: &ServerConfig,
        registry: Registry,
        cancel_token: CancellationToken,
    ) -> Result<Self, ServerError> {
        let bind_error = |e: std::io::Error| ServerError::Bind {
            addr: config.bind_addr.clone(),
            error: e.to_string(),
        };

        let listener = TcpListener::bind(&config.bind_addr)
            .await
            .map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;

        Ok(Self {
            listener,
            local_addr,
            registry,
            cancel_token,
            connection_counter: AtomicU64::new(0),
            tick_interval: config.tick_interval(),
            idle_timeout: config.idle_timeout(),
        })
    }

    /// The bound address (useful when binding port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Runs the server.
    ///
    /// Spawns the poll loop, then accepts connections until the
    /// cancellation token is triggered or accepting fails.
    pub async fn run(self) -> Result<(), ServerError> {
        info!(addr = %self.local_addr, "Presence server listening");

        let poll_loop = PollLoop::new(
            self.registry.clone(),
            self.tick_interval,
            self.cancel_token.clone(),
        );
        let poll_handle = tokio::spawn(poll_loop.run());

        let result = self.accept_loop().await;

        // The poll loop only outlives the listener on an accept failure.
        self.cancel_token.cancel();
        if let Err(e) = poll_handle.await {
            warn!(error = %e, "Poll loop task ended abnormally");
        }

        info!("Presence server stopped");
        result
    }

    async fn accept_loop(&self) -> Result<(), ServerError> {
        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("Server shutdown requested");
                    return Ok(());
                }

                result = self.listener.accept() => {
                    let (stream, peer) = result.map_err(|e| {
                        error!(error = %e, "Failed to accept connection");
                        ServerError::Accept(e.to_string())
                    })?;
                    self.handle_connection(stream, peer).await;
                }
            }
        }
    }

    async fn handle_connection(&self, stream: tokio::net::TcpStream, peer: SocketAddr) {
        let id = SessionId::new(self.connection_counter.fetch_add(1, Ordering::Relaxed));
        if let Err(e) = stream.set_nodelay(true) {
            debug!(session = %id, error = %e, "Failed to set TCP_NODELAY");
        }

        let session = Session::new(id, stream, self.idle_timeout);
        match self.registry.insert(session).await {
            Ok(()) => debug!(session = %id, peer = %peer, "Client connected"),
            Err(e) => warn!(session = %id, error = %e, "Dropping connection"),
        }
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {error}")]
    Bind { addr: String, error: String },

    #[error("Failed to accept connection: {0}")]
    Accept(String),
}
