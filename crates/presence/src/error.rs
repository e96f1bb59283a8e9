//! Error types for the presence client.

use thiserror::Error;

use presence_protocol::{ProtocolError, Response};

/// Errors that can occur while talking to the server.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Could not open the TCP connection.
    #[error("Failed to connect to {addr}: {error}")]
    Connect { addr: String, error: String },

    /// Read or write failed on an open connection.
    #[error("I/O error: {0}")]
    Io(String),

    /// The server closed the connection.
    ///
    /// Also what an idle client sees once the server evicted it.
    #[error("Connection closed by server")]
    Closed,

    /// No response arrived in time.
    #[error("Timed out waiting for a response")]
    Timeout,

    /// The server sent a line that is not a known response.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A login name the server would not store as given.
    #[error("Invalid name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    /// A well-formed response that does not answer the request sent.
    #[error("Unexpected response: expected {expected}, got {got}")]
    UnexpectedResponse { expected: &'static str, got: Response },
}

impl From<std::io::Error> for ClientError {
    fn from(e: std::io::Error) -> Self {
        ClientError::Io(e.to_string())
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
