//! Connection to a presence server.
//!
//! The server reads at most one line per connection per tick and drops
//! anything after the first newline of a read, so the client keeps the
//! conversation in lockstep: one request, then wait for its response.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, trace};

use presence_protocol::{Request, Response};

use crate::error::{ClientError, Result};

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for a presence client.
///
/// # Example
///
/// ```rust
/// use presence_client::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig {
///     addr: "127.0.0.1:9000".to_string(),
///     ping_interval: Duration::from_secs(1),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server address.
    pub addr: String,

    /// Delay between pings; must stay below the server's idle timeout.
    pub ping_interval: Duration,

    /// How long to wait for each response.
    pub response_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8001".to_string(),
            ping_interval: Duration::from_secs(2),
            response_timeout: Duration::from_secs(3),
        }
    }
}

// ============================================================================
// Client
// ============================================================================

/// What a ping told us about the client list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingStatus {
    /// `ping ok`
    Unchanged,
    /// `ping client_list_changed`
    ListChanged,
}

/// Request/response client for the presence protocol.
pub struct PresenceClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    response_timeout: Duration,

    /// Bytes of a response line not yet terminated, kept across timeouts
    partial: Vec<u8>,
}

impl PresenceClient {
    /// Connects with the default response timeout.
    pub async fn connect(addr: &str) -> Result<Self> {
        Self::connect_with(&ClientConfig {
            addr: addr.to_string(),
            ..ClientConfig::default()
        })
        .await
    }

    pub async fn connect_with(config: &ClientConfig) -> Result<Self> {
        let stream = TcpStream::connect(&config.addr)
            .await
            .map_err(|e| ClientError::Connect {
                addr: config.addr.clone(),
                error: e.to_string(),
            })?;
        stream.set_nodelay(true)?;
        debug!(addr = %config.addr, "Connected to presence server");

        let (reader, writer) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(reader),
            writer,
            response_timeout: config.response_timeout,
            partial: Vec::new(),
        })
    }

    /// Sends `login <name>` and waits for `login ok`.
    ///
    /// The server keeps only the first whitespace-separated token, so
    /// names that are empty or contain whitespace are rejected locally.
    pub async fn login(&mut self, name: &str) -> Result<()> {
        validate_name(name)?;
        let request = Request::Login {
            name: name.to_string(),
        };
        match self.request(&request).await? {
            Response::LoginOk => Ok(()),
            got => Err(ClientError::UnexpectedResponse {
                expected: "login ok",
                got,
            }),
        }
    }

    pub async fn ping(&mut self) -> Result<PingStatus> {
        match self.request(&Request::Ping).await? {
            Response::PingOk => Ok(PingStatus::Unchanged),
            Response::PingClientListChanged => Ok(PingStatus::ListChanged),
            got => Err(ClientError::UnexpectedResponse {
                expected: "ping ok | ping client_list_changed",
                got,
            }),
        }
    }

    /// Usernames of every connected client, anonymous ones as `""`.
    pub async fn client_list(&mut self) -> Result<Vec<String>> {
        match self.request(&Request::ClientList).await? {
            Response::Clients(names) => Ok(names),
            got => Err(ClientError::UnexpectedResponse {
                expected: "clients",
                got,
            }),
        }
    }

    /// Sends one request and waits for its response.
    pub async fn request(&mut self, request: &Request) -> Result<Response> {
        self.send_line(&request.to_wire()).await?;
        self.recv().await
    }

    /// Writes a line as-is. The caller supplies the newline.
    pub async fn send_line(&mut self, line: &str) -> Result<()> {
        trace!(line = line.trim_end(), "Sending");
        self.send_raw(line.as_bytes()).await
    }

    /// Writes arbitrary bytes, valid UTF-8 or not.
    pub async fn send_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_all(bytes).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Waits up to the response timeout for one response line.
    pub async fn recv(&mut self) -> Result<Response> {
        self.recv_within(self.response_timeout)
            .await?
            .ok_or(ClientError::Timeout)
    }

    /// Like `recv`, but a timeout yields `Ok(None)`.
    ///
    /// A line cut short by the timeout stays buffered and is completed
    /// by the next call.
    pub async fn recv_within(&mut self, wait: Duration) -> Result<Option<Response>> {
        // read_until appends to `partial`, so a cancelled read loses nothing
        let read = match timeout(wait, self.reader.read_until(b'\n', &mut self.partial)).await {
            Ok(read) => read?,
            Err(_) => return Ok(None),
        };

        if read == 0 || self.partial.last() != Some(&b'\n') {
            return Err(ClientError::Closed);
        }

        let bytes = std::mem::take(&mut self.partial);
        let line = String::from_utf8_lossy(&bytes);
        let response = Response::parse(line.trim_end_matches('\n'))?;
        trace!(response = %response, "Received");
        Ok(Some(response))
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ClientError::InvalidName {
            name: name.to_string(),
            reason: "must not be empty",
        });
    }
    if name.chars().any(char::is_whitespace) {
        return Err(ClientError::InvalidName {
            name: name.to_string(),
            reason: "must not contain whitespace",
        });
    }
    Ok(())
}
