//! Per-connection session state.
//!
//! A `Session` owns one client connection and the state the protocol
//! needs for it: the logged-in username, the time of the last request,
//! and whether the client list changed since the client last pinged.
//!
//! Sessions never block. Each dispatcher pass makes at most one
//! non-blocking read; a read that does not contain a whole line is
//! discarded rather than buffered for the next pass.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Transport failures come back as `ConnectionError` and end the session

use std::fmt;
use std::io;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::Instant;
use tracing::{info, trace};

use presence_protocol::{extract_line, ProtocolError, Request, Response, READ_WINDOW};

/// Identity of a session, unique for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Non-blocking byte transport owned by a session.
///
/// Both calls must return `io::ErrorKind::WouldBlock` instead of waiting.
/// The transport is closed when it is dropped.
pub trait Connection: Send {
    /// Reads whatever is available right now into `buf`.
    ///
    /// `Ok(0)` means the peer closed the connection.
    fn try_read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Writes as much of `buf` as the transport accepts without waiting.
    fn try_write(&mut self, buf: &[u8]) -> io::Result<usize>;
}

impl Connection for TcpStream {
    fn try_read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        TcpStream::try_read(self, buf)
    }

    fn try_write(&mut self, buf: &[u8]) -> io::Result<usize> {
        TcpStream::try_write(self, buf)
    }
}

/// Result of one successful read attempt that produced a full line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// A recognised command
    Request(Request),

    /// A line that is not a command; the session stays open
    Invalid(ProtocolError),
}

/// Server-side state for one connected client.
pub struct Session {
    id: SessionId,

    /// `None` once the session has been stopped
    connection: Option<Box<dyn Connection>>,

    username: Option<String>,

    last_activity: Instant,

    /// Set when another session logs in, cleared by `ping`
    list_changed: bool,

    idle_timeout: Duration,
}

impl Session {
    /// Wraps a freshly accepted connection.
    pub fn new(
        id: SessionId,
        connection: impl Connection + 'static,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            id,
            connection: Some(Box::new(connection)),
            username: None,
            last_activity: Instant::now(),
            list_changed: false,
            idle_timeout,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// The logged-in name, or `""` before login.
    pub fn username(&self) -> &str {
        self.username.as_deref().unwrap_or_default()
    }

    pub fn is_logged_in(&self) -> bool {
        self.username.is_some()
    }

    pub fn list_changed(&self) -> bool {
        self.list_changed
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    pub fn is_stopped(&self) -> bool {
        self.connection.is_none()
    }

    /// Attempts to take one complete line from the connection.
    ///
    /// Returns `Ok(None)` when nothing is available, or when the data
    /// available right now holds no newline within `READ_WINDOW` bytes.
    /// In the latter case the bytes are dropped.
    pub fn poll_request(&mut self) -> Result<Option<Incoming>, ConnectionError> {
        let connection = self.connection.as_mut().ok_or(ConnectionError::Closed)?;

        let mut buf = [0u8; READ_WINDOW];
        let n = match connection.try_read(&mut buf) {
            Ok(0) => return Err(ConnectionError::Eof),
            Ok(n) => n,
            Err(e)
                if e.kind() == io::ErrorKind::WouldBlock
                    || e.kind() == io::ErrorKind::Interrupted =>
            {
                return Ok(None)
            }
            Err(e) => return Err(ConnectionError::Io(e.to_string())),
        };

        let Some(line) = buf.get(..n).and_then(extract_line) else {
            trace!(session = %self.id, bytes = n, "Dropping read without a complete line");
            return Ok(None);
        };

        self.last_activity = Instant::now();
        trace!(
            session = %self.id,
            "get request from {}: {}",
            self.username(),
            String::from_utf8_lossy(line)
        );

        Ok(Some(match Request::parse_bytes(line) {
            Ok(request) => Incoming::Request(request),
            Err(e) => Incoming::Invalid(e),
        }))
    }

    /// Records a successful login and returns the reply.
    ///
    /// Notifying the other sessions is up to the registry.
    pub fn login(&mut self, name: String) -> Response {
        info!(session = %self.id, "{name} logged in");
        self.username = Some(name);
        Response::LoginOk
    }

    /// Answers a ping, consuming the list-changed flag.
    pub fn ping(&mut self) -> Response {
        if std::mem::take(&mut self.list_changed) {
            Response::PingClientListChanged
        } else {
            Response::PingOk
        }
    }

    pub fn mark_list_changed(&mut self) {
        self.list_changed = true;
    }

    /// Writes a response without waiting.
    ///
    /// If the transport cannot take the whole response right now, the
    /// rest is dropped. Only hard transport errors are returned.
    pub fn send(&mut self, response: &Response) -> Result<(), ConnectionError> {
        let connection = self.connection.as_mut().ok_or(ConnectionError::Closed)?;
        let wire = response.to_wire();
        let mut pending = wire.as_bytes();

        while !pending.is_empty() {
            match connection.try_write(pending) {
                Ok(0) => return Err(ConnectionError::Eof),
                Ok(n) => pending = pending.get(n..).unwrap_or_default(),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    trace!(
                        session = %self.id,
                        unsent = pending.len(),
                        "Send buffer full, reply truncated"
                    );
                    break;
                }
                Err(e) => return Err(ConnectionError::Io(e.to_string())),
            }
        }

        trace!(
            session = %self.id,
            "send answer to {}: {}",
            self.username(),
            wire.trim_end_matches('\n')
        );
        Ok(())
    }

    /// True if the last request is older than the idle timeout.
    pub fn timed_out(&self) -> bool {
        self.timed_out_at(Instant::now())
    }

    pub fn timed_out_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_activity) > self.idle_timeout
    }

    /// Closes the connection. Returns `false` if it was already closed.
    pub fn stop(&mut self) -> bool {
        self.connection.take().is_some()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("list_changed", &self.list_changed)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

/// Transport-level failures. Any of these ends the session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Connection closed by peer")]
    Eof,

    #[error("Session already stopped")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockConnection;

    const TIMEOUT: Duration = Duration::from_millis(5000);

    fn session() -> (Session, crate::test_support::MockPeer) {
        let (conn, peer) = MockConnection::pair();
        (Session::new(SessionId::new(1), conn, TIMEOUT), peer)
    }

    #[test]
    fn test_new_session_is_anonymous() {
        let (session, _peer) = session();
        assert_eq!(session.username(), "");
        assert!(!session.is_logged_in());
        assert!(!session.list_changed());
        assert!(!session.is_stopped());
    }

    #[test]
    fn test_session_id_display() {
        assert_eq!(SessionId::new(7).to_string(), "session-7");
        assert_eq!(SessionId::new(7).as_u64(), 7);
    }

    #[tokio::test]
    async fn test_poll_without_data() {
        let (mut session, _peer) = session();
        assert_eq!(session.poll_request(), Ok(None));
        assert!(!session.is_stopped());
    }

    #[tokio::test]
    async fn test_poll_complete_line() {
        let (mut session, peer) = session();
        peer.push(b"login Alice\n");

        assert_eq!(
            session.poll_request(),
            Ok(Some(Incoming::Request(Request::Login {
                name: "Alice".to_string()
            })))
        );
    }

    #[tokio::test]
    async fn test_partial_line_is_dropped_not_buffered() {
        let (mut session, peer) = session();
        peer.push(b"pi");
        peer.push(b"ng\n");

        assert_eq!(session.poll_request(), Ok(None));
        // The second half alone parses as an unknown command
        assert_eq!(
            session.poll_request(),
            Ok(Some(Incoming::Invalid(ProtocolError::UnknownCommand(
                "ng".to_string()
            ))))
        );
    }

    #[tokio::test]
    async fn test_line_longer_than_window_is_dropped() {
        let (mut session, peer) = session();
        let mut long = vec![b'x'; READ_WINDOW + 10];
        long.push(b'\n');
        peer.push(&long);

        // First window has no newline, second holds the tail
        assert_eq!(session.poll_request(), Ok(None));
        assert!(matches!(
            session.poll_request(),
            Ok(Some(Incoming::Invalid(_)))
        ));
    }

    #[tokio::test]
    async fn test_poll_invalid_keeps_session_open() {
        let (mut session, peer) = session();
        peer.push(b"bogus\n");

        assert!(matches!(
            session.poll_request(),
            Ok(Some(Incoming::Invalid(_)))
        ));
        assert!(!session.is_stopped());
        assert!(peer.written().is_empty());
    }

    #[tokio::test]
    async fn test_poll_eof_and_error() {
        let (mut session, peer) = session();
        peer.push(b"");
        assert_eq!(session.poll_request(), Err(ConnectionError::Eof));

        let (mut session, peer) = self::session();
        peer.push_error(io::ErrorKind::ConnectionReset);
        assert!(matches!(session.poll_request(), Err(ConnectionError::Io(_))));
    }

    #[tokio::test]
    async fn test_login_sets_username() {
        let (mut session, _peer) = session();
        assert_eq!(session.login("Alice".to_string()), Response::LoginOk);
        assert_eq!(session.username(), "Alice");
        assert!(session.is_logged_in());
    }

    #[tokio::test]
    async fn test_ping_consumes_flag() {
        let (mut session, _peer) = session();
        assert_eq!(session.ping(), Response::PingOk);

        session.mark_list_changed();
        assert_eq!(session.ping(), Response::PingClientListChanged);
        assert_eq!(session.ping(), Response::PingOk);
    }

    #[tokio::test]
    async fn test_send_writes_wire_format() {
        let (mut session, peer) = session();
        session.send(&Response::LoginOk).unwrap();
        session
            .send(&Response::Clients(vec!["Alice".to_string()]))
            .unwrap();
        assert_eq!(peer.written(), "login ok\nclients Alice \n");
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let (mut session, peer) = session();
        assert!(session.stop());
        assert!(!session.stop());
        assert!(session.is_stopped());
        assert!(peer.is_closed());
        assert_eq!(session.poll_request(), Err(ConnectionError::Closed));
        assert_eq!(session.send(&Response::PingOk), Err(ConnectionError::Closed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_after_idle_threshold() {
        let (session, _peer) = session();
        let start = session.last_activity();

        assert!(!session.timed_out_at(start + TIMEOUT));
        assert!(session.timed_out_at(start + TIMEOUT + Duration::from_millis(1)));

        tokio::time::advance(Duration::from_millis(4999)).await;
        assert!(!session.timed_out());
        tokio::time::advance(Duration::from_millis(2)).await;
        assert!(session.timed_out());
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_refreshes_activity() {
        let (mut session, peer) = session();
        tokio::time::advance(Duration::from_millis(4000)).await;

        peer.push(b"ping\n");
        session.poll_request().unwrap();

        tokio::time::advance(Duration::from_millis(4000)).await;
        assert!(!session.timed_out());
    }
}
