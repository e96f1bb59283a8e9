//! In-memory connection used by unit tests.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

use crate::session::Connection;

#[derive(Default)]
struct MockState {
    reads: VecDeque<io::Result<Vec<u8>>>,
    written: Vec<u8>,
    closed: bool,
}

/// Connection half handed to a `Session`. Dropping it marks the peer closed.
pub(crate) struct MockConnection {
    state: Arc<Mutex<MockState>>,
}

/// Test-side view of a `MockConnection`.
#[derive(Clone)]
pub(crate) struct MockPeer {
    state: Arc<Mutex<MockState>>,
}

impl MockConnection {
    pub(crate) fn pair() -> (MockConnection, MockPeer) {
        let state = Arc::new(Mutex::new(MockState::default()));
        (
            MockConnection {
                state: Arc::clone(&state),
            },
            MockPeer { state },
        )
    }
}

impl Connection for MockConnection {
    fn try_read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state.lock().unwrap();
        match state.reads.pop_front() {
            None => Err(io::ErrorKind::WouldBlock.into()),
            Some(Err(e)) => Err(e),
            Some(Ok(bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                if n < bytes.len() {
                    state.reads.push_front(Ok(bytes[n..].to_vec()));
                }
                Ok(n)
            }
        }
    }

    fn try_write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.state.lock().unwrap().written.extend_from_slice(buf);
        Ok(buf.len())
    }
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.closed = true;
        }
    }
}

impl MockPeer {
    /// Queues the bytes returned by one future `try_read`.
    pub(crate) fn push(&self, bytes: &[u8]) {
        self.state.lock().unwrap().reads.push_back(Ok(bytes.to_vec()));
    }

    pub(crate) fn push_error(&self, kind: io::ErrorKind) {
        self.state.lock().unwrap().reads.push_back(Err(kind.into()));
    }

    /// Everything the session wrote so far, drained.
    pub(crate) fn written(&self) -> String {
        let bytes = std::mem::take(&mut self.state.lock().unwrap().written);
        String::from_utf8_lossy(&bytes).into_owned()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }
}
