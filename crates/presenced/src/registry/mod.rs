//! Shared registry of active sessions.
//!
//! The registry is the only state shared between the listener and the
//! poll loop. It is a cheap-to-clone handle around one mutex; every
//! mutation and every snapshot happens under that lock.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐  insert   ┌──────────────────────────┐
//! │    Listener     │──────────▶│  Registry                │
//! │ (accept loop)   │           │  Arc<Mutex<SessionList>> │
//! └─────────────────┘           └────────────┬─────────────┘
//!                                            │ lock, tick_all, evict
//!                               ┌────────────┴─────────────┐
//!                               │        PollLoop          │
//!                               │   (fixed-interval scan)  │
//!                               └──────────────────────────┘
//! ```
//!
//! The lock is not re-entrant. Work that needs the registry while a
//! session is being ticked (notifying other sessions after a login,
//! listing usernames) goes through `SessionList`, which is only reachable
//! with the lock already held.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - The lock is only held for non-blocking, CPU-bound work

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::warn;

mod list;

pub use list::{SessionList, TickReport};

use crate::session::{Session, SessionId};

/// Handle to the shared session registry.
#[derive(Clone, Default)]
pub struct Registry {
    sessions: Arc<Mutex<SessionList>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a session.
    ///
    /// # Errors
    ///
    /// `RegistryError::SessionAlreadyExists` if a session with the same id
    /// is present. The rejected session is stopped.
    pub async fn insert(&self, mut session: Session) -> Result<(), RegistryError> {
        let mut sessions = self.sessions.lock().await;
        let session_id = session.id();

        if sessions.contains(session_id) {
            warn!(session = %session_id, "Session already registered, rejecting");
            session.stop();
            return Err(RegistryError::SessionAlreadyExists { session_id });
        }

        sessions.push(session);
        Ok(())
    }

    /// Removes (and stops) every session matching `predicate`.
    ///
    /// Returns the number of sessions removed.
    pub async fn remove_if<F>(&self, predicate: F) -> usize
    where
        F: FnMut(&Session) -> bool,
    {
        self.sessions.lock().await.remove_if(predicate)
    }

    /// Usernames of all sessions, in registry order.
    pub async fn snapshot(&self) -> Vec<String> {
        self.sessions.lock().await.snapshot()
    }

    /// Flags every session so its next ping reports a changed list.
    pub async fn mark_all_changed(&self) {
        self.sessions.lock().await.mark_all_changed();
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }

    /// Ids of all sessions, in registry order.
    pub async fn session_ids(&self) -> Vec<SessionId> {
        self.sessions.lock().await.ids()
    }

    /// Runs one dispatcher pass under a single lock acquisition: tick
    /// every session in order, then evict idle and failed ones.
    pub async fn tick(&self) -> TickReport {
        let mut sessions = self.sessions.lock().await;
        let mut report = TickReport {
            requests: sessions.tick_all(),
            ..TickReport::default()
        };
        sessions.evict(Instant::now(), &mut report);
        report
    }
}

/// Errors that can occur during registry operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Session already exists: {session_id}")]
    SessionAlreadyExists { session_id: SessionId },
}
