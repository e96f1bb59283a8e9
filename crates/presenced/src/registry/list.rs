//! The session list behind the registry lock.
//!
//! Every method here assumes the caller already holds the registry lock.
//! They are the lock-free counterparts of the `Registry` methods, so a
//! session being ticked can trigger `mark_changed_except` or `snapshot`
//! without re-acquiring the lock it is already running under.

use tokio::time::Instant;
use tracing::{debug, error, info};

use presence_protocol::{Request, Response};

use crate::session::{Incoming, Session, SessionId};

/// Counters for one dispatcher pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Complete lines read (valid or not)
    pub requests: usize,

    /// Sessions removed for idleness
    pub timed_out: usize,

    /// Sessions removed because their connection failed
    pub disconnected: usize,
}

impl TickReport {
    pub fn evicted(&self) -> usize {
        self.timed_out + self.disconnected
    }
}

/// Ordered sessions in insertion order.
#[derive(Debug, Default)]
pub struct SessionList {
    sessions: Vec<Session>,
}

impl SessionList {
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.iter().any(|s| s.id() == id)
    }

    pub fn push(&mut self, session: Session) {
        self.sessions.push(session);
    }

    pub fn ids(&self) -> Vec<SessionId> {
        self.sessions.iter().map(Session::id).collect()
    }

    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id() == id)
    }

    /// Usernames in registry order; anonymous sessions appear as `""`.
    pub fn snapshot(&self) -> Vec<String> {
        self.sessions
            .iter()
            .map(|s| s.username().to_string())
            .collect()
    }

    pub fn mark_all_changed(&mut self) {
        for session in &mut self.sessions {
            session.mark_list_changed();
        }
    }

    /// Flags every session except `id`.
    pub fn mark_changed_except(&mut self, id: SessionId) {
        for session in self.sessions.iter_mut().filter(|s| s.id() != id) {
            session.mark_list_changed();
        }
    }

    /// Removes and stops every session matching `predicate`.
    pub fn remove_if<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&Session) -> bool,
    {
        let before = self.sessions.len();
        self.sessions.retain_mut(|session| {
            if predicate(session) {
                session.stop();
                false
            } else {
                true
            }
        });
        before - self.sessions.len()
    }

    /// Gives every session, in order, one chance to handle a request.
    ///
    /// Returns the number of complete lines read.
    pub fn tick_all(&mut self) -> usize {
        let mut requests = 0;
        for idx in 0..self.sessions.len() {
            if self.tick_at(idx) {
                requests += 1;
            }
        }
        requests
    }

    fn tick_at(&mut self, idx: usize) -> bool {
        let Some(session) = self.sessions.get_mut(idx) else {
            return false;
        };
        if session.is_stopped() {
            return false;
        }

        let request = match session.poll_request() {
            Ok(Some(Incoming::Request(request))) => request,
            Ok(Some(Incoming::Invalid(e))) => {
                error!(session = %session.id(), "{e}");
                return true;
            }
            Ok(None) => return false,
            Err(e) => {
                debug!(session = %session.id(), error = %e, "Connection failed, stopping session");
                session.stop();
                return false;
            }
        };

        let response = match request {
            Request::Login { name } => {
                let response = session.login(name);
                let id = session.id();
                self.mark_changed_except(id);
                response
            }
            Request::Ping => session.ping(),
            Request::ClientList => Response::Clients(self.snapshot()),
        };

        if let Some(session) = self.sessions.get_mut(idx) {
            if let Err(e) = session.send(&response) {
                debug!(session = %session.id(), error = %e, "Send failed, stopping session");
                session.stop();
            }
        }
        true
    }

    /// Drops sessions that timed out or whose connection is gone.
    pub fn evict(&mut self, now: Instant, report: &mut TickReport) {
        self.sessions.retain_mut(|session| {
            if session.timed_out_at(now) {
                session.stop();
                info!(session = %session.id(), "disconnect {} - timed out", session.username());
                report.timed_out += 1;
                false
            } else if session.is_stopped() {
                debug!(
                    session = %session.id(),
                    username = session.username(),
                    "Removing closed session"
                );
                report.disconnected += 1;
                false
            } else {
                true
            }
        });
    }
}
