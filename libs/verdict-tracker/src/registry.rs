//! Job Registry - single source of truth for what is being tracked.
//!
//! At most one session per subject key. Installing a session under an
//! occupied key releases the old one first.

use crate::session::{PollingSession, SessionId, SessionSnapshot};
use std::collections::HashMap;
use tracing::debug;
use verdict_common::types::SubjectKey;

#[derive(Default)]
pub struct JobRegistry {
    sessions: HashMap<SubjectKey, PollingSession>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a session, releasing whatever was registered under its key.
    /// Returns the id of the superseded session, if any.
    pub fn register(&mut self, session: PollingSession) -> Option<SessionId> {
        let subject = session.subject.clone();
        let new_id = session.id;
        let mut previous = self.sessions.insert(subject.clone(), session)?;
        previous.release();
        debug!(subject = %subject, old = %previous.id, new = %new_id, "Session superseded");
        Some(previous.id)
    }

    /// Release and remove the session under `subject`. Safe to call repeatedly.
    pub fn cancel(&mut self, subject: &SubjectKey) -> Option<PollingSession> {
        let mut session = self.sessions.remove(subject)?;
        session.release();
        debug!(subject = %subject, session = %session.id, "Session cancelled");
        Some(session)
    }

    pub fn cancel_all(&mut self) -> Vec<PollingSession> {
        self.sessions
            .drain()
            .map(|(_, mut session)| {
                session.release();
                session
            })
            .collect()
    }

    pub fn is_tracking(&self, subject: &SubjectKey) -> bool {
        self.sessions.contains_key(subject)
    }

    pub fn get(&self, subject: &SubjectKey) -> Option<&PollingSession> {
        self.sessions.get(subject)
    }

    /// Liveness check: is `id` still the session registered under `subject`?
    pub fn is_current(&self, subject: &SubjectKey, id: SessionId) -> bool {
        self.sessions.get(subject).is_some_and(|s| s.id == id)
    }

    pub fn current_mut(&mut self, subject: &SubjectKey, id: SessionId) -> Option<&mut PollingSession> {
        self.sessions.get_mut(subject).filter(|s| s.id == id)
    }

    /// Remove the session only if it is still the current one for its key
    pub fn remove_current(&mut self, subject: &SubjectKey, id: SessionId) -> Option<PollingSession> {
        if !self.is_current(subject, id) {
            return None;
        }
        let mut session = self.sessions.remove(subject)?;
        session.release();
        Some(session)
    }

    pub fn snapshots(&self) -> Vec<SessionSnapshot> {
        let mut snapshots: Vec<_> = self.sessions.values().map(PollingSession::snapshot).collect();
        snapshots.sort_by(|a, b| a.subject.cmp(&b.subject));
        snapshots
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
