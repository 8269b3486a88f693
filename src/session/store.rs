//! Session store
//!
//! Owned by the engine task, so plain `HashMap` access is enough. Sessions
//! are kept behind `Arc` and mutated copy-on-write, which lets snapshots
//! share untouched sessions with the live store.

use std::collections::HashMap;
use std::sync::Arc;

use crate::types::{ClientError, Result};

use super::session::Session;

/// In-memory mapping from thread id to session state
#[derive(Debug, Default, Clone)]
pub struct SessionStore {
    sessions: HashMap<String, Arc<Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a freshly created session
    ///
    /// Fails if the thread id is already present; the existing session is
    /// left untouched.
    pub fn insert(&mut self, session: Session) -> Result<Arc<Session>> {
        use std::collections::hash_map::Entry;

        match self.sessions.entry(session.thread_id.clone()) {
            Entry::Occupied(_) => Err(ClientError::session_already_exists(session.thread_id)),
            Entry::Vacant(vacant) => {
                let session = Arc::new(session);
                vacant.insert(Arc::clone(&session));
                Ok(session)
            }
        }
    }

    pub fn get(&self, thread_id: &str) -> Option<Arc<Session>> {
        self.sessions.get(thread_id).cloned()
    }

    /// Get a session or return SessionNotFound
    pub fn get_or_error(&self, thread_id: &str) -> Result<Arc<Session>> {
        self.get(thread_id)
            .ok_or_else(|| ClientError::session_not_found(thread_id))
    }

    /// Mutable access, cloning the session if a snapshot still shares it
    pub fn get_mut(&mut self, thread_id: &str) -> Option<&mut Session> {
        self.sessions.get_mut(thread_id).map(Arc::make_mut)
    }

    /// Mutable access to the session whose active turn is `turn_id`
    pub fn find_by_turn_mut(&mut self, turn_id: &str) -> Option<&mut Session> {
        self.sessions
            .values_mut()
            .find(|session| session.active_turn_id.as_deref() == Some(turn_id))
            .map(Arc::make_mut)
    }

    /// Apply `f` to a session, failing with SessionNotFound if absent
    pub fn update<F, R>(&mut self, thread_id: &str, f: F) -> Result<R>
    where
        F: FnOnce(&mut Session) -> R,
    {
        self.get_mut(thread_id)
            .map(f)
            .ok_or_else(|| ClientError::session_not_found(thread_id))
    }

    pub fn remove(&mut self, thread_id: &str) -> Option<Arc<Session>> {
        self.sessions.remove(thread_id)
    }

    pub fn contains(&self, thread_id: &str) -> bool {
        self.sessions.contains_key(thread_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn clear(&mut self) {
        self.sessions.clear();
    }

    /// Shallow copy of the table for publishing
    pub fn share(&self) -> HashMap<String, Arc<Session>> {
        self.sessions.clone()
    }
}
