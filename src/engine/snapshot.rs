//! Immutable view of the client state published by the engine

use std::collections::HashMap;
use std::sync::Arc;

use crate::connection::ConnectionStatus;
use crate::session::Session;

/// Point-in-time copy of the connection status and every session
///
/// Sessions are shared with the engine's store until the engine next writes
/// to them, so taking a snapshot is cheap and never observes a half-applied
/// event.
#[derive(Debug, Clone, Default)]
pub struct ClientSnapshot {
    pub status: ConnectionStatus,
    pub sessions: HashMap<String, Arc<Session>>,
}

impl ClientSnapshot {
    pub fn session(&self, thread_id: &str) -> Option<Arc<Session>> {
        self.sessions.get(thread_id).cloned()
    }

    /// All sessions, oldest first
    pub fn sessions(&self) -> Vec<Arc<Session>> {
        let mut sessions: Vec<_> = self.sessions.values().cloned().collect();
        sessions.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.thread_id.cmp(&b.thread_id))
        });
        sessions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::PermissionMode;
    use chrono::{Duration, Utc};

    #[test]
    fn test_sessions_ordered_by_creation() {
        let now = Utc::now();
        let mut snapshot = ClientSnapshot::default();
        for (id, offset) in [("late", 10), ("early", -10), ("mid", 0)] {
            let session = Session::new(
                id,
                now + Duration::seconds(offset),
                "/",
                PermissionMode::Default,
            );
            snapshot.sessions.insert(id.to_string(), Arc::new(session));
        }

        let order: Vec<_> = snapshot
            .sessions()
            .iter()
            .map(|s| s.thread_id.clone())
            .collect();
        assert_eq!(order, vec!["early", "mid", "late"]);
        assert!(snapshot.session("mid").is_some());
        assert!(snapshot.session("nope").is_none());
    }
}
