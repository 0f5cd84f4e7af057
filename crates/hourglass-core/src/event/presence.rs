//! Live viewers per session.
//!
//! A user can hold several connections to the same session (two tabs, a
//! reconnect racing the old socket). They are announced on their first
//! connection and leave with their last.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;

use hourglass_types::event::RealtimeEvent;
use hourglass_types::session::SessionId;

use super::publisher::RealtimePublisher;

pub struct PresenceTracker {
    publisher: Arc<dyn RealtimePublisher>,
    /// Session -> user id -> open connections.
    sessions: DashMap<SessionId, BTreeMap<String, usize>>,
}

impl PresenceTracker {
    pub fn new(publisher: Arc<dyn RealtimePublisher>) -> Self {
        Self {
            publisher,
            sessions: DashMap::new(),
        }
    }

    /// Count a new connection. Returns `true` when the user just became
    /// present.
    pub fn enter(&self, session_id: SessionId, user_id: &str) -> bool {
        let first = {
            let mut members = self.sessions.entry(session_id).or_default();
            let connections = members.entry(user_id.to_string()).or_insert(0);
            *connections += 1;
            *connections == 1
        };
        if first {
            tracing::debug!(%session_id, user_id, "viewer present");
            self.announce(session_id, user_id, true);
        }
        first
    }

    /// Drop a connection. Returns `true` when it was the user's last one.
    pub fn leave(&self, session_id: SessionId, user_id: &str) -> bool {
        let last = match self.sessions.get_mut(&session_id) {
            Some(mut members) => match members.get_mut(user_id) {
                Some(connections) if *connections > 1 => {
                    *connections -= 1;
                    false
                }
                Some(_) => members.remove(user_id).is_some(),
                None => false,
            },
            None => false,
        };
        self.sessions
            .remove_if(&session_id, |_, members| members.is_empty());
        if last {
            tracing::debug!(%session_id, user_id, "viewer gone");
            self.announce(session_id, user_id, false);
        }
        last
    }

    /// User ids with at least one open connection, sorted.
    pub fn present(&self, session_id: &SessionId) -> Vec<String> {
        self.sessions
            .get(session_id)
            .map(|members| members.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn announce(&self, session_id: SessionId, user_id: &str, present: bool) {
        self.publisher.publish(RealtimeEvent::Presence {
            session_id,
            user_id: user_id.to_string(),
            present,
        });
    }
}

impl std::fmt::Debug for PresenceTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceTracker")
            .field("sessions", &self.sessions.len())
            .finish_non_exhaustive()
    }
}
