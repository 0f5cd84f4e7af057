//! Realtime event types for live session viewers.
//!
//! `RealtimeEvent` is broadcast on the session's pub/sub topic whenever a
//! session or turn changes state. All variants are Clone + Send + Sync for
//! use with tokio broadcast channels.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::session::{ParticipantStatus, SessionId, TemplateLength, TemplateSource, VaultVisibility};
use crate::turn::{ResolutionSource, TurnId, TurnStatus};

/// State changes published to everyone watching a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RealtimeEvent {
    SessionCreated {
        session_id: SessionId,
        template_source: TemplateSource,
        template_length: TemplateLength,
        blank_count: usize,
    },

    SessionStarted { session_id: SessionId },

    SessionArchived { session_id: SessionId },

    SessionCompleted {
        session_id: SessionId,
        vault_entry_id: Uuid,
        visibility: VaultVisibility,
    },

    ParticipantStatus {
        session_id: SessionId,
        user_id: String,
        status: ParticipantStatus,
    },

    /// A viewer joined or left the session's live topic.
    Presence {
        session_id: SessionId,
        user_id: String,
        present: bool,
    },

    VaultPublished {
        session_id: SessionId,
        vault_entry_id: Uuid,
        visibility: VaultVisibility,
    },

    /// A turn was resolved; the story advances.
    TurnAdvanced {
        session_id: SessionId,
        turn_id: TurnId,
        status: TurnStatus,
        source: ResolutionSource,
        handle: Option<String>,
        text: String,
    },

    /// The warning threshold before a turn's deadline was crossed.
    TurnWarning {
        session_id: SessionId,
        turn_id: TurnId,
        remaining_ms: i64,
    },

    /// A turn expired and awaits a host override.
    TurnExpired {
        session_id: SessionId,
        turn_id: TurnId,
    },

    /// Any event appended to a turn's log.
    TurnEvent {
        session_id: SessionId,
        turn_id: TurnId,
        event_type: String,
        payload: serde_json::Value,
    },
}

impl RealtimeEvent {
    /// Whether the session is finished after this event. Its topic carries
    /// nothing afterwards except publishing changes.
    pub fn closes_session(&self) -> bool {
        matches!(
            self,
            RealtimeEvent::SessionCompleted { .. } | RealtimeEvent::SessionArchived { .. }
        )
    }

    /// The session whose topic carries this event.
    pub fn session_id(&self) -> SessionId {
        match self {
            RealtimeEvent::SessionCreated { session_id, .. }
            | RealtimeEvent::SessionStarted { session_id }
            | RealtimeEvent::SessionArchived { session_id }
            | RealtimeEvent::SessionCompleted { session_id, .. }
            | RealtimeEvent::ParticipantStatus { session_id, .. }
            | RealtimeEvent::Presence { session_id, .. }
            | RealtimeEvent::VaultPublished { session_id, .. }
            | RealtimeEvent::TurnAdvanced { session_id, .. }
            | RealtimeEvent::TurnWarning { session_id, .. }
            | RealtimeEvent::TurnExpired { session_id, .. }
            | RealtimeEvent::TurnEvent { session_id, .. } => *session_id,
        }
    }

    /// Message name used by pub/sub transports.
    pub fn name(&self) -> &'static str {
        match self {
            RealtimeEvent::SessionCreated { .. } => "session_created",
            RealtimeEvent::SessionStarted { .. } => "session_started",
            RealtimeEvent::SessionArchived { .. } => "session_archived",
            RealtimeEvent::SessionCompleted { .. } => "session_completed",
            RealtimeEvent::ParticipantStatus { .. } => "participant_status",
            RealtimeEvent::Presence { .. } => "presence",
            RealtimeEvent::VaultPublished { .. } => "vault_published",
            RealtimeEvent::TurnAdvanced { .. } => "turn_advanced",
            RealtimeEvent::TurnWarning { .. } => "turn_warning",
            RealtimeEvent::TurnExpired { .. } => "turn_expired",
            RealtimeEvent::TurnEvent { .. } => "turn_event",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_advanced_serde_tag() {
        let event = RealtimeEvent::TurnAdvanced {
            session_id: SessionId::new(),
            turn_id: TurnId::new(),
            status: TurnStatus::AutoFilled,
            source: ResolutionSource::Fallback,
            handle: Some("ai".into()),
            text: "glittering".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "turn_advanced");
        assert_eq!(json["status"], "auto_filled");
        assert_eq!(json["source"], "fallback");
        assert_eq!(json["type"], event.name());
    }

    #[test]
    fn test_terminal_events_close_session() {
        let session_id = SessionId::new();
        assert!(RealtimeEvent::SessionArchived { session_id }.closes_session());
        assert!(!RealtimeEvent::SessionStarted { session_id }.closes_session());
        let presence = RealtimeEvent::Presence {
            session_id,
            user_id: "kai".into(),
            present: true,
        };
        assert_eq!(presence.name(), "presence");
        assert!(!presence.closes_session());
    }

    #[test]
    fn test_session_created_roundtrip() {
        let session_id = SessionId::new();
        let event = RealtimeEvent::SessionCreated {
            session_id,
            template_source: TemplateSource::Seed,
            template_length: TemplateLength::Epic,
            blank_count: 9,
        };
        let json = serde_json::to_string(&event).unwrap();
        let parsed: RealtimeEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.session_id(), session_id);
        assert!(matches!(
            parsed,
            RealtimeEvent::SessionCreated { blank_count: 9, .. }
        ));
    }
}
