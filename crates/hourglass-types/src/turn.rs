use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::notify::ChannelKind;
use crate::session::{ContactPoints, SessionId};

/// Unique identifier for a turn, wrapping a UUID v7 (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TurnId(pub Uuid);

impl TurnId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for TurnId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TurnId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// One blank in a session's story, answered by a participant or the fallback.
///
/// A turn is created `pending` and mutated exactly once, when it resolves.
/// A resolved turn always carries its text, source and timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub id: TurnId,
    pub session_id: SessionId,
    pub order_index: u32,
    pub status: TurnStatus,
    pub prompt: String,
    /// Expected word class, e.g. "adjective".
    pub part_of_speech: String,
    pub creative_nudge: Option<String>,
    /// Token in the template text replaced by the resolved text.
    pub placeholder: String,
    pub assigned_handle: Option<String>,
    pub channels: Vec<ChannelKind>,
    #[serde(default)]
    pub contact: ContactPoints,
    pub deadline: DateTime<Utc>,
    pub resolved_text: Option<String>,
    pub resolution_source: Option<ResolutionSource>,
    pub resolved_handle: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    pub fn is_pending(&self) -> bool {
        self.status == TurnStatus::Pending
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    #[default]
    Pending,
    Submitted,
    AutoFilled,
}

impl fmt::Display for TurnStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnStatus::Pending => write!(f, "pending"),
            TurnStatus::Submitted => write!(f, "submitted"),
            TurnStatus::AutoFilled => write!(f, "auto_filled"),
        }
    }
}

impl FromStr for TurnStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(TurnStatus::Pending),
            "submitted" => Ok(TurnStatus::Submitted),
            "auto_filled" => Ok(TurnStatus::AutoFilled),
            other => Err(format!("invalid turn status: '{other}'")),
        }
    }
}

/// Who produced a turn's resolved text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    Human,
    Fallback,
}

impl ResolutionSource {
    /// Terminal turn status reached when resolving from this source.
    pub fn resolved_status(self) -> TurnStatus {
        match self {
            ResolutionSource::Human => TurnStatus::Submitted,
            ResolutionSource::Fallback => TurnStatus::AutoFilled,
        }
    }
}

impl fmt::Display for ResolutionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionSource::Human => write!(f, "human"),
            ResolutionSource::Fallback => write!(f, "fallback"),
        }
    }
}

impl FromStr for ResolutionSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" => Ok(ResolutionSource::Human),
            "fallback" => Ok(ResolutionSource::Fallback),
            other => Err(format!("invalid resolution source: '{other}'")),
        }
    }
}

/// Well-known turn event types. Any other string is accepted as-is.
pub mod event_type {
    pub const TURN_SEEDED: &str = "turn_seeded";
    pub const SUBMITTED: &str = "submitted";
    pub const AUTO_FILLED: &str = "auto_filled";
    pub const REACTION: &str = "reaction";
    pub const NOTIFICATION_SENT: &str = "notification_sent";
    pub const REASSIGNED: &str = "reassigned";
    pub const SYSTEM_NOTE: &str = "system_note";
}

/// Append-only audit record attached to a turn. Never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnEvent {
    pub id: Uuid,
    pub turn_id: TurnId,
    pub session_id: SessionId,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Tally `reaction` events by their `emoji` payload key.
pub fn reaction_counts(events: &[TurnEvent]) -> BTreeMap<String, u32> {
    let mut counts = BTreeMap::new();
    for event in events.iter().filter(|e| e.event_type == event_type::REACTION) {
        if let Some(emoji) = event.payload.get("emoji").and_then(|v| v.as_str()) {
            *counts.entry(emoji.to_string()).or_insert(0) += 1;
        }
    }
    counts
}

/// Request body for a human or host-override resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveTurnRequest {
    pub text: String,
    #[serde(default)]
    pub handle: Option<String>,
}

/// Request body for appending a turn event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogTurnEventRequest {
    pub event_type: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}
