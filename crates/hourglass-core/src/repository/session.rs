//! Session repository trait definition.
//!
//! Defines the storage interface for sessions, turns, participants, turn
//! events and vault entries. The infrastructure layer (hourglass-infra)
//! implements it with SQLite; [`super::memory`] provides an in-process
//! implementation.
//!
//! The two mutating operations that can race (`resolve_turn_if_pending` and
//! `complete_session`) are conditional updates: they report whether they
//! applied instead of overwriting.

use chrono::{DateTime, Utc};

use hourglass_types::error::RepositoryError;
use hourglass_types::notify::ChannelKind;
use hourglass_types::session::{
    ContactPoints, FeedEntry, Participant, ParticipantStatus, Session, SessionFilter, SessionId,
    SessionStatus, VaultEntry, VaultVisibility,
};
use hourglass_types::turn::{ResolutionSource, Turn, TurnEvent, TurnId};

/// Everything persisted when a session is created, written atomically.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub session: Session,
    pub turns: Vec<Turn>,
    pub participants: Vec<Participant>,
    /// Seed events written alongside the turns (one `turn_seeded` per turn).
    pub events: Vec<TurnEvent>,
}

/// The single mutation a turn ever receives.
#[derive(Debug, Clone)]
pub struct TurnResolution {
    pub text: String,
    pub source: ResolutionSource,
    pub handle: Option<String>,
    pub resolved_at: DateTime<Utc>,
}

/// New assignee of a pending turn.
#[derive(Debug, Clone)]
pub struct TurnAssignment {
    pub turn_id: TurnId,
    pub handle: String,
    pub channels: Vec<ChannelKind>,
    pub contact: ContactPoints,
}

/// Repository trait for session persistence.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait SessionRepository: Send + Sync {
    // -----------------------------------------------------------------------
    // Sessions
    // -----------------------------------------------------------------------

    /// Insert a session with its turns, participants and seed events in one
    /// transaction.
    fn create_session(
        &self,
        new: &NewSession,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn get_session(
        &self,
        id: &SessionId,
    ) -> impl std::future::Future<Output = Result<Option<Session>, RepositoryError>> + Send;

    /// Sessions matching `filter`, newest first, at most `limit`.
    fn list_sessions(
        &self,
        filter: &SessionFilter,
        limit: u32,
    ) -> impl std::future::Future<Output = Result<Vec<Session>, RepositoryError>> + Send;

    /// Participants in invitation order, the host first.
    fn list_participants(
        &self,
        session_id: &SessionId,
    ) -> impl std::future::Future<Output = Result<Vec<Participant>, RepositoryError>> + Send;

    /// Add new participants at the end of the order. A participant that
    /// already exists keeps its place and is reset to `invited`.
    fn invite_participants(
        &self,
        session_id: &SessionId,
        participants: &[Participant],
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Returns the updated participant, or `None` when the user is not part
    /// of the session.
    fn set_participant_status(
        &self,
        session_id: &SessionId,
        user_id: &str,
        status: ParticipantStatus,
    ) -> impl std::future::Future<Output = Result<Option<Participant>, RepositoryError>> + Send;

    /// Move a session to `to` if its current status is one of `from`.
    ///
    /// Returns `false` (and changes nothing) when the status did not match.
    fn transition_session(
        &self,
        id: &SessionId,
        from: &[SessionStatus],
        to: SessionStatus,
        at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Mark the session completed and insert its vault entry, atomically.
    ///
    /// Applies only when the session status is one of `from` and none of its
    /// turns is pending. Returns `false` otherwise.
    fn complete_session(
        &self,
        id: &SessionId,
        from: &[SessionStatus],
        entry: &VaultEntry,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    fn get_vault_entry(
        &self,
        session_id: &SessionId,
    ) -> impl std::future::Future<Output = Result<Option<VaultEntry>, RepositoryError>> + Send;

    /// Set the visibility of a session's vault entry. A public entry keeps
    /// its first `published_at`; any other visibility clears the publishing
    /// fields. Returns `None` when the session has no entry.
    fn publish_vault_entry(
        &self,
        session_id: &SessionId,
        visibility: VaultVisibility,
        published_by: Option<&str>,
        at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<Option<VaultEntry>, RepositoryError>> + Send;

    /// Public entries, most recently published first.
    fn list_published_entries(
        &self,
        limit: u32,
        offset: u32,
    ) -> impl std::future::Future<Output = Result<Vec<FeedEntry>, RepositoryError>> + Send;

    // -----------------------------------------------------------------------
    // Turns
    // -----------------------------------------------------------------------

    fn get_turn(
        &self,
        id: &TurnId,
    ) -> impl std::future::Future<Output = Result<Option<Turn>, RepositoryError>> + Send;

    /// Turns of a session ordered by `order_index`.
    fn list_turns(
        &self,
        session_id: &SessionId,
    ) -> impl std::future::Future<Output = Result<Vec<Turn>, RepositoryError>> + Send;

    /// Pending turns of every non-terminal session, ordered by deadline.
    fn list_pending_turns(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Turn>, RepositoryError>> + Send;

    /// Compare-and-set resolution.
    ///
    /// Applies `resolution` only if the turn is still `pending` and its
    /// session is not terminal. Returns the updated turn, or `None` when the
    /// condition did not hold.
    fn resolve_turn_if_pending(
        &self,
        id: &TurnId,
        resolution: &TurnResolution,
    ) -> impl std::future::Future<Output = Result<Option<Turn>, RepositoryError>> + Send;

    /// Apply assignments to turns that are still pending and return the
    /// turns that changed.
    fn reassign_turns(
        &self,
        assignments: &[TurnAssignment],
    ) -> impl std::future::Future<Output = Result<Vec<Turn>, RepositoryError>> + Send;

    // -----------------------------------------------------------------------
    // Turn events
    // -----------------------------------------------------------------------

    fn append_turn_event(
        &self,
        event: &TurnEvent,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Events of a turn in insertion order.
    fn list_turn_events(
        &self,
        turn_id: &TurnId,
    ) -> impl std::future::Future<Output = Result<Vec<TurnEvent>, RepositoryError>> + Send;
}
