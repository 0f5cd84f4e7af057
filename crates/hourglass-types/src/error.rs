use thiserror::Error;

use crate::session::SessionStatus;

/// Errors surfaced by the session/turn state machine.
///
/// Every variant except `Storage` is a caller-visible outcome; `Storage`
/// wraps an unexpected repository failure.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("invalid transition from '{from}' to '{to}'")]
    InvalidTransition {
        from: SessionStatus,
        to: SessionStatus,
    },

    #[error("session is closed ({0})")]
    SessionClosed(SessionStatus),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<RepositoryError> for SessionError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => SessionError::NotFound("entity".to_string()),
            RepositoryError::Conflict(msg) => SessionError::Conflict(msg),
            other => SessionError::Storage(other.to_string()),
        }
    }
}

/// Errors from repository operations (used by trait definitions in hourglass-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors from a single notification channel delivery.
///
/// These never leave the dispatcher; they are logged per channel.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("channel not configured: {0}")]
    NotConfigured(String),

    #[error("delivery timed out after {0}ms")]
    Timeout(u64),

    #[error("upstream rejected delivery (status {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),
}
