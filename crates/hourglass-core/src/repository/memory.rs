//! In-process `SessionRepository` backed by hash maps behind one lock.
//!
//! Used by the simulation command and tests. Every operation takes the write
//! lock for its whole duration, which makes the conditional updates atomic.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use hourglass_types::error::RepositoryError;
use hourglass_types::session::{
    FeedEntry, Participant, ParticipantStatus, Session, SessionFilter, SessionId, SessionStatus,
    VaultEntry, VaultVisibility,
};
use hourglass_types::turn::{Turn, TurnEvent, TurnId, TurnStatus};

use super::session::{NewSession, SessionRepository, TurnAssignment, TurnResolution};

#[derive(Default)]
struct State {
    sessions: HashMap<SessionId, Session>,
    turns: HashMap<TurnId, Turn>,
    participants: HashMap<SessionId, Vec<Participant>>,
    events: Vec<TurnEvent>,
    vault: HashMap<SessionId, VaultEntry>,
}

#[derive(Default)]
pub struct InMemorySessionRepository {
    state: RwLock<State>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Debug for InMemorySessionRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemorySessionRepository").finish_non_exhaustive()
    }
}

impl SessionRepository for InMemorySessionRepository {
    async fn create_session(&self, new: &NewSession) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if state.sessions.contains_key(&new.session.id) {
            return Err(RepositoryError::Conflict(format!(
                "session {} already exists",
                new.session.id
            )));
        }
        state.sessions.insert(new.session.id, new.session.clone());
        for turn in &new.turns {
            state.turns.insert(turn.id, turn.clone());
        }
        state
            .participants
            .insert(new.session.id, new.participants.clone());
        state.events.extend(new.events.iter().cloned());
        Ok(())
    }

    async fn get_session(&self, id: &SessionId) -> Result<Option<Session>, RepositoryError> {
        Ok(self.state.read().await.sessions.get(id).cloned())
    }

    async fn list_sessions(
        &self,
        filter: &SessionFilter,
        limit: u32,
    ) -> Result<Vec<Session>, RepositoryError> {
        let state = self.state.read().await;
        let mut sessions: Vec<Session> = state
            .sessions
            .values()
            .filter(|s| filter.status.is_none_or(|status| s.status == status))
            .filter(|s| {
                filter.user_id.as_deref().is_none_or(|user_id| {
                    state
                        .participants
                        .get(&s.id)
                        .is_some_and(|ps| ps.iter().any(|p| p.user_id == user_id))
                })
            })
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.0.cmp(&a.id.0)));
        sessions.truncate(limit as usize);
        Ok(sessions)
    }

    async fn invite_participants(
        &self,
        session_id: &SessionId,
        participants: &[Participant],
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if !state.sessions.contains_key(session_id) {
            return Err(RepositoryError::NotFound);
        }
        let members = state.participants.entry(*session_id).or_default();
        for invited in participants {
            match members.iter_mut().find(|p| p.user_id == invited.user_id) {
                Some(existing) => existing.status = ParticipantStatus::Invited,
                None => members.push(invited.clone()),
            }
        }
        Ok(())
    }

    async fn set_participant_status(
        &self,
        session_id: &SessionId,
        user_id: &str,
        status: ParticipantStatus,
    ) -> Result<Option<Participant>, RepositoryError> {
        let mut state = self.state.write().await;
        let participant = state
            .participants
            .get_mut(session_id)
            .and_then(|ps| ps.iter_mut().find(|p| p.user_id == user_id));
        Ok(participant.map(|p| {
            p.status = status;
            p.clone()
        }))
    }

    async fn list_participants(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<Participant>, RepositoryError> {
        Ok(self
            .state
            .read()
            .await
            .participants
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn transition_session(
        &self,
        id: &SessionId,
        from: &[SessionStatus],
        to: SessionStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.state.write().await;
        let session = state.sessions.get_mut(id).ok_or(RepositoryError::NotFound)?;
        if !from.contains(&session.status) {
            return Ok(false);
        }
        session.status = to;
        session.updated_at = at;
        Ok(true)
    }

    async fn complete_session(
        &self,
        id: &SessionId,
        from: &[SessionStatus],
        entry: &VaultEntry,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.state.write().await;
        let any_pending = state
            .turns
            .values()
            .any(|t| t.session_id == *id && t.status == TurnStatus::Pending);
        if any_pending || state.vault.contains_key(id) {
            return Ok(false);
        }
        let session = state.sessions.get_mut(id).ok_or(RepositoryError::NotFound)?;
        if !from.contains(&session.status) {
            return Ok(false);
        }
        session.status = SessionStatus::Completed;
        session.updated_at = entry.created_at;
        state.vault.insert(*id, entry.clone());
        Ok(true)
    }

    async fn get_vault_entry(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<VaultEntry>, RepositoryError> {
        Ok(self.state.read().await.vault.get(session_id).cloned())
    }

    async fn publish_vault_entry(
        &self,
        session_id: &SessionId,
        visibility: VaultVisibility,
        published_by: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<Option<VaultEntry>, RepositoryError> {
        let mut state = self.state.write().await;
        let Some(entry) = state.vault.get_mut(session_id) else {
            return Ok(None);
        };
        entry.visibility = visibility;
        if visibility == VaultVisibility::Public {
            entry.published_at = Some(entry.published_at.unwrap_or(at));
            entry.published_by = published_by.map(str::to_string);
        } else {
            entry.published_at = None;
            entry.published_by = None;
        }
        Ok(Some(entry.clone()))
    }

    async fn list_published_entries(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<FeedEntry>, RepositoryError> {
        let state = self.state.read().await;
        let mut entries: Vec<FeedEntry> = state
            .vault
            .values()
            .filter(|e| e.visibility == VaultVisibility::Public)
            .filter_map(|e| {
                let session = state.sessions.get(&e.session_id)?;
                Some(FeedEntry {
                    entry: e.clone(),
                    session_title: session.title.clone(),
                    genre: session.genre.clone(),
                    host_id: session.host_id.clone(),
                })
            })
            .collect();
        entries.sort_by_key(|f| {
            std::cmp::Reverse(f.entry.published_at.unwrap_or(f.entry.created_at))
        });
        Ok(entries
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn get_turn(&self, id: &TurnId) -> Result<Option<Turn>, RepositoryError> {
        Ok(self.state.read().await.turns.get(id).cloned())
    }

    async fn list_turns(&self, session_id: &SessionId) -> Result<Vec<Turn>, RepositoryError> {
        let state = self.state.read().await;
        let mut turns: Vec<Turn> = state
            .turns
            .values()
            .filter(|t| t.session_id == *session_id)
            .cloned()
            .collect();
        turns.sort_by_key(|t| t.order_index);
        Ok(turns)
    }

    async fn list_pending_turns(&self) -> Result<Vec<Turn>, RepositoryError> {
        let state = self.state.read().await;
        let mut turns: Vec<Turn> = state
            .turns
            .values()
            .filter(|t| t.is_pending())
            .filter(|t| {
                state
                    .sessions
                    .get(&t.session_id)
                    .is_some_and(|s| !s.status.is_terminal())
            })
            .cloned()
            .collect();
        turns.sort_by_key(|t| t.deadline);
        Ok(turns)
    }

    async fn resolve_turn_if_pending(
        &self,
        id: &TurnId,
        resolution: &TurnResolution,
    ) -> Result<Option<Turn>, RepositoryError> {
        let mut state = self.state.write().await;
        let session_id = match state.turns.get(id) {
            Some(turn) => turn.session_id,
            None => return Err(RepositoryError::NotFound),
        };
        let session_open = state
            .sessions
            .get(&session_id)
            .is_some_and(|s| !s.status.is_terminal());
        let Some(turn) = state.turns.get_mut(id) else {
            return Err(RepositoryError::NotFound);
        };
        if !session_open || turn.status != TurnStatus::Pending {
            return Ok(None);
        }
        turn.status = resolution.source.resolved_status();
        turn.resolved_text = Some(resolution.text.clone());
        turn.resolution_source = Some(resolution.source);
        turn.resolved_handle = resolution.handle.clone();
        turn.resolved_at = Some(resolution.resolved_at);
        Ok(Some(turn.clone()))
    }

    async fn reassign_turns(
        &self,
        assignments: &[TurnAssignment],
    ) -> Result<Vec<Turn>, RepositoryError> {
        let mut state = self.state.write().await;
        let mut changed = Vec::new();
        for assignment in assignments {
            let Some(turn) = state.turns.get_mut(&assignment.turn_id) else {
                continue;
            };
            if !turn.is_pending() {
                continue;
            }
            turn.assigned_handle = Some(assignment.handle.clone());
            turn.channels = assignment.channels.clone();
            turn.contact = assignment.contact.clone();
            changed.push(turn.clone());
        }
        Ok(changed)
    }

    async fn append_turn_event(&self, event: &TurnEvent) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if !state.turns.contains_key(&event.turn_id) {
            return Err(RepositoryError::NotFound);
        }
        state.events.push(event.clone());
        Ok(())
    }

    async fn list_turn_events(&self, turn_id: &TurnId) -> Result<Vec<TurnEvent>, RepositoryError> {
        Ok(self
            .state
            .read()
            .await
            .events
            .iter()
            .filter(|e| e.turn_id == *turn_id)
            .cloned()
            .collect())
    }
}
