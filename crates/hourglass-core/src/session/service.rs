//! Session and turn state machine.
//!
//! `SessionService` is the single authority over lifecycle transitions and
//! over who resolved a turn with what text. Every racing mutation goes
//! through a conditional repository update; the loser gets `Conflict` and
//! produces no side effects.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use serde_json::json;
use uuid::Uuid;

use hourglass_types::error::{RepositoryError, SessionError};
use hourglass_types::event::RealtimeEvent;
use hourglass_types::session::{
    CompleteSessionRequest, CreateSessionRequest, FeedEntry, InvitationAction,
    MAX_RESPONSE_WINDOW_MINUTES, Participant, ParticipantInput, ParticipantRole,
    ParticipantStatus, PublishVaultRequest, Session, SessionDetail, SessionFilter, SessionId,
    SessionStatus, SessionSummary, TemplateSource, VaultEntry, page_size,
};
use hourglass_types::turn::{ResolutionSource, Turn, TurnEvent, TurnId, TurnStatus, event_type};

use crate::event::RealtimePublisher;
use crate::notify::dispatcher::channels_for;
use crate::repository::{NewSession, SessionRepository, TurnAssignment, TurnResolution};
use crate::schedule::timers::TimerRegistry;

use super::story::assemble_story;
use super::template::{self, Blank};

/// Handle recorded when the fallback co-host resolves a turn.
pub const FALLBACK_HANDLE: &str = "ai";

/// A session that just went live, with the pending turns that moved to a
/// different participant and need a fresh prompt.
#[derive(Debug, Clone)]
pub struct Activation {
    pub session: Session,
    pub reassigned: Vec<Turn>,
}

/// Service owning the session/turn lifecycle.
///
/// Generic over the repository so hourglass-core never depends on
/// hourglass-infra.
pub struct SessionService<R: SessionRepository> {
    repo: Arc<R>,
    publisher: Arc<dyn RealtimePublisher>,
    timers: Arc<TimerRegistry>,
    has_default_webhook: bool,
}

impl<R: SessionRepository> SessionService<R> {
    pub fn new(
        repo: Arc<R>,
        publisher: Arc<dyn RealtimePublisher>,
        timers: Arc<TimerRegistry>,
    ) -> Self {
        Self {
            repo,
            publisher,
            timers,
            has_default_webhook: false,
        }
    }

    /// Route every turn to the chat webhook even when its participant has
    /// none of their own.
    pub fn with_default_webhook(mut self, enabled: bool) -> Self {
        self.has_default_webhook = enabled;
        self
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repo
    }

    pub fn timers(&self) -> &Arc<TimerRegistry> {
        &self.timers
    }

    // -----------------------------------------------------------------------
    // Sessions
    // -----------------------------------------------------------------------

    /// Create a `draft` session with one pending turn per blank.
    ///
    /// Turn deadlines are `now + response window` (or the blank's own
    /// window). Turns are assigned round-robin across the host and players.
    pub async fn create_session(
        &self,
        request: CreateSessionRequest,
    ) -> Result<SessionDetail, SessionError> {
        let host_id = request.host_id.trim().to_string();
        if host_id.is_empty() {
            return Err(SessionError::Validation("host_id cannot be empty".into()));
        }
        check_window(request.response_window_minutes, "response window")?;

        let (template_text, blanks, windows) = build_blanks(&request)?;
        if blanks.is_empty() {
            return Err(SessionError::Validation(
                "a session needs at least one turn".into(),
            ));
        }

        let now = Utc::now();
        let session_id = SessionId::new();
        let session = Session {
            id: session_id,
            host_id: host_id.clone(),
            title: default_title(request.title.as_deref(), request.genre.as_deref()),
            genre: request.genre.clone(),
            template_source: request.template_source,
            template_length: request.template_length,
            seed_text: request.seed_text.clone(),
            template_text,
            response_window_minutes: request.response_window_minutes,
            allow_fallback_cohost: request.allow_fallback_cohost,
            visibility: request.visibility,
            status: SessionStatus::Draft,
            created_at: now,
            updated_at: now,
        };

        let participants = build_participants(&request, session_id, &host_id, now);

        let mut turns = Vec::with_capacity(blanks.len());
        let mut events = Vec::with_capacity(blanks.len());
        for (index, blank) in blanks.into_iter().enumerate() {
            let assignee = &participants[index % participants.len()];
            let window = windows[index].unwrap_or(request.response_window_minutes);
            let deadline = deadline_after(now, window)?;
            let turn = Turn {
                id: TurnId::new(),
                session_id,
                order_index: index as u32,
                status: TurnStatus::Pending,
                prompt: blank.prompt,
                part_of_speech: blank.slot,
                creative_nudge: blank.nudge,
                placeholder: blank.placeholder,
                assigned_handle: Some(assignee.handle.clone()),
                channels: channels_for(&assignee.contact, self.has_default_webhook),
                contact: assignee.contact.clone(),
                deadline,
                resolved_text: None,
                resolution_source: None,
                resolved_handle: None,
                resolved_at: None,
                created_at: now,
            };
            events.push(TurnEvent {
                id: Uuid::now_v7(),
                turn_id: turn.id,
                session_id,
                event_type: event_type::TURN_SEEDED.to_string(),
                payload: json!({
                    "order_index": turn.order_index,
                    "slot": turn.part_of_speech,
                    "placeholder": turn.placeholder,
                    "assigned_handle": turn.assigned_handle,
                }),
                created_at: now,
            });
            turns.push(turn);
        }

        let new = NewSession {
            session,
            turns,
            participants,
            events,
        };
        self.repo.create_session(&new).await.map_err(storage)?;

        tracing::info!(
            session_id = %session_id,
            template_source = %new.session.template_source,
            turns = new.turns.len(),
            "session created"
        );
        self.publisher.publish(RealtimeEvent::SessionCreated {
            session_id,
            template_source: new.session.template_source,
            template_length: new.session.template_length,
            blank_count: new.turns.len(),
        });

        Ok(SessionDetail {
            session: new.session,
            turns: new.turns,
            participants: new.participants,
        })
    }

    pub async fn get_session(&self, id: &SessionId) -> Result<Session, SessionError> {
        self.repo
            .get_session(id)
            .await
            .map_err(storage)?
            .ok_or_else(|| SessionError::NotFound(format!("session {id}")))
    }

    pub async fn get_session_detail(&self, id: &SessionId) -> Result<SessionDetail, SessionError> {
        let session = self.get_session(id).await?;
        let turns = self.repo.list_turns(id).await.map_err(storage)?;
        let participants = self.repo.list_participants(id).await.map_err(storage)?;
        Ok(SessionDetail {
            session,
            turns,
            participants,
        })
    }

    /// Sessions matching `filter`, newest first, each with its participants.
    pub async fn list_sessions(
        &self,
        filter: &SessionFilter,
    ) -> Result<Vec<SessionSummary>, SessionError> {
        let sessions = self
            .repo
            .list_sessions(filter, page_size(filter.limit))
            .await
            .map_err(storage)?;
        let mut summaries = Vec::with_capacity(sessions.len());
        for session in sessions {
            let participants = self
                .repo
                .list_participants(&session.id)
                .await
                .map_err(storage)?;
            summaries.push(SessionSummary {
                session,
                participants,
            });
        }
        Ok(summaries)
    }

    /// `draft -> active`.
    ///
    /// Needs at least one accepted participant. Pending turns are then dealt
    /// round-robin over the accepted participants only, so nobody who
    /// declined or never answered is left holding a turn.
    pub async fn activate_session(&self, id: &SessionId) -> Result<Activation, SessionError> {
        let current = self.get_session(id).await?;
        if !current.status.can_transition_to(SessionStatus::Active) {
            return Err(SessionError::InvalidTransition {
                from: current.status,
                to: SessionStatus::Active,
            });
        }
        let participants = self.repo.list_participants(id).await.map_err(storage)?;
        let accepted: Vec<&Participant> = participants
            .iter()
            .filter(|p| p.status == ParticipantStatus::Accepted)
            .collect();
        if accepted.is_empty() {
            return Err(SessionError::PreconditionFailed(
                "at least one participant must accept before the session starts".into(),
            ));
        }

        let session = self
            .transition(id, &[SessionStatus::Draft], SessionStatus::Active)
            .await?;

        let turns = self.repo.list_turns(id).await.map_err(storage)?;
        let assignments: Vec<TurnAssignment> = turns
            .iter()
            .filter(|t| t.is_pending())
            .filter_map(|turn| {
                let assignee = accepted[turn.order_index as usize % accepted.len()];
                let unchanged = turn.assigned_handle.as_deref() == Some(assignee.handle.as_str())
                    && turn.contact == assignee.contact;
                (!unchanged).then(|| TurnAssignment {
                    turn_id: turn.id,
                    handle: assignee.handle.clone(),
                    channels: channels_for(&assignee.contact, self.has_default_webhook),
                    contact: assignee.contact.clone(),
                })
            })
            .collect();
        let reassigned = if assignments.is_empty() {
            Vec::new()
        } else {
            self.repo
                .reassign_turns(&assignments)
                .await
                .map_err(storage)?
        };
        for turn in &reassigned {
            self.record_event(
                turn,
                event_type::REASSIGNED,
                json!({ "assigned_handle": turn.assigned_handle }),
            )
            .await;
        }

        tracing::info!(
            session_id = %id,
            accepted = accepted.len(),
            reassigned = reassigned.len(),
            "session activated"
        );
        self.publisher
            .publish(RealtimeEvent::SessionStarted { session_id: *id });
        Ok(Activation {
            session,
            reassigned,
        })
    }

    /// `{draft, active, completed} -> archived`. Cancels all of the
    /// session's pending timers.
    pub async fn archive_session(&self, id: &SessionId) -> Result<Session, SessionError> {
        let session = self
            .transition(
                id,
                &[
                    SessionStatus::Draft,
                    SessionStatus::Active,
                    SessionStatus::Completed,
                ],
                SessionStatus::Archived,
            )
            .await?;
        let cancelled = self.timers.cancel_session(id);
        tracing::info!(session_id = %id, cancelled_timers = cancelled, "session archived");
        self.publisher
            .publish(RealtimeEvent::SessionArchived { session_id: *id });
        Ok(session)
    }

    // -----------------------------------------------------------------------
    // Participants
    // -----------------------------------------------------------------------

    pub async fn list_participants(
        &self,
        id: &SessionId,
    ) -> Result<Vec<Participant>, SessionError> {
        self.get_session(id).await?;
        self.repo.list_participants(id).await.map_err(storage)
    }

    /// Invite players into a live session.
    ///
    /// Unknown users join at the end of the turn order. Users already in the
    /// session (other than the host) are invited again. Returns the full
    /// participant list.
    pub async fn invite_participants(
        &self,
        id: &SessionId,
        inputs: &[ParticipantInput],
    ) -> Result<Vec<Participant>, SessionError> {
        let session = self.get_session(id).await?;
        if session.status.is_terminal() {
            return Err(SessionError::SessionClosed(session.status));
        }

        let now = Utc::now();
        let mut invited: Vec<Participant> = Vec::with_capacity(inputs.len());
        for input in inputs {
            let Some(player) = player_from_input(input, *id, now) else {
                continue;
            };
            if player.user_id == session.host_id
                || invited.iter().any(|p| p.user_id == player.user_id)
            {
                continue;
            }
            invited.push(player);
        }
        if invited.is_empty() {
            return Err(SessionError::Validation(
                "invite at least one user other than the host".into(),
            ));
        }

        self.repo
            .invite_participants(id, &invited)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => SessionError::NotFound(format!("session {id}")),
                other => storage(other),
            })?;

        tracing::info!(session_id = %id, invited = invited.len(), "participants invited");
        for player in &invited {
            self.publisher.publish(RealtimeEvent::ParticipantStatus {
                session_id: *id,
                user_id: player.user_id.clone(),
                status: ParticipantStatus::Invited,
            });
        }
        self.repo.list_participants(id).await.map_err(storage)
    }

    /// Accept, decline or leave an invitation.
    pub async fn respond_to_invitation(
        &self,
        id: &SessionId,
        user_id: &str,
        action: InvitationAction,
    ) -> Result<Participant, SessionError> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(SessionError::Validation("user_id cannot be empty".into()));
        }
        let session = self.get_session(id).await?;
        if session.status.is_terminal() {
            return Err(SessionError::SessionClosed(session.status));
        }

        let status = action.status();
        let participant = self
            .repo
            .set_participant_status(id, user_id, status)
            .await
            .map_err(storage)?
            .ok_or_else(|| SessionError::NotFound(format!("participant {user_id} in session {id}")))?;

        tracing::info!(session_id = %id, user_id, status = %status, "invitation answered");
        self.publisher.publish(RealtimeEvent::ParticipantStatus {
            session_id: *id,
            user_id: participant.user_id.clone(),
            status,
        });
        Ok(participant)
    }

    async fn transition(
        &self,
        id: &SessionId,
        from: &[SessionStatus],
        to: SessionStatus,
    ) -> Result<Session, SessionError> {
        let applied = self
            .repo
            .transition_session(id, from, to, Utc::now())
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => SessionError::NotFound(format!("session {id}")),
                other => storage(other),
            })?;
        let session = self.get_session(id).await?;
        if !applied {
            return Err(SessionError::InvalidTransition {
                from: session.status,
                to,
            });
        }
        Ok(session)
    }

    /// Complete the session into its vault entry.
    ///
    /// Requires every turn to be resolved. The story is `story_text` when
    /// given, otherwise assembled from the template and resolved turns.
    pub async fn complete_session(
        &self,
        id: &SessionId,
        request: CompleteSessionRequest,
    ) -> Result<VaultEntry, SessionError> {
        let session = self.get_session(id).await?;
        if !session.status.can_transition_to(SessionStatus::Completed) {
            return Err(SessionError::InvalidTransition {
                from: session.status,
                to: SessionStatus::Completed,
            });
        }

        let turns = self.repo.list_turns(id).await.map_err(storage)?;
        let pending = turns.iter().filter(|t| t.is_pending()).count();
        if pending > 0 {
            return Err(SessionError::PreconditionFailed(format!(
                "{pending} turn(s) still pending"
            )));
        }

        let story_text = match request
            .story_text
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            Some(text) => text.to_string(),
            None => assemble_story(session.template_text.as_deref(), &turns),
        };
        let title = request
            .title
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| session.title.clone());

        let entry = VaultEntry {
            id: Uuid::now_v7(),
            session_id: *id,
            title,
            story_text,
            visibility: request.visibility.unwrap_or(session.visibility),
            created_at: Utc::now(),
            published_at: None,
            published_by: None,
        };

        let applied = self
            .repo
            .complete_session(id, &[SessionStatus::Draft, SessionStatus::Active], &entry)
            .await
            .map_err(storage)?;
        if !applied {
            // Lost a race with a concurrent transition; report the current state.
            let current = self.get_session(id).await?;
            let turns = self.repo.list_turns(id).await.map_err(storage)?;
            if turns.iter().any(|t| t.is_pending()) {
                return Err(SessionError::PreconditionFailed(
                    "turns still pending".into(),
                ));
            }
            return Err(SessionError::InvalidTransition {
                from: current.status,
                to: SessionStatus::Completed,
            });
        }

        tracing::info!(session_id = %id, vault_entry_id = %entry.id, "session completed");
        self.publisher.publish(RealtimeEvent::SessionCompleted {
            session_id: *id,
            vault_entry_id: entry.id,
            visibility: entry.visibility,
        });
        Ok(entry)
    }

    pub async fn get_vault_entry(&self, id: &SessionId) -> Result<VaultEntry, SessionError> {
        self.repo
            .get_vault_entry(id)
            .await
            .map_err(storage)?
            .ok_or_else(|| SessionError::NotFound(format!("vault entry for session {id}")))
    }

    /// Set the vault entry's visibility, completing the session first when
    /// it has no entry yet.
    pub async fn publish_vault_entry(
        &self,
        id: &SessionId,
        request: PublishVaultRequest,
    ) -> Result<VaultEntry, SessionError> {
        if self.repo.get_vault_entry(id).await.map_err(storage)?.is_none() {
            let completion = CompleteSessionRequest {
                visibility: Some(request.visibility),
                ..Default::default()
            };
            match self.complete_session(id, completion).await {
                // A concurrent publish completed it first.
                Ok(_)
                | Err(SessionError::InvalidTransition {
                    from: SessionStatus::Completed,
                    ..
                }) => {}
                Err(e) => return Err(e),
            }
        }

        let published_by = request
            .published_by
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let entry = self
            .repo
            .publish_vault_entry(id, request.visibility, published_by, Utc::now())
            .await
            .map_err(storage)?
            .ok_or_else(|| SessionError::NotFound(format!("vault entry for session {id}")))?;

        tracing::info!(
            session_id = %id,
            vault_entry_id = %entry.id,
            visibility = %entry.visibility,
            "vault entry published"
        );
        self.publisher.publish(RealtimeEvent::VaultPublished {
            session_id: *id,
            vault_entry_id: entry.id,
            visibility: entry.visibility,
        });
        Ok(entry)
    }

    /// Public stories, most recently published first.
    pub async fn list_published_entries(
        &self,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<Vec<FeedEntry>, SessionError> {
        self.repo
            .list_published_entries(page_size(limit), offset.unwrap_or(0))
            .await
            .map_err(storage)
    }

    // -----------------------------------------------------------------------
    // Turns
    // -----------------------------------------------------------------------

    pub async fn get_turn(&self, id: &TurnId) -> Result<Turn, SessionError> {
        self.repo
            .get_turn(id)
            .await
            .map_err(storage)?
            .ok_or_else(|| SessionError::NotFound(format!("turn {id}")))
    }

    /// Pending turns of live sessions, earliest deadline first.
    pub async fn pending_turns(&self) -> Result<Vec<Turn>, SessionError> {
        self.repo.list_pending_turns().await.map_err(storage)
    }

    /// Human submission.
    pub async fn submit_turn(
        &self,
        id: &TurnId,
        text: &str,
        handle: Option<String>,
    ) -> Result<Turn, SessionError> {
        self.resolve_turn(id, text, ResolutionSource::Human, handle)
            .await
    }

    /// Fallback or host-override resolution.
    pub async fn auto_fill_turn(
        &self,
        id: &TurnId,
        text: &str,
        handle: Option<String>,
    ) -> Result<Turn, SessionError> {
        let handle = handle.or_else(|| Some(FALLBACK_HANDLE.to_string()));
        self.resolve_turn(id, text, ResolutionSource::Fallback, handle)
            .await
    }

    /// Resolve a pending turn exactly once.
    ///
    /// On success the turn's timers are cancelled, a resolution event is
    /// logged and a `turn_advanced` event is published. A turn that is no
    /// longer pending yields `Conflict` with no side effects.
    pub async fn resolve_turn(
        &self,
        id: &TurnId,
        text: &str,
        source: ResolutionSource,
        handle: Option<String>,
    ) -> Result<Turn, SessionError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::Validation("text cannot be empty".into()));
        }

        let turn = self.get_turn(id).await?;
        let session = self.get_session(&turn.session_id).await?;
        if session.status.is_terminal() {
            return Err(SessionError::SessionClosed(session.status));
        }
        if !turn.is_pending() {
            return Err(SessionError::Conflict(format!(
                "turn {id} already {}",
                turn.status
            )));
        }

        let resolution = TurnResolution {
            text: text.to_string(),
            source,
            handle: handle.filter(|h| !h.trim().is_empty()),
            resolved_at: Utc::now(),
        };
        let Some(resolved) = self
            .repo
            .resolve_turn_if_pending(id, &resolution)
            .await
            .map_err(storage)?
        else {
            let session = self.get_session(&turn.session_id).await?;
            if session.status.is_terminal() {
                return Err(SessionError::SessionClosed(session.status));
            }
            tracing::debug!(turn_id = %id, source = %source, "turn resolution lost race");
            return Err(SessionError::Conflict(format!("turn {id} already resolved")));
        };

        self.timers.cancel(id);
        tracing::info!(
            session_id = %resolved.session_id,
            turn_id = %id,
            source = %source,
            "turn resolved"
        );

        let kind = match source {
            ResolutionSource::Human => event_type::SUBMITTED,
            ResolutionSource::Fallback => event_type::AUTO_FILLED,
        };
        self.record_event(
            &resolved,
            kind,
            json!({
                "text": resolved.resolved_text,
                "handle": resolved.resolved_handle,
                "source": source,
            }),
        )
        .await;
        self.publisher.publish(RealtimeEvent::TurnAdvanced {
            session_id: resolved.session_id,
            turn_id: resolved.id,
            status: resolved.status,
            source,
            handle: resolved.resolved_handle.clone(),
            text: text.to_string(),
        });

        Ok(resolved)
    }

    /// Append an event to a turn's log.
    ///
    /// Best-effort: an unknown turn or a storage failure is logged and
    /// yields `None`; it never fails the caller.
    pub async fn log_turn_event(
        &self,
        id: &TurnId,
        event_type: &str,
        payload: serde_json::Value,
    ) -> Option<TurnEvent> {
        let event_type = event_type.trim();
        if event_type.is_empty() {
            tracing::debug!(turn_id = %id, "ignoring turn event without a type");
            return None;
        }
        let turn = match self.repo.get_turn(id).await {
            Ok(Some(turn)) => turn,
            Ok(None) => {
                tracing::debug!(turn_id = %id, event_type, "ignoring event for unknown turn");
                return None;
            }
            Err(e) => {
                tracing::warn!(turn_id = %id, error = %e, "failed to load turn for event");
                return None;
            }
        };
        self.record_event(&turn, event_type, payload).await
    }

    async fn record_event(
        &self,
        turn: &Turn,
        event_type: &str,
        payload: serde_json::Value,
    ) -> Option<TurnEvent> {
        let event = TurnEvent {
            id: Uuid::now_v7(),
            turn_id: turn.id,
            session_id: turn.session_id,
            event_type: event_type.to_string(),
            payload,
            created_at: Utc::now(),
        };
        if let Err(e) = self.repo.append_turn_event(&event).await {
            tracing::warn!(turn_id = %turn.id, event_type, error = %e, "failed to append turn event");
            return None;
        }
        self.publisher.publish(RealtimeEvent::TurnEvent {
            session_id: event.session_id,
            turn_id: event.turn_id,
            event_type: event.event_type.clone(),
            payload: event.payload.clone(),
        });
        Some(event)
    }

    pub async fn list_turn_events(&self, id: &TurnId) -> Result<Vec<TurnEvent>, SessionError> {
        self.get_turn(id).await?;
        self.repo.list_turn_events(id).await.map_err(storage)
    }
}

fn storage(err: RepositoryError) -> SessionError {
    SessionError::Storage(err.to_string())
}

/// Windows must lie in `1..=MAX_RESPONSE_WINDOW_MINUTES`.
fn check_window(minutes: i64, what: &str) -> Result<(), SessionError> {
    if minutes <= 0 {
        return Err(SessionError::Validation(format!("{what} must be positive")));
    }
    if minutes > MAX_RESPONSE_WINDOW_MINUTES {
        return Err(SessionError::Validation(format!(
            "{what} cannot exceed {MAX_RESPONSE_WINDOW_MINUTES} minutes"
        )));
    }
    Ok(())
}

fn deadline_after(now: DateTime<Utc>, minutes: i64) -> Result<DateTime<Utc>, SessionError> {
    TimeDelta::try_minutes(minutes)
        .and_then(|window| now.checked_add_signed(window))
        .ok_or_else(|| {
            SessionError::Validation(format!(
                "response window of {minutes} minutes is out of range"
            ))
        })
}

/// `"{Genre} Party"`, or a generic title when no genre is set.
fn default_title(title: Option<&str>, genre: Option<&str>) -> String {
    if let Some(title) = title.map(str::trim).filter(|t| !t.is_empty()) {
        return title.to_string();
    }
    match genre.map(str::trim).filter(|g| !g.is_empty()) {
        Some(genre) => {
            let mut chars = genre.chars();
            let capitalized: String = match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            };
            format!("{capitalized} Party")
        }
        None => "Hourglass Session".to_string(),
    }
}

/// `@` followed by the first six characters of the user id.
pub fn default_handle(user_id: &str) -> String {
    let short: String = user_id.chars().take(6).collect();
    format!("@{short}")
}

type BlankPlan = (Option<String>, Vec<Blank>, Vec<Option<i64>>);

/// Blanks (and per-blank window overrides) for a create request.
fn build_blanks(request: &CreateSessionRequest) -> Result<BlankPlan, SessionError> {
    match request.template_source {
        TemplateSource::Ai | TemplateSource::Seed => {
            let seed = match request.template_source {
                TemplateSource::Seed => request.seed_text.as_deref(),
                _ => None,
            };
            let generated =
                template::generate(request.genre.as_deref(), request.template_length, seed);
            let windows = vec![None; generated.blanks.len()];
            Ok((Some(generated.template_text), generated.blanks, windows))
        }
        TemplateSource::Custom => {
            if request.blanks.is_empty() {
                return Err(SessionError::Validation(
                    "custom sessions must define at least one blank".into(),
                ));
            }
            let mut blanks = Vec::with_capacity(request.blanks.len());
            let mut windows = Vec::with_capacity(request.blanks.len());
            for (index, blank) in request.blanks.iter().enumerate() {
                let slot = blank.slot.trim();
                if slot.is_empty() || blank.prompt.trim().is_empty() {
                    return Err(SessionError::Validation(format!(
                        "blank {} needs a slot and a prompt",
                        index + 1
                    )));
                }
                if let Some(window) = blank.response_window_minutes {
                    check_window(window, &format!("blank {} response window", index + 1))?;
                }
                let id = format!("{slot}_{}", index + 1);
                blanks.push(Blank {
                    placeholder: blank
                        .placeholder
                        .clone()
                        .filter(|p| !p.trim().is_empty())
                        .unwrap_or_else(|| template::placeholder(&id, slot)),
                    id,
                    slot: slot.to_string(),
                    prompt: blank.prompt.trim().to_string(),
                    nudge: blank
                        .nudge
                        .clone()
                        .or_else(|| template::slot_def(slot).map(template::creative_nudge)),
                });
                windows.push(blank.response_window_minutes);
            }
            let template_text = request
                .template_text
                .clone()
                .filter(|t| !t.trim().is_empty());
            Ok((template_text, blanks, windows))
        }
    }
}

/// Host (accepted) followed by each distinct invited player.
fn build_participants(
    request: &CreateSessionRequest,
    session_id: SessionId,
    host_id: &str,
    now: chrono::DateTime<Utc>,
) -> Vec<Participant> {
    let mut participants = vec![Participant {
        session_id,
        user_id: host_id.to_string(),
        handle: request
            .host_handle
            .clone()
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| default_handle(host_id)),
        role: ParticipantRole::Host,
        status: ParticipantStatus::Accepted,
        contact: request.host_contact.clone(),
        joined_at: now,
    }];

    for input in &request.participants {
        let Some(player) = player_from_input(input, session_id, now) else {
            continue;
        };
        if participants.iter().any(|p| p.user_id == player.user_id) {
            continue;
        }
        participants.push(player);
    }
    participants
}

/// An invited player, or `None` for a blank user id.
fn player_from_input(
    input: &ParticipantInput,
    session_id: SessionId,
    now: DateTime<Utc>,
) -> Option<Participant> {
    let user_id = input.user_id.trim();
    if user_id.is_empty() {
        return None;
    }
    Some(Participant {
        session_id,
        user_id: user_id.to_string(),
        handle: input
            .handle
            .clone()
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| default_handle(user_id)),
        role: ParticipantRole::Player,
        status: ParticipantStatus::Invited,
        contact: input.contact.clone(),
        joined_at: now,
    })
}

impl<R: SessionRepository> std::fmt::Debug for SessionService<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionService")
            .field("timers", &self.timers)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use hourglass_types::session::{BlankSpec, ContactPoints, VaultVisibility};

    use super::*;
    use crate::event::EventBus;
    use crate::repository::InMemorySessionRepository;

    fn service() -> (Arc<SessionService<InMemorySessionRepository>>, EventBus) {
        let bus = EventBus::new(64);
        let service = SessionService::new(
            Arc::new(InMemorySessionRepository::new()),
            Arc::new(bus.clone()),
            Arc::new(TimerRegistry::new()),
        );
        (Arc::new(service), bus)
    }

    fn blank(slot: &str, prompt: &str) -> BlankSpec {
        BlankSpec {
            slot: slot.to_string(),
            prompt: prompt.to_string(),
            placeholder: None,
            nudge: None,
            response_window_minutes: None,
        }
    }

    fn custom_request(blanks: Vec<BlankSpec>) -> CreateSessionRequest {
        let mut request = CreateSessionRequest::new("host-123456789");
        request.template_source = TemplateSource::Custom;
        request.template_text = Some("The [[NOUN_1::noun]] likes to [[VERB_2::verb]].".into());
        request.blanks = blanks;
        request
    }

    #[tokio::test]
    async fn generated_session_seeds_one_turn_per_slot() {
        let (service, bus) = service();
        let mut rx = bus.subscribe();
        let mut request = CreateSessionRequest::new("host-1");
        request.genre = Some("heist".into());

        let detail = service.create_session(request).await.unwrap();

        assert_eq!(detail.session.status, SessionStatus::Draft);
        assert_eq!(detail.session.title, "Heist Party");
        assert_eq!(detail.turns.len(), template::SLOTS.len());
        for (index, turn) in detail.turns.iter().enumerate() {
            assert_eq!(turn.order_index as usize, index);
            assert!(turn.is_pending());
            let window = turn.deadline - turn.created_at;
            assert_eq!(window, TimeDelta::minutes(5));
        }
        let first = &detail.turns[0];
        let events = service.list_turn_events(&first.id).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, event_type::TURN_SEEDED);

        match rx.recv().await.unwrap() {
            RealtimeEvent::SessionCreated { blank_count, .. } => {
                assert_eq!(blank_count, template::SLOTS.len())
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn custom_blanks_get_default_placeholders_and_windows() {
        let (service, _bus) = service();
        let mut second = blank("verb", "An action");
        second.response_window_minutes = Some(2);
        let detail = service
            .create_session(custom_request(vec![blank("noun", "A thing"), second]))
            .await
            .unwrap();

        assert_eq!(detail.session.title, "Hourglass Session");
        assert_eq!(detail.turns[0].placeholder, "[[NOUN_1::noun]]");
        assert_eq!(detail.turns[1].placeholder, "[[VERB_2::verb]]");
        assert!(detail.turns[1].creative_nudge.is_some());
        assert_eq!(
            detail.turns[1].deadline - detail.turns[1].created_at,
            TimeDelta::minutes(2)
        );
    }

    #[tokio::test]
    async fn create_rejects_bad_requests() {
        let (service, _bus) = service();

        let err = service.create_session(custom_request(vec![])).await.unwrap_err();
        assert!(matches!(err, SessionError::Validation(_)));

        let mut request = CreateSessionRequest::new("host");
        request.response_window_minutes = 0;
        let err = service.create_session(request).await.unwrap_err();
        assert!(matches!(err, SessionError::Validation(_)));

        let err = service
            .create_session(CreateSessionRequest::new("  "))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Validation(_)));

        let mut bad = blank("noun", "thing");
        bad.response_window_minutes = Some(-1);
        let err = service.create_session(custom_request(vec![bad])).await.unwrap_err();
        assert!(matches!(err, SessionError::Validation(_)));
    }

    #[tokio::test]
    async fn oversized_windows_are_rejected_without_panicking() {
        let (service, _bus) = service();

        let mut request = CreateSessionRequest::new("host");
        request.response_window_minutes = 1_000_000_000_000;
        let err = service.create_session(request).await.unwrap_err();
        assert!(matches!(err, SessionError::Validation(_)));

        let mut request = CreateSessionRequest::new("host");
        request.response_window_minutes = i64::MAX;
        let err = service.create_session(request).await.unwrap_err();
        assert!(matches!(err, SessionError::Validation(_)));

        let mut huge = blank("noun", "thing");
        huge.response_window_minutes = Some(MAX_RESPONSE_WINDOW_MINUTES + 1);
        let err = service.create_session(custom_request(vec![huge])).await.unwrap_err();
        assert!(matches!(err, SessionError::Validation(_)));

        let mut longest = blank("noun", "thing");
        longest.response_window_minutes = Some(MAX_RESPONSE_WINDOW_MINUTES);
        let detail = service.create_session(custom_request(vec![longest])).await.unwrap();
        assert_eq!(
            detail.turns[0].deadline - detail.turns[0].created_at,
            TimeDelta::minutes(MAX_RESPONSE_WINDOW_MINUTES)
        );
        assert_eq!(service.pending_turns().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn turns_rotate_through_participants() {
        let (service, _bus) = service();
        let mut request = custom_request(vec![
            blank("noun", "a"),
            blank("verb", "b"),
            blank("adjective", "c"),
        ]);
        request.participants = vec![
            ParticipantInput {
                user_id: "player-abcdefgh".into(),
                handle: None,
                contact: ContactPoints {
                    email: Some("p@example.com".into()),
                    ..ContactPoints::default()
                },
            },
            ParticipantInput {
                user_id: "host-123456789".into(),
                handle: Some("@dupe".into()),
                contact: ContactPoints::default(),
            },
        ];

        let detail = service.create_session(request).await.unwrap();

        assert_eq!(detail.participants.len(), 2);
        assert_eq!(detail.participants[0].role, ParticipantRole::Host);
        assert_eq!(detail.participants[0].handle, "@host-1");
        let handles: Vec<_> = detail
            .turns
            .iter()
            .map(|t| t.assigned_handle.clone().unwrap())
            .collect();
        assert_eq!(handles, vec!["@host-1", "@player", "@host-1"]);
        assert_eq!(detail.turns[1].channels, vec![hourglass_types::notify::ChannelKind::Email]);
        assert!(detail.turns[0].channels.is_empty());
    }

    #[tokio::test]
    async fn turn_resolves_exactly_once() {
        let (service, _bus) = service();
        let detail = service
            .create_session(custom_request(vec![blank("noun", "thing")]))
            .await
            .unwrap();
        let turn_id = detail.turns[0].id;

        let resolved = service
            .submit_turn(&turn_id, "  walrus ", Some("@kai".into()))
            .await
            .unwrap();
        assert_eq!(resolved.status, TurnStatus::Submitted);
        assert_eq!(resolved.resolved_text.as_deref(), Some("walrus"));
        assert_eq!(resolved.resolution_source, Some(ResolutionSource::Human));

        let err = service
            .auto_fill_turn(&turn_id, "teapot", None)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Conflict(_)));
        let turn = service.get_turn(&turn_id).await.unwrap();
        assert_eq!(turn.resolved_text.as_deref(), Some("walrus"));

        let kinds: Vec<_> = service
            .list_turn_events(&turn_id)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.event_type)
            .collect();
        assert_eq!(kinds, vec![event_type::TURN_SEEDED, event_type::SUBMITTED]);
    }

    #[tokio::test]
    async fn concurrent_resolutions_have_one_winner() {
        let (service, _bus) = service();
        let detail = service
            .create_session(custom_request(vec![blank("noun", "thing")]))
            .await
            .unwrap();
        let turn_id = detail.turns[0].id;

        let mut tasks = Vec::new();
        for i in 0..8 {
            let service = Arc::clone(&service);
            tasks.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    service.submit_turn(&turn_id, &format!("human {i}"), None).await
                } else {
                    service.auto_fill_turn(&turn_id, &format!("ai {i}"), None).await
                }
            }));
        }
        let mut winners = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => winners += 1,
                Err(SessionError::Conflict(_)) => {}
                Err(other) => panic!("unexpected error {other}"),
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn empty_text_and_unknown_turn_are_rejected() {
        let (service, _bus) = service();
        let detail = service
            .create_session(custom_request(vec![blank("noun", "thing")]))
            .await
            .unwrap();

        let err = service
            .submit_turn(&detail.turns[0].id, "   ", None)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Validation(_)));

        let err = service
            .submit_turn(&TurnId::new(), "x", None)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::NotFound(_)));
    }

    #[tokio::test]
    async fn lifecycle_transitions_are_forward_only() {
        let (service, _bus) = service();
        let detail = service
            .create_session(custom_request(vec![blank("noun", "thing")]))
            .await
            .unwrap();
        let id = detail.session.id;

        let active = service.activate_session(&id).await.unwrap();
        assert_eq!(active.session.status, SessionStatus::Active);
        assert!(active.reassigned.is_empty());
        let err = service.activate_session(&id).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::InvalidTransition {
                from: SessionStatus::Active,
                to: SessionStatus::Active
            }
        ));

        let err = service.activate_session(&SessionId::new()).await.unwrap_err();
        assert!(matches!(err, SessionError::NotFound(_)));
    }

    fn player(user_id: &str) -> ParticipantInput {
        ParticipantInput {
            user_id: user_id.to_string(),
            handle: None,
            contact: ContactPoints {
                email: Some(format!("{}@example.com", user_id.trim())),
                phone: None,
                chat_webhook: None,
            },
        }
    }

    #[tokio::test]
    async fn invitations_extend_the_roster() {
        let (service, bus) = service();
        let detail = service
            .create_session(custom_request(vec![blank("noun", "a")]))
            .await
            .unwrap();
        let id = detail.session.id;
        let mut rx = bus.subscribe();

        let roster = service
            .invite_participants(
                &id,
                &[player("kai"), player("kai"), player("host-123456789"), player("  ")],
            )
            .await
            .unwrap();
        let ids: Vec<&str> = roster.iter().map(|p| p.user_id.as_str()).collect();
        assert_eq!(ids, vec!["host-123456789", "kai"]);
        assert_eq!(roster[1].status, ParticipantStatus::Invited);
        assert_eq!(roster[1].handle, "@kai");
        match rx.recv().await.unwrap() {
            RealtimeEvent::ParticipantStatus {
                user_id, status, ..
            } => {
                assert_eq!(user_id, "kai");
                assert_eq!(status, ParticipantStatus::Invited);
            }
            other => panic!("unexpected event {other:?}"),
        }

        let accepted = service
            .respond_to_invitation(&id, "kai", InvitationAction::Accept)
            .await
            .unwrap();
        assert_eq!(accepted.status, ParticipantStatus::Accepted);
        let err = service
            .respond_to_invitation(&id, "nobody", InvitationAction::Accept)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::NotFound(_)));
        let err = service
            .invite_participants(&id, &[player("host-123456789")])
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Validation(_)));

        service.archive_session(&id).await.unwrap();
        let err = service.invite_participants(&id, &[player("ana")]).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::SessionClosed(SessionStatus::Archived)
        ));
        let err = service
            .respond_to_invitation(&id, "kai", InvitationAction::Leave)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::SessionClosed(_)));

        let err = service.list_participants(&SessionId::new()).await.unwrap_err();
        assert!(matches!(err, SessionError::NotFound(_)));
    }

    #[tokio::test]
    async fn activation_needs_an_accepted_participant() {
        let (service, _bus) = service();
        let mut request = custom_request(vec![
            blank("noun", "a"),
            blank("verb", "b"),
            blank("noun", "c"),
        ]);
        request.participants = vec![player("kai"), player("ana")];
        let detail = service.create_session(request).await.unwrap();
        let id = detail.session.id;
        assert_eq!(detail.turns[1].assigned_handle.as_deref(), Some("@kai"));

        service
            .respond_to_invitation(&id, "host-123456789", InvitationAction::Leave)
            .await
            .unwrap();
        let err = service.activate_session(&id).await.unwrap_err();
        assert!(matches!(err, SessionError::PreconditionFailed(_)));
        assert_eq!(
            service.get_session(&id).await.unwrap().status,
            SessionStatus::Draft
        );

        service
            .respond_to_invitation(&id, "kai", InvitationAction::Decline)
            .await
            .unwrap();
        service
            .respond_to_invitation(&id, "ana", InvitationAction::Accept)
            .await
            .unwrap();
        let activation = service.activate_session(&id).await.unwrap();
        assert_eq!(activation.session.status, SessionStatus::Active);

        // Turn 2 was already ana's; the host's and kai's turns move to her.
        let moved: Vec<u32> = activation.reassigned.iter().map(|t| t.order_index).collect();
        assert_eq!(moved, vec![0, 1]);
        let turns = service.get_session_detail(&id).await.unwrap().turns;
        for turn in &turns {
            assert_eq!(turn.assigned_handle.as_deref(), Some("@ana"));
            assert_eq!(turn.contact.email.as_deref(), Some("ana@example.com"));
        }
        let events = service.list_turn_events(&turns[1].id).await.unwrap();
        assert_eq!(
            events.last().map(|e| e.event_type.as_str()),
            Some(event_type::REASSIGNED)
        );
    }

    #[tokio::test]
    async fn sessions_are_listed_newest_first_with_rosters() {
        let (service, _bus) = service();
        let first = service
            .create_session(custom_request(vec![blank("noun", "a")]))
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let mut request = custom_request(vec![blank("noun", "a")]);
        request.participants = vec![player("kai")];
        let second = service.create_session(request).await.unwrap();

        let all = service.list_sessions(&SessionFilter::default()).await.unwrap();
        let ids: Vec<SessionId> = all.iter().map(|s| s.session.id).collect();
        assert_eq!(ids, vec![second.session.id, first.session.id]);
        assert_eq!(all[0].participants.len(), 2);

        let kai = SessionFilter {
            user_id: Some("kai".into()),
            ..Default::default()
        };
        assert_eq!(service.list_sessions(&kai).await.unwrap().len(), 1);
        let active = SessionFilter {
            status: Some(SessionStatus::Active),
            ..Default::default()
        };
        assert!(service.list_sessions(&active).await.unwrap().is_empty());
        let one = SessionFilter {
            limit: Some(1),
            ..Default::default()
        };
        assert_eq!(service.list_sessions(&one).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn publishing_completes_the_session_and_feeds_the_vault() {
        let (service, bus) = service();
        let detail = service
            .create_session(custom_request(vec![blank("noun", "a")]))
            .await
            .unwrap();
        let id = detail.session.id;

        let err = service
            .publish_vault_entry(&id, PublishVaultRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::PreconditionFailed(_)));

        service
            .submit_turn(&detail.turns[0].id, "walrus", None)
            .await
            .unwrap();
        let mut rx = bus.subscribe();
        let request = PublishVaultRequest {
            published_by: Some("host-123456789".into()),
            ..Default::default()
        };
        let entry = service.publish_vault_entry(&id, request).await.unwrap();
        assert_eq!(entry.visibility, VaultVisibility::Public);
        assert!(entry.published_at.is_some());
        assert_eq!(entry.published_by.as_deref(), Some("host-123456789"));
        assert_eq!(
            service.get_session(&id).await.unwrap().status,
            SessionStatus::Completed
        );
        let mut names = Vec::new();
        while let Ok(event) = rx.try_recv() {
            names.push(event.name());
        }
        assert_eq!(names, vec!["session_completed", "vault_published"]);

        let feed = service.list_published_entries(None, None).await.unwrap();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].session_title, "Hourglass Session");
        assert_eq!(feed[0].host_id, "host-123456789");

        let hidden = PublishVaultRequest {
            visibility: VaultVisibility::InviteOnly,
            published_by: None,
        };
        let entry = service.publish_vault_entry(&id, hidden).await.unwrap();
        assert!(entry.published_at.is_none());
        assert!(service.list_published_entries(None, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn completion_requires_every_turn_resolved() {
        let (service, bus) = service();
        let detail = service
            .create_session(custom_request(vec![blank("noun", "a"), blank("verb", "b")]))
            .await
            .unwrap();
        let id = detail.session.id;

        service.submit_turn(&detail.turns[0].id, "otter", None).await.unwrap();
        let err = service
            .complete_session(&id, CompleteSessionRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::PreconditionFailed(_)));

        service.auto_fill_turn(&detail.turns[1].id, "juggle", None).await.unwrap();
        let mut rx = bus.subscribe();
        let entry = service
            .complete_session(&id, CompleteSessionRequest::default())
            .await
            .unwrap();
        assert_eq!(entry.story_text, "The otter likes to juggle.");
        assert_eq!(entry.title, "Hourglass Session");
        assert!(matches!(
            rx.recv().await.unwrap(),
            RealtimeEvent::SessionCompleted { .. }
        ));

        let stored = service.get_vault_entry(&id).await.unwrap();
        assert_eq!(stored.id, entry.id);

        let err = service
            .complete_session(&id, CompleteSessionRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn explicit_story_text_overrides_assembly() {
        let (service, _bus) = service();
        let detail = service
            .create_session(custom_request(vec![blank("noun", "a")]))
            .await
            .unwrap();
        service.submit_turn(&detail.turns[0].id, "kite", None).await.unwrap();

        let entry = service
            .complete_session(
                &detail.session.id,
                CompleteSessionRequest {
                    story_text: Some("Once upon a kite.".into()),
                    title: Some("Kites".into()),
                    visibility: Some(hourglass_types::session::VaultVisibility::Public),
                },
            )
            .await
            .unwrap();
        assert_eq!(entry.story_text, "Once upon a kite.");
        assert_eq!(entry.title, "Kites");
    }

    #[tokio::test]
    async fn archived_session_rejects_resolution_and_cancels_timers() {
        let (service, _bus) = service();
        let detail = service
            .create_session(custom_request(vec![blank("noun", "a")]))
            .await
            .unwrap();
        let turn_id = detail.turns[0].id;
        let armed = service.timers().register(turn_id, detail.session.id);

        service.archive_session(&detail.session.id).await.unwrap();
        assert!(armed.token.is_cancelled());

        let err = service.submit_turn(&turn_id, "late", None).await.unwrap_err();
        assert!(matches!(err, SessionError::SessionClosed(SessionStatus::Archived)));
        assert!(service.pending_turns().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn turn_events_are_best_effort() {
        let (service, _bus) = service();
        let detail = service
            .create_session(custom_request(vec![blank("noun", "a")]))
            .await
            .unwrap();
        let turn_id = detail.turns[0].id;

        assert!(
            service
                .log_turn_event(&TurnId::new(), event_type::REACTION, json!({"emoji": "🔥"}))
                .await
                .is_none()
        );
        let event = service
            .log_turn_event(&turn_id, event_type::REACTION, json!({"emoji": "🔥"}))
            .await
            .unwrap();
        assert_eq!(event.session_id, detail.session.id);

        let err = service.list_turn_events(&TurnId::new()).await.unwrap_err();
        assert!(matches!(err, SessionError::NotFound(_)));
    }

    #[test]
    fn default_handle_uses_id_prefix() {
        assert_eq!(default_handle("abcdefghij"), "@abcdef");
        assert_eq!(default_handle("ab"), "@ab");
    }
}
