//! `HourglassEngine` wires the state machine to the deadline scheduler.
//!
//! Entry points (HTTP handlers, the simulate command) talk to the engine
//! rather than to `SessionService` directly, so that creating a session
//! always arms its timers and sends its prompts.

use std::sync::Arc;
use std::time::Duration;

use hourglass_types::config::SchedulerConfig;
use hourglass_types::error::SessionError;
use hourglass_types::session::{
    CompleteSessionRequest, CreateSessionRequest, FeedEntry, InvitationAction, Participant,
    ParticipantInput, PublishVaultRequest, Session, SessionDetail, SessionFilter, SessionId,
    SessionSummary, VaultEntry,
};
use hourglass_types::turn::{Turn, TurnEvent, TurnId};

use crate::analytics::AnalyticsSink;
use crate::event::RealtimePublisher;
use crate::llm::FallbackGenerator;
use crate::notify::NotificationDispatcher;
use crate::repository::SessionRepository;
use crate::schedule::{ExpirationScheduler, TimerRegistry};
use crate::session::SessionService;

pub struct HourglassEngine<R: SessionRepository> {
    service: Arc<SessionService<R>>,
    scheduler: ExpirationScheduler<R>,
}

impl<R: SessionRepository> Clone for HourglassEngine<R> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            scheduler: self.scheduler.clone(),
        }
    }
}

impl<R: SessionRepository + 'static> HourglassEngine<R> {
    pub fn new(
        repo: Arc<R>,
        publisher: Arc<dyn RealtimePublisher>,
        dispatcher: NotificationDispatcher,
        fallback: FallbackGenerator,
        analytics: Arc<dyn AnalyticsSink>,
        config: &SchedulerConfig,
    ) -> Self {
        let has_default_webhook = dispatcher.has_default_webhook();
        let service = Arc::new(
            SessionService::new(repo, Arc::clone(&publisher), Arc::new(TimerRegistry::new()))
                .with_default_webhook(has_default_webhook),
        );
        let scheduler = ExpirationScheduler::new(
            Arc::clone(&service),
            Arc::new(dispatcher),
            Arc::new(fallback),
            analytics,
            publisher,
            Duration::from_secs(config.warning_threshold_secs),
        );
        Self { service, scheduler }
    }

    pub fn service(&self) -> &Arc<SessionService<R>> {
        &self.service
    }

    pub fn scheduler(&self) -> &ExpirationScheduler<R> {
        &self.scheduler
    }

    /// Create a session, arm every turn's timers and prompt the assignees.
    pub async fn create_session(
        &self,
        request: CreateSessionRequest,
    ) -> Result<SessionDetail, SessionError> {
        let detail = self.service.create_session(request).await?;
        self.scheduler.arm_session(&detail, true);
        Ok(detail)
    }

    pub async fn get_session(&self, id: &SessionId) -> Result<SessionDetail, SessionError> {
        self.service.get_session_detail(id).await
    }

    pub async fn list_sessions(
        &self,
        filter: &SessionFilter,
    ) -> Result<Vec<SessionSummary>, SessionError> {
        self.service.list_sessions(filter).await
    }

    /// Start the session. Turns dealt to a different participant on
    /// activation are prompted again for their new assignee.
    pub async fn activate_session(&self, id: &SessionId) -> Result<Session, SessionError> {
        let activation = self.service.activate_session(id).await?;
        for turn in &activation.reassigned {
            self.scheduler.spawn_prompt(&activation.session, turn);
        }
        Ok(activation.session)
    }

    pub async fn list_participants(
        &self,
        id: &SessionId,
    ) -> Result<Vec<Participant>, SessionError> {
        self.service.list_participants(id).await
    }

    pub async fn invite_participants(
        &self,
        id: &SessionId,
        participants: &[ParticipantInput],
    ) -> Result<Vec<Participant>, SessionError> {
        self.service.invite_participants(id, participants).await
    }

    pub async fn respond_to_invitation(
        &self,
        id: &SessionId,
        user_id: &str,
        action: InvitationAction,
    ) -> Result<Participant, SessionError> {
        self.service.respond_to_invitation(id, user_id, action).await
    }

    pub async fn archive_session(&self, id: &SessionId) -> Result<Session, SessionError> {
        self.service.archive_session(id).await
    }

    pub async fn complete_session(
        &self,
        id: &SessionId,
        request: CompleteSessionRequest,
    ) -> Result<VaultEntry, SessionError> {
        self.service.complete_session(id, request).await
    }

    pub async fn get_vault_entry(&self, id: &SessionId) -> Result<VaultEntry, SessionError> {
        self.service.get_vault_entry(id).await
    }

    pub async fn publish_vault_entry(
        &self,
        id: &SessionId,
        request: PublishVaultRequest,
    ) -> Result<VaultEntry, SessionError> {
        self.service.publish_vault_entry(id, request).await
    }

    pub async fn list_published_entries(
        &self,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<Vec<FeedEntry>, SessionError> {
        self.service.list_published_entries(limit, offset).await
    }

    pub async fn get_turn(&self, id: &TurnId) -> Result<Turn, SessionError> {
        self.service.get_turn(id).await
    }

    pub async fn submit_turn(
        &self,
        id: &TurnId,
        text: &str,
        handle: Option<String>,
    ) -> Result<Turn, SessionError> {
        self.service.submit_turn(id, text, handle).await
    }

    /// Host override: resolve the turn as a fallback fill.
    pub async fn auto_fill_turn(
        &self,
        id: &TurnId,
        text: &str,
        handle: Option<String>,
    ) -> Result<Turn, SessionError> {
        self.service.auto_fill_turn(id, text, handle).await
    }

    pub async fn log_turn_event(
        &self,
        id: &TurnId,
        event_type: &str,
        payload: serde_json::Value,
    ) -> Option<TurnEvent> {
        self.service.log_turn_event(id, event_type, payload).await
    }

    pub async fn list_turn_events(&self, id: &TurnId) -> Result<Vec<TurnEvent>, SessionError> {
        self.service.list_turn_events(id).await
    }

    /// Re-arm timers for every pending turn. Call once at startup.
    pub async fn recover(&self) -> Result<usize, SessionError> {
        self.scheduler.recover().await
    }
}

#[cfg(test)]
mod tests {
    use hourglass_types::config::{FallbackConfig, NotifyConfig};
    use hourglass_types::session::{BlankSpec, TemplateSource};
    use hourglass_types::turn::{TurnStatus, event_type};

    use super::*;
    use crate::analytics::TracingAnalytics;
    use crate::event::EventBus;
    use crate::repository::InMemorySessionRepository;

    fn engine() -> HourglassEngine<InMemorySessionRepository> {
        HourglassEngine::new(
            Arc::new(InMemorySessionRepository::new()),
            Arc::new(EventBus::new(16)),
            NotificationDispatcher::new(&NotifyConfig::default()),
            FallbackGenerator::new(&FallbackConfig::default(), None),
            Arc::new(TracingAnalytics),
            &SchedulerConfig::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn full_session_round_trip() {
        let engine = engine();
        let mut request = CreateSessionRequest::new("host-1");
        request.template_source = TemplateSource::Custom;
        request.template_text = Some("A [[ANIMAL_1::animal]] in a [[PLACE_2::place]].".into());
        request.response_window_minutes = 1;
        request.blanks = ["animal", "place"]
            .into_iter()
            .map(|slot| BlankSpec {
                slot: slot.into(),
                prompt: slot.into(),
                placeholder: None,
                nudge: None,
                response_window_minutes: None,
            })
            .collect();

        let detail = engine.create_session(request).await.unwrap();
        let id = detail.session.id;
        assert!(engine.service().timers().is_armed(&detail.turns[0].id));

        engine.activate_session(&id).await.unwrap();
        engine
            .submit_turn(&detail.turns[0].id, "badger", None)
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_secs(61)).await;
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }

        let session = engine.get_session(&id).await.unwrap();
        assert_eq!(session.turns[1].status, TurnStatus::AutoFilled);

        let entry = engine
            .complete_session(&id, CompleteSessionRequest::default())
            .await
            .unwrap();
        assert_eq!(entry.story_text, "A badger in a AI co-host: place.");
        assert!(engine.service().timers().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn activation_prompts_reassigned_turns() {
        let engine = engine();
        let mut request = CreateSessionRequest::new("host-1");
        request.template_source = TemplateSource::Custom;
        request.participants = vec![ParticipantInput {
            user_id: "kai".into(),
            handle: Some("@kai".into()),
            contact: Default::default(),
        }];
        request.blanks = ["animal", "place"]
            .into_iter()
            .map(|slot| BlankSpec {
                slot: slot.into(),
                prompt: slot.into(),
                placeholder: None,
                nudge: None,
                response_window_minutes: None,
            })
            .collect();
        let detail = engine.create_session(request).await.unwrap();
        let id = detail.session.id;
        assert_eq!(detail.turns[1].assigned_handle.as_deref(), Some("@kai"));

        engine
            .respond_to_invitation(&id, "kai", InvitationAction::Decline)
            .await
            .unwrap();
        engine.activate_session(&id).await.unwrap();
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }

        let turns = engine.get_session(&id).await.unwrap().turns;
        assert_eq!(turns[1].assigned_handle, turns[0].assigned_handle);
        let events = engine.list_turn_events(&turns[1].id).await.unwrap();
        let kinds: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(
            kinds.iter().filter(|k| **k == event_type::NOTIFICATION_SENT).count(),
            2
        );
        assert!(kinds.contains(&event_type::REASSIGNED));
    }
}
