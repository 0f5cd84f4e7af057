//! Turn deadline scheduler.
//!
//! Each armed turn gets one background task that sleeps until the warning
//! point, sends the warning, then sleeps until the deadline and expires the
//! turn. Resolving or archiving cancels the task through its token. Every
//! firing re-reads state first, so a stale timer is a no-op.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;

use hourglass_types::error::SessionError;
use hourglass_types::event::RealtimeEvent;
use hourglass_types::notify::NotificationKind;
use hourglass_types::session::{Session, SessionDetail};
use hourglass_types::turn::{Turn, TurnId, event_type};

use crate::analytics::{self, AnalyticsSink};
use crate::event::RealtimePublisher;
use crate::llm::FallbackGenerator;
use crate::notify::NotificationDispatcher;
use crate::repository::SessionRepository;
use crate::session::service::{FALLBACK_HANDLE, SessionService};

/// Delay before the warning of a turn with `remaining` time left, or `None`
/// when the deadline has already passed.
fn warning_delay(remaining: Duration, threshold: Duration) -> Option<Duration> {
    if remaining.is_zero() {
        return None;
    }
    Some(remaining.saturating_sub(threshold))
}

/// What happened when a turn's deadline fired.
#[derive(Debug, Clone)]
pub enum ExpiryOutcome {
    /// The turn was already resolved or its session closed.
    Skipped,
    /// The session has no fallback co-host; the host was told to override.
    AwaitingOverride,
    /// The fallback co-host filled the turn.
    AutoFilled(Turn),
    /// A fill was generated but a human submission won the race.
    Discarded,
    /// Storage failed while expiring.
    Failed(String),
}

pub struct ExpirationScheduler<R: SessionRepository> {
    service: Arc<SessionService<R>>,
    dispatcher: Arc<NotificationDispatcher>,
    fallback: Arc<FallbackGenerator>,
    analytics: Arc<dyn AnalyticsSink>,
    publisher: Arc<dyn RealtimePublisher>,
    warning_threshold: Duration,
}

impl<R: SessionRepository> Clone for ExpirationScheduler<R> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            dispatcher: Arc::clone(&self.dispatcher),
            fallback: Arc::clone(&self.fallback),
            analytics: Arc::clone(&self.analytics),
            publisher: Arc::clone(&self.publisher),
            warning_threshold: self.warning_threshold,
        }
    }
}

impl<R: SessionRepository + 'static> ExpirationScheduler<R> {
    pub fn new(
        service: Arc<SessionService<R>>,
        dispatcher: Arc<NotificationDispatcher>,
        fallback: Arc<FallbackGenerator>,
        analytics: Arc<dyn AnalyticsSink>,
        publisher: Arc<dyn RealtimePublisher>,
        warning_threshold: Duration,
    ) -> Self {
        Self {
            service,
            dispatcher,
            fallback,
            analytics,
            publisher,
            warning_threshold,
        }
    }

    /// Arm the warning and expiry timers of a pending turn.
    ///
    /// Re-arming a turn cancels its previous timers. A turn armed with
    /// less than the warning threshold left is warned right away; a
    /// deadline in the past expires immediately without a warning.
    pub fn arm(&self, turn: &Turn) {
        if !turn.is_pending() {
            return;
        }
        let timers = Arc::clone(self.service.timers());
        let armed = timers.register(turn.id, turn.session_id);

        let until_deadline = (turn.deadline - Utc::now()).to_std().unwrap_or_default();
        let start = tokio::time::Instant::now();
        let expire_at = start + until_deadline;
        let warn_at =
            warning_delay(until_deadline, self.warning_threshold).map(|delay| start + delay);

        let scheduler = self.clone();
        let turn_id = turn.id;
        tracing::debug!(
            turn_id = %turn_id,
            deadline = %turn.deadline,
            warn = warn_at.is_some(),
            "turn timers armed"
        );

        tokio::spawn(async move {
            if let Some(warn_at) = warn_at {
                tokio::select! {
                    _ = armed.token.cancelled() => return,
                    _ = tokio::time::sleep_until(warn_at) => {}
                }
                scheduler.warn_turn(&turn_id).await;
            }

            tokio::select! {
                _ = armed.token.cancelled() => return,
                _ = tokio::time::sleep_until(expire_at) => {}
            }
            let outcome = scheduler.expire_turn(&turn_id).await;
            tracing::debug!(turn_id = %turn_id, ?outcome, "turn deadline fired");
            timers.finish(&turn_id, armed.generation);
        });
    }

    /// Arm every pending turn of a freshly created session. With `notify`,
    /// each assignee also gets its prompt notification.
    pub fn arm_session(&self, detail: &SessionDetail, notify: bool) {
        for turn in detail.turns.iter().filter(|t| t.is_pending()) {
            self.arm(turn);
            if notify {
                self.spawn_prompt(&detail.session, turn);
            }
        }
    }

    /// Send a turn's prompt in the background.
    pub fn spawn_prompt(&self, session: &Session, turn: &Turn) {
        let scheduler = self.clone();
        let session = session.clone();
        let turn = turn.clone();
        tokio::spawn(async move {
            scheduler.prompt_turn(&session, &turn).await;
        });
    }

    /// Re-arm the timers of every pending turn after a restart. Overdue
    /// turns expire right away. Prompts are not re-sent.
    pub async fn recover(&self) -> Result<usize, SessionError> {
        let pending = self.service.pending_turns().await?;
        for turn in &pending {
            self.arm(turn);
        }
        tracing::info!(turns = pending.len(), "pending turn timers recovered");
        Ok(pending.len())
    }

    /// Send the initial "your turn" notification.
    pub async fn prompt_turn(&self, session: &Session, turn: &Turn) {
        let ctx = self.dispatcher.context(session, turn, Utc::now(), None);
        let report = self
            .dispatcher
            .dispatch(NotificationKind::Prompt, &ctx, &turn.channels, &turn.contact)
            .await;
        self.analytics.capture(
            analytics::TURN_PROMPTED,
            json!({
                "session_id": session.id,
                "turn_id": turn.id,
                "channels": turn.channels,
                "delivered": report.delivered(),
            }),
        );
        self.service
            .log_turn_event(
                &turn.id,
                event_type::NOTIFICATION_SENT,
                json!({ "kind": NotificationKind::Prompt, "report": report }),
            )
            .await;
    }

    /// Warning-point handler. Returns `false` when the turn was no longer
    /// live and nothing was sent.
    pub async fn warn_turn(&self, turn_id: &TurnId) -> bool {
        let Some((session, turn)) = self.live_turn(turn_id).await else {
            return false;
        };
        let ctx = self.dispatcher.context(&session, &turn, Utc::now(), None);
        let report = self
            .dispatcher
            .dispatch(NotificationKind::Warning, &ctx, &turn.channels, &turn.contact)
            .await;

        self.publisher.publish(RealtimeEvent::TurnWarning {
            session_id: session.id,
            turn_id: turn.id,
            remaining_ms: ctx.remaining_ms(),
        });
        self.analytics.capture(
            analytics::TURN_WARNING,
            json!({
                "session_id": session.id,
                "turn_id": turn.id,
                "remaining_ms": ctx.remaining_ms(),
            }),
        );
        self.service
            .log_turn_event(
                turn_id,
                event_type::NOTIFICATION_SENT,
                json!({ "kind": NotificationKind::Warning, "report": report }),
            )
            .await;
        true
    }

    /// Deadline handler.
    ///
    /// With the fallback co-host enabled, generates a fill and resolves the
    /// turn through the same conditional update a human submission uses; if
    /// the human wins, the fill is discarded. Without it, the host is sent a
    /// timeout notice and the turn stays pending.
    pub async fn expire_turn(&self, turn_id: &TurnId) -> ExpiryOutcome {
        let Some((session, turn)) = self.live_turn(turn_id).await else {
            return ExpiryOutcome::Skipped;
        };

        if !session.allow_fallback_cohost {
            let ctx = self.dispatcher.context(&session, &turn, Utc::now(), None);
            self.dispatcher
                .dispatch(NotificationKind::Timeout, &ctx, &turn.channels, &turn.contact)
                .await;
            self.publisher.publish(RealtimeEvent::TurnExpired {
                session_id: session.id,
                turn_id: turn.id,
            });
            self.service
                .log_turn_event(
                    turn_id,
                    event_type::SYSTEM_NOTE,
                    json!({ "note": "deadline passed, awaiting host override" }),
                )
                .await;
            tracing::info!(turn_id = %turn_id, "turn expired without fallback co-host");
            return ExpiryOutcome::AwaitingOverride;
        }

        let fill = self.fallback.generate(&turn.prompt, None).await;
        let resolved = match self
            .service
            .auto_fill_turn(turn_id, &fill.text, Some(FALLBACK_HANDLE.to_string()))
            .await
        {
            Ok(resolved) => resolved,
            Err(SessionError::Conflict(_) | SessionError::SessionClosed(_)) => {
                tracing::debug!(turn_id = %turn_id, "fallback fill discarded, turn already resolved");
                return ExpiryOutcome::Discarded;
            }
            Err(e) => {
                tracing::warn!(turn_id = %turn_id, error = %e, "failed to auto-fill expired turn");
                return ExpiryOutcome::Failed(e.to_string());
            }
        };

        self.analytics.capture(
            analytics::TIMEOUT_AUTOFILL,
            json!({
                "session_id": session.id,
                "turn_id": turn.id,
                "model": fill.model_used,
            }),
        );
        let ctx = self
            .dispatcher
            .context(&session, &resolved, Utc::now(), Some(fill.text.clone()));
        let report = self
            .dispatcher
            .dispatch(NotificationKind::Timeout, &ctx, &turn.channels, &turn.contact)
            .await;
        self.service
            .log_turn_event(
                turn_id,
                event_type::NOTIFICATION_SENT,
                json!({ "kind": NotificationKind::Timeout, "report": report }),
            )
            .await;
        ExpiryOutcome::AutoFilled(resolved)
    }

    /// The turn and its session, if the turn is pending and the session
    /// still accepts resolutions.
    async fn live_turn(&self, turn_id: &TurnId) -> Option<(Session, Turn)> {
        let turn = match self.service.get_turn(turn_id).await {
            Ok(turn) => turn,
            Err(e) => {
                tracing::debug!(turn_id = %turn_id, error = %e, "timer fired for unavailable turn");
                return None;
            }
        };
        if !turn.is_pending() {
            return None;
        }
        let session = match self.service.get_session(&turn.session_id).await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(turn_id = %turn_id, error = %e, "failed to load session for timer");
                return None;
            }
        };
        if session.status.is_terminal() {
            return None;
        }
        Some((session, turn))
    }
}
