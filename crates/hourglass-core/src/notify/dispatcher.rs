//! Fan-out of a rendered turn notification across the configured channels.
//!
//! Channels are delivered concurrently, each bounded by its own timeout.
//! A failure on one channel is logged and recorded in the report; it never
//! affects the other channels or the caller.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::Serialize;

use hourglass_types::config::NotifyConfig;
use hourglass_types::notify::{ChannelKind, DeliveryOutcome, NotificationKind};
use hourglass_types::session::{ContactPoints, Session};
use hourglass_types::turn::Turn;

use super::channel::BoxNotificationChannel;
use super::render::{TurnContext, render, turn_url};

/// Result of one channel within a dispatch.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelReport {
    pub channel: ChannelKind,
    pub outcome: DeliveryOutcome,
}

/// Result of one dispatch across all requested channels.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    pub kind: NotificationKind,
    pub channels: Vec<ChannelReport>,
}

impl DispatchReport {
    pub fn delivered(&self) -> usize {
        self.channels
            .iter()
            .filter(|c| c.outcome == DeliveryOutcome::Delivered)
            .count()
    }

    pub fn outcome(&self, channel: ChannelKind) -> Option<&DeliveryOutcome> {
        self.channels
            .iter()
            .find(|c| c.channel == channel)
            .map(|c| &c.outcome)
    }
}

/// Channels reachable through `contact`. The chat webhook also counts when
/// a default webhook is configured.
pub fn channels_for(contact: &ContactPoints, has_default_webhook: bool) -> Vec<ChannelKind> {
    let mut channels = Vec::new();
    if contact.chat_webhook.is_some() || has_default_webhook {
        channels.push(ChannelKind::ChatWebhook);
    }
    if contact.email.is_some() {
        channels.push(ChannelKind::Email);
    }
    if contact.phone.is_some() {
        channels.push(ChannelKind::Sms);
    }
    channels
}

pub struct NotificationDispatcher {
    channels: HashMap<ChannelKind, BoxNotificationChannel>,
    brand: String,
    app_base_url: Option<String>,
    default_chat_webhook: Option<String>,
    timeout: Duration,
}

impl NotificationDispatcher {
    pub fn new(config: &NotifyConfig) -> Self {
        Self {
            channels: HashMap::new(),
            brand: config.brand.clone(),
            app_base_url: config.app_base_url.clone(),
            default_chat_webhook: config.default_chat_webhook.clone(),
            timeout: Duration::from_secs(config.channel_timeout_secs),
        }
    }

    /// Register a channel implementation, replacing any previous one of the
    /// same kind.
    pub fn with_channel(mut self, channel: BoxNotificationChannel) -> Self {
        self.channels.insert(channel.kind(), channel);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Channel kinds with a registered implementation.
    pub fn registered(&self) -> Vec<ChannelKind> {
        let mut kinds: Vec<ChannelKind> = self.channels.keys().copied().collect();
        kinds.sort_by_key(|k| k.to_string());
        kinds
    }

    pub fn has_default_webhook(&self) -> bool {
        self.default_chat_webhook.is_some()
    }

    /// Channels a participant with `contact` can be reached on.
    pub fn channels_for(&self, contact: &ContactPoints) -> Vec<ChannelKind> {
        channels_for(contact, self.default_chat_webhook.is_some())
    }

    /// Build the template context for `turn` as seen at `now`.
    pub fn context(
        &self,
        session: &Session,
        turn: &Turn,
        now: DateTime<Utc>,
        fill_text: Option<String>,
    ) -> TurnContext {
        TurnContext {
            session_id: session.id,
            turn_id: turn.id,
            brand: self.brand.clone(),
            story_title: session.title.clone(),
            prompt: turn.prompt.clone(),
            recipient_handle: turn.assigned_handle.clone(),
            deadline: turn.deadline,
            now,
            turn_url: turn_url(self.app_base_url.as_deref(), &turn.id),
            fill_text,
        }
    }

    fn recipient(&self, channel: ChannelKind, contact: &ContactPoints) -> Option<String> {
        match channel {
            ChannelKind::ChatWebhook => contact
                .chat_webhook
                .clone()
                .or_else(|| self.default_chat_webhook.clone()),
            ChannelKind::Email => contact.email.clone(),
            ChannelKind::Sms => contact.phone.clone(),
        }
    }

    /// Render and deliver `kind` on every channel in `channels`.
    ///
    /// Never fails: each channel's outcome is recorded in the report.
    pub async fn dispatch(
        &self,
        kind: NotificationKind,
        ctx: &TurnContext,
        channels: &[ChannelKind],
        contact: &ContactPoints,
    ) -> DispatchReport {
        let mut requested: Vec<ChannelKind> = Vec::with_capacity(channels.len());
        for channel in channels {
            if !requested.contains(channel) {
                requested.push(*channel);
            }
        }

        let deliveries = requested.into_iter().map(|channel| async move {
            let outcome = self.deliver_one(kind, channel, ctx, contact).await;
            ChannelReport { channel, outcome }
        });
        let channels = join_all(deliveries).await;

        let report = DispatchReport { kind, channels };
        tracing::debug!(
            session_id = %ctx.session_id,
            turn_id = %ctx.turn_id,
            kind = %kind,
            delivered = report.delivered(),
            requested = report.channels.len(),
            "notification dispatched"
        );
        report
    }

    async fn deliver_one(
        &self,
        kind: NotificationKind,
        channel: ChannelKind,
        ctx: &TurnContext,
        contact: &ContactPoints,
    ) -> DeliveryOutcome {
        let Some(sender) = self.channels.get(&channel) else {
            return DeliveryOutcome::Skipped("channel not configured".to_string());
        };
        let Some(recipient) = self.recipient(channel, contact) else {
            return DeliveryOutcome::Skipped("no recipient".to_string());
        };

        let message = render(kind, channel, ctx);
        match tokio::time::timeout(self.timeout, sender.deliver(&recipient, &message)).await {
            Ok(Ok(())) => DeliveryOutcome::Delivered,
            Ok(Err(e)) => {
                tracing::warn!(
                    turn_id = %ctx.turn_id,
                    channel = %channel,
                    kind = %kind,
                    error = %e,
                    "notification delivery failed"
                );
                DeliveryOutcome::Failed(e.to_string())
            }
            Err(_) => {
                tracing::warn!(
                    turn_id = %ctx.turn_id,
                    channel = %channel,
                    kind = %kind,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "notification delivery timed out"
                );
                DeliveryOutcome::Failed(format!(
                    "timed out after {}ms",
                    self.timeout.as_millis()
                ))
            }
        }
    }
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("channels", &self.channels.keys().collect::<Vec<_>>())
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use hourglass_types::error::NotifyError;
    use hourglass_types::notify::RenderedMessage;
    use hourglass_types::session::SessionId;
    use hourglass_types::turn::TurnId;

    use super::*;
    use crate::notify::channel::NotificationChannel;

    /// Records deliveries, optionally failing or hanging.
    struct MockChannel {
        kind: ChannelKind,
        mode: Mode,
        calls: Arc<AtomicUsize>,
    }

    #[derive(Clone, Copy)]
    enum Mode {
        Ok,
        Fail,
        Hang,
    }

    impl NotificationChannel for MockChannel {
        fn kind(&self) -> ChannelKind {
            self.kind
        }

        async fn deliver(
            &self,
            _recipient: &str,
            message: &RenderedMessage,
        ) -> Result<(), NotifyError> {
            assert_eq!(message.channel(), self.kind);
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.mode {
                Mode::Ok => Ok(()),
                Mode::Fail => Err(NotifyError::Rejected {
                    status: 500,
                    body: "boom".into(),
                }),
                Mode::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(())
                }
            }
        }
    }

    fn mock(kind: ChannelKind, mode: Mode) -> (BoxNotificationChannel, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let channel = BoxNotificationChannel::new(MockChannel {
            kind,
            mode,
            calls: calls.clone(),
        });
        (channel, calls)
    }

    fn ctx() -> TurnContext {
        let now = Utc::now();
        TurnContext {
            session_id: SessionId::new(),
            turn_id: TurnId::new(),
            brand: "Hourglass".into(),
            story_title: "Test".into(),
            prompt: "Adjective".into(),
            recipient_handle: None,
            deadline: now + chrono::Duration::minutes(1),
            now,
            turn_url: None,
            fill_text: None,
        }
    }

    fn full_contact() -> ContactPoints {
        ContactPoints {
            email: Some("a@example.com".into()),
            phone: Some("+15550100".into()),
            chat_webhook: Some("https://chat.example/hook".into()),
        }
    }

    const ALL: [ChannelKind; 3] = [ChannelKind::ChatWebhook, ChannelKind::Email, ChannelKind::Sms];

    #[tokio::test]
    async fn failing_chat_webhook_does_not_block_email_and_sms() {
        let (chat, chat_calls) = mock(ChannelKind::ChatWebhook, Mode::Fail);
        let (email, email_calls) = mock(ChannelKind::Email, Mode::Ok);
        let (sms, sms_calls) = mock(ChannelKind::Sms, Mode::Ok);
        let dispatcher = NotificationDispatcher::new(&NotifyConfig::default())
            .with_channel(chat)
            .with_channel(email)
            .with_channel(sms);

        let report = dispatcher
            .dispatch(NotificationKind::Prompt, &ctx(), &ALL, &full_contact())
            .await;

        assert_eq!(chat_calls.load(Ordering::SeqCst), 1);
        assert_eq!(email_calls.load(Ordering::SeqCst), 1);
        assert_eq!(sms_calls.load(Ordering::SeqCst), 1);
        assert_eq!(report.delivered(), 2);
        assert!(matches!(
            report.outcome(ChannelKind::ChatWebhook),
            Some(DeliveryOutcome::Failed(_))
        ));
        assert_eq!(
            report.outcome(ChannelKind::Email),
            Some(&DeliveryOutcome::Delivered)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_channel_is_bounded_by_timeout() {
        let (chat, _) = mock(ChannelKind::ChatWebhook, Mode::Hang);
        let (sms, _) = mock(ChannelKind::Sms, Mode::Ok);
        let dispatcher = NotificationDispatcher::new(&NotifyConfig::default())
            .with_channel(chat)
            .with_channel(sms)
            .with_timeout(Duration::from_millis(200));

        let report = dispatcher
            .dispatch(NotificationKind::Warning, &ctx(), &ALL, &full_contact())
            .await;

        assert!(matches!(
            report.outcome(ChannelKind::ChatWebhook),
            Some(DeliveryOutcome::Failed(msg)) if msg.contains("timed out")
        ));
        assert_eq!(report.outcome(ChannelKind::Sms), Some(&DeliveryOutcome::Delivered));
    }

    #[tokio::test]
    async fn missing_configuration_is_a_skip() {
        let (email, email_calls) = mock(ChannelKind::Email, Mode::Ok);
        let dispatcher = NotificationDispatcher::new(&NotifyConfig::default()).with_channel(email);
        let contact = ContactPoints {
            email: None,
            phone: Some("+15550100".into()),
            chat_webhook: None,
        };

        let report = dispatcher
            .dispatch(NotificationKind::Timeout, &ctx(), &ALL, &contact)
            .await;

        assert_eq!(email_calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            report.outcome(ChannelKind::Email),
            Some(&DeliveryOutcome::Skipped("no recipient".into()))
        );
        assert_eq!(
            report.outcome(ChannelKind::Sms),
            Some(&DeliveryOutcome::Skipped("channel not configured".into()))
        );
        assert_eq!(report.delivered(), 0);
    }

    #[tokio::test]
    async fn duplicate_channels_are_delivered_once() {
        let (sms, sms_calls) = mock(ChannelKind::Sms, Mode::Ok);
        let dispatcher = NotificationDispatcher::new(&NotifyConfig::default()).with_channel(sms);

        let report = dispatcher
            .dispatch(
                NotificationKind::Prompt,
                &ctx(),
                &[ChannelKind::Sms, ChannelKind::Sms],
                &full_contact(),
            )
            .await;

        assert_eq!(sms_calls.load(Ordering::SeqCst), 1);
        assert_eq!(report.channels.len(), 1);
    }

    #[test]
    fn channels_for_uses_default_webhook() {
        let config = NotifyConfig {
            default_chat_webhook: Some("https://chat.example/default".into()),
            ..NotifyConfig::default()
        };
        let dispatcher = NotificationDispatcher::new(&config);
        let contact = ContactPoints {
            email: Some("a@example.com".into()),
            ..ContactPoints::default()
        };
        assert_eq!(
            dispatcher.channels_for(&contact),
            vec![ChannelKind::ChatWebhook, ChannelKind::Email]
        );

        let bare = NotificationDispatcher::new(&NotifyConfig::default());
        assert!(bare.channels_for(&ContactPoints::default()).is_empty());
    }
}
