//! HTTP notification channels.
//!
//! Concrete [`NotificationChannel`](hourglass_core::notify::NotificationChannel)
//! implementations: a Discord-compatible chat webhook, SendGrid email and
//! Twilio SMS. Each one takes a shared `reqwest::Client`; the dispatcher in
//! hourglass-core bounds every delivery with its own timeout.

pub mod email;
pub mod sms;
pub mod webhook;

pub use email::SendGridEmailChannel;
pub use sms::TwilioSmsChannel;
pub use webhook::ChatWebhookChannel;

use secrecy::SecretString;

use hourglass_core::notify::{BoxNotificationChannel, NotificationDispatcher};
use hourglass_types::config::NotifyConfig;
use hourglass_types::error::NotifyError;
use hourglass_types::notify::{ChannelKind, RenderedMessage};

use crate::config::secret_from_env;

/// Credentials for the outbound channels, resolved from the environment
/// variables named in [`NotifyConfig`].
#[derive(Default)]
pub struct ChannelSecrets {
    pub sendgrid_api_key: Option<SecretString>,
    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<SecretString>,
}

impl ChannelSecrets {
    pub fn from_env(config: &NotifyConfig) -> Self {
        Self {
            sendgrid_api_key: secret_from_env(&config.sendgrid_api_key_env),
            twilio_account_sid: std::env::var(&config.twilio_account_sid_env)
                .ok()
                .filter(|v| !v.trim().is_empty()),
            twilio_auth_token: secret_from_env(&config.twilio_auth_token_env),
        }
    }
}

/// Build a dispatcher with every channel whose credentials are available.
///
/// The chat webhook needs no credentials and is always registered. Email
/// needs a SendGrid key; SMS needs a Twilio SID, token and sender number.
pub fn build_dispatcher(
    config: &NotifyConfig,
    client: reqwest::Client,
    secrets: ChannelSecrets,
) -> NotificationDispatcher {
    let mut dispatcher = NotificationDispatcher::new(config)
        .with_channel(BoxNotificationChannel::new(ChatWebhookChannel::new(client.clone())));

    match secrets.sendgrid_api_key {
        Some(key) => {
            dispatcher = dispatcher.with_channel(BoxNotificationChannel::new(
                SendGridEmailChannel::new(client.clone(), key, &config.email_from),
            ));
        }
        None => tracing::info!(env = %config.sendgrid_api_key_env, "email channel disabled"),
    }

    match (
        secrets.twilio_account_sid,
        secrets.twilio_auth_token,
        config.twilio_from_number.as_deref(),
    ) {
        (Some(sid), Some(token), Some(from)) => {
            dispatcher = dispatcher.with_channel(BoxNotificationChannel::new(
                TwilioSmsChannel::new(client, sid, token, from),
            ));
        }
        _ => tracing::info!("sms channel disabled"),
    }

    tracing::debug!(channels = ?dispatcher.registered(), "notification channels registered");
    dispatcher
}

/// Map a non-2xx response to `NotifyError::Rejected`.
async fn check_response(response: reqwest::Response) -> Result<(), NotifyError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(NotifyError::Rejected {
        status: status.as_u16(),
        body,
    })
}

fn transport_error(e: reqwest::Error) -> NotifyError {
    NotifyError::Transport(e.to_string())
}

fn wrong_message(expected: ChannelKind, message: &RenderedMessage) -> NotifyError {
    NotifyError::Transport(format!(
        "{expected} channel cannot deliver a {} message",
        message.channel()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatcher_without_secrets_has_only_chat() {
        let dispatcher = build_dispatcher(
            &NotifyConfig::default(),
            reqwest::Client::new(),
            ChannelSecrets::default(),
        );
        assert_eq!(dispatcher.registered(), vec![ChannelKind::ChatWebhook]);
    }

    #[test]
    fn test_dispatcher_registers_all_channels() {
        let config = NotifyConfig {
            twilio_from_number: Some("+15550001111".to_string()),
            ..NotifyConfig::default()
        };
        let secrets = ChannelSecrets {
            sendgrid_api_key: Some(SecretString::from("SG.test")),
            twilio_account_sid: Some("AC123".to_string()),
            twilio_auth_token: Some(SecretString::from("token")),
        };
        let dispatcher = build_dispatcher(&config, reqwest::Client::new(), secrets);
        assert_eq!(
            dispatcher.registered(),
            vec![ChannelKind::ChatWebhook, ChannelKind::Email, ChannelKind::Sms]
        );
    }

    #[test]
    fn test_sms_requires_sender_number() {
        let secrets = ChannelSecrets {
            sendgrid_api_key: None,
            twilio_account_sid: Some("AC123".to_string()),
            twilio_auth_token: Some(SecretString::from("token")),
        };
        let dispatcher = build_dispatcher(&NotifyConfig::default(), reqwest::Client::new(), secrets);
        assert!(!dispatcher.registered().contains(&ChannelKind::Sms));
    }

    #[test]
    fn test_wrong_message_names_both_kinds() {
        let message = RenderedMessage::Sms(hourglass_types::notify::SmsMessage {
            body: "hi".to_string(),
        });
        let err = wrong_message(ChannelKind::Email, &message);
        assert!(err.to_string().contains("email channel cannot deliver a sms message"));
    }
}
