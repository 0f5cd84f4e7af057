//! Notification channel kinds and the rendered payload shapes each channel
//! delivers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Outbound channel a turn notification can travel on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    ChatWebhook,
    Email,
    Sms,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelKind::ChatWebhook => write!(f, "chat_webhook"),
            ChannelKind::Email => write!(f, "email"),
            ChannelKind::Sms => write!(f, "sms"),
        }
    }
}

impl FromStr for ChannelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "chat_webhook" => Ok(ChannelKind::ChatWebhook),
            "email" => Ok(ChannelKind::Email),
            "sms" => Ok(ChannelKind::Sms),
            other => Err(format!("invalid channel kind: '{other}'")),
        }
    }
}

/// What happened to the turn that a notification describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Prompt,
    Warning,
    Timeout,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationKind::Prompt => write!(f, "prompt"),
            NotificationKind::Warning => write!(f, "warning"),
            NotificationKind::Timeout => write!(f, "timeout"),
        }
    }
}

/// Chat webhook body (Discord-compatible).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatPayload {
    pub content: String,
    pub embeds: Vec<ChatEmbed>,
    pub allowed_mentions: AllowedMentions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEmbed {
    pub title: String,
    pub description: String,
    pub color: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedFooter {
    pub text: String,
}

/// Mention parsing rules. Always empty so handles never ping anyone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllowedMentions {
    pub parse: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub subject: String,
    pub html: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmsMessage {
    pub body: String,
}

/// A notification rendered for one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "channel", rename_all = "snake_case")]
pub enum RenderedMessage {
    ChatWebhook(ChatPayload),
    Email(EmailMessage),
    Sms(SmsMessage),
}

impl RenderedMessage {
    pub fn channel(&self) -> ChannelKind {
        match self {
            RenderedMessage::ChatWebhook(_) => ChannelKind::ChatWebhook,
            RenderedMessage::Email(_) => ChannelKind::Email,
            RenderedMessage::Sms(_) => ChannelKind::Sms,
        }
    }
}

/// Per-channel result of one dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Delivered,
    Skipped(String),
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_payload_serializes_discord_shape() {
        let payload = ChatPayload {
            content: "hi".into(),
            embeds: vec![ChatEmbed {
                title: "t".into(),
                description: "d".into(),
                color: 0x5eead4,
                footer: None,
            }],
            allowed_mentions: AllowedMentions::default(),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["allowed_mentions"]["parse"], serde_json::json!([]));
        assert_eq!(json["embeds"][0]["color"], 0x5eead4);
        assert!(json["embeds"][0].get("footer").is_none());
    }

    #[test]
    fn test_channel_kind_roundtrip() {
        for kind in [ChannelKind::ChatWebhook, ChannelKind::Email, ChannelKind::Sms] {
            assert_eq!(kind.to_string().parse::<ChannelKind>().unwrap(), kind);
        }
    }
}
