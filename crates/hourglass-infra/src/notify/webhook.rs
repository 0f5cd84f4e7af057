//! Discord-compatible chat webhook channel.

use hourglass_core::notify::NotificationChannel;
use hourglass_types::error::NotifyError;
use hourglass_types::notify::{ChannelKind, RenderedMessage};

use super::{check_response, transport_error, wrong_message};

/// Posts the rendered [`ChatPayload`](hourglass_types::notify::ChatPayload)
/// as JSON to the recipient webhook URL.
pub struct ChatWebhookChannel {
    client: reqwest::Client,
}

impl ChatWebhookChannel {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl NotificationChannel for ChatWebhookChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::ChatWebhook
    }

    async fn deliver(&self, recipient: &str, message: &RenderedMessage) -> Result<(), NotifyError> {
        let RenderedMessage::ChatWebhook(payload) = message else {
            return Err(wrong_message(ChannelKind::ChatWebhook, message));
        };

        let response = self
            .client
            .post(recipient)
            .json(payload)
            .send()
            .await
            .map_err(transport_error)?;
        check_response(response).await
    }
}
