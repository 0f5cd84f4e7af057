//! Twilio SMS channel.

use secrecy::{ExposeSecret, SecretString};

use hourglass_core::notify::NotificationChannel;
use hourglass_types::error::NotifyError;
use hourglass_types::notify::{ChannelKind, RenderedMessage};

use super::{check_response, transport_error, wrong_message};

/// Sends text messages through the Twilio Messages API.
///
/// Does not derive Debug: it holds the auth token.
pub struct TwilioSmsChannel {
    client: reqwest::Client,
    account_sid: String,
    auth_token: SecretString,
    from_number: String,
    base_url: String,
}

impl TwilioSmsChannel {
    pub fn new(
        client: reqwest::Client,
        account_sid: impl Into<String>,
        auth_token: SecretString,
        from_number: impl Into<String>,
    ) -> Self {
        Self {
            client,
            account_sid: account_sid.into(),
            auth_token,
            from_number: from_number.into(),
            base_url: "https://api.twilio.com".to_string(),
        }
    }

    /// Override the API base URL (useful for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url, self.account_sid
        )
    }
}

impl NotificationChannel for TwilioSmsChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Sms
    }

    async fn deliver(&self, recipient: &str, message: &RenderedMessage) -> Result<(), NotifyError> {
        let RenderedMessage::Sms(sms) = message else {
            return Err(wrong_message(ChannelKind::Sms, message));
        };

        let form = [
            ("To", recipient),
            ("From", self.from_number.as_str()),
            ("Body", sms.body.as_str()),
        ];
        let response = self
            .client
            .post(self.url())
            .basic_auth(&self.account_sid, Some(self.auth_token.expose_secret()))
            .form(&form)
            .send()
            .await
            .map_err(transport_error)?;
        check_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_url() {
        let channel = TwilioSmsChannel::new(
            reqwest::Client::new(),
            "AC123",
            SecretString::from("token"),
            "+15550001111",
        );
        assert_eq!(
            channel.url(),
            "https://api.twilio.com/2010-04-01/Accounts/AC123/Messages.json"
        );
        assert_eq!(channel.kind(), ChannelKind::Sms);
    }
}
