//! SendGrid email channel.

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use hourglass_core::notify::NotificationChannel;
use hourglass_types::error::NotifyError;
use hourglass_types::notify::{ChannelKind, EmailMessage, RenderedMessage};

use super::{check_response, transport_error, wrong_message};

const SENDGRID_URL: &str = "https://api.sendgrid.com/v3/mail/send";

/// Sends HTML email through the SendGrid v3 mail API.
///
/// Does not derive Debug: it holds the API key.
pub struct SendGridEmailChannel {
    client: reqwest::Client,
    api_key: SecretString,
    from: String,
    url: String,
}

impl SendGridEmailChannel {
    pub fn new(client: reqwest::Client, api_key: SecretString, from: impl Into<String>) -> Self {
        Self {
            client,
            api_key,
            from: from.into(),
            url: SENDGRID_URL.to_string(),
        }
    }

    /// Override the API URL (useful for testing or proxies).
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

#[derive(Debug, Serialize)]
struct MailSend<'a> {
    personalizations: [Personalization<'a>; 1],
    from: Address<'a>,
    subject: &'a str,
    content: [Content<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Personalization<'a> {
    to: [Address<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Address<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    value: &'a str,
}

fn mail_body<'a>(from: &'a str, to: &'a str, email: &'a EmailMessage) -> MailSend<'a> {
    MailSend {
        personalizations: [Personalization {
            to: [Address { email: to }],
        }],
        from: Address { email: from },
        subject: &email.subject,
        content: [Content {
            kind: "text/html",
            value: &email.html,
        }],
    }
}

impl NotificationChannel for SendGridEmailChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
    }

    async fn deliver(&self, recipient: &str, message: &RenderedMessage) -> Result<(), NotifyError> {
        let RenderedMessage::Email(email) = message else {
            return Err(wrong_message(ChannelKind::Email, message));
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&mail_body(&self.from, recipient, email))
            .send()
            .await
            .map_err(transport_error)?;
        check_response(response).await
    }
}
