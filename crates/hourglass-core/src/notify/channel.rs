//! NotificationChannel trait and its type-erased wrapper.
//!
//! Channels use RPITIT like the repository traits. The dispatcher holds a
//! heterogeneous set of them, so `BoxNotificationChannel` provides dynamic
//! dispatch through a blanket-implemented object-safe twin trait.

use std::future::Future;
use std::pin::Pin;

use hourglass_types::error::NotifyError;
use hourglass_types::notify::{ChannelKind, RenderedMessage};

/// An outbound delivery mechanism (chat webhook, email, SMS).
///
/// Implementations live in hourglass-infra.
pub trait NotificationChannel: Send + Sync {
    fn kind(&self) -> ChannelKind;

    /// Deliver one rendered message to `recipient` (webhook URL, email
    /// address or phone number depending on the channel).
    fn deliver(
        &self,
        recipient: &str,
        message: &RenderedMessage,
    ) -> impl Future<Output = Result<(), NotifyError>> + Send;
}

/// Object-safe version of [`NotificationChannel`] with boxed futures.
pub trait NotificationChannelDyn: Send + Sync {
    fn kind(&self) -> ChannelKind;

    fn deliver_boxed<'a>(
        &'a self,
        recipient: &'a str,
        message: &'a RenderedMessage,
    ) -> Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + 'a>>;
}

impl<T: NotificationChannel> NotificationChannelDyn for T {
    fn kind(&self) -> ChannelKind {
        NotificationChannel::kind(self)
    }

    fn deliver_boxed<'a>(
        &'a self,
        recipient: &'a str,
        message: &'a RenderedMessage,
    ) -> Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + 'a>> {
        Box::pin(self.deliver(recipient, message))
    }
}

/// Type-erased notification channel.
pub struct BoxNotificationChannel {
    inner: Box<dyn NotificationChannelDyn + Send + Sync>,
}

impl BoxNotificationChannel {
    pub fn new<T: NotificationChannel + 'static>(channel: T) -> Self {
        Self {
            inner: Box::new(channel),
        }
    }

    pub fn kind(&self) -> ChannelKind {
        self.inner.kind()
    }

    pub async fn deliver(
        &self,
        recipient: &str,
        message: &RenderedMessage,
    ) -> Result<(), NotifyError> {
        self.inner.deliver_boxed(recipient, message).await
    }
}

impl std::fmt::Debug for BoxNotificationChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxNotificationChannel")
            .field("kind", &self.inner.kind())
            .finish()
    }
}
