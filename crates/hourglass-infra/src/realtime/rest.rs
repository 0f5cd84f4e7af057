//! REST pub/sub publisher (Ably-compatible).
//!
//! Each event is posted as `{name, data}` to
//! `{endpoint}/channels/{topic}/messages`, where the topic is the session's
//! [`session_topic`]. Publishing hands the request to a background task and
//! returns immediately; failures are logged and dropped.
//!
//! The publisher has an explicit lifecycle: nothing is sent before `open` or
//! after `close`. It owns its channel cache; there is no process-wide client.
//! A session's cache entry is dropped with its last event (completion or
//! archival).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use hourglass_core::event::{RealtimePublisher, session_topic};
use hourglass_types::event::RealtimeEvent;
use hourglass_types::session::SessionId;

/// Does not derive Debug: it holds the API key.
pub struct RestRealtimePublisher {
    inner: Arc<Inner>,
}

struct Inner {
    client: reqwest::Client,
    endpoint: String,
    api_key: SecretString,
    open: AtomicBool,
    /// Session -> message URL of its topic.
    channels: DashMap<SessionId, String>,
}

#[derive(Debug, Serialize)]
struct PublishBody<'a> {
    name: &'static str,
    data: &'a RealtimeEvent,
}

impl RestRealtimePublisher {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>, api_key: SecretString) -> Self {
        Self {
            inner: Arc::new(Inner {
                client,
                endpoint: endpoint.into().trim_end_matches('/').to_string(),
                api_key,
                open: AtomicBool::new(false),
                channels: DashMap::new(),
            }),
        }
    }

    pub fn open(&self) {
        self.inner.open.store(true, Ordering::SeqCst);
        tracing::info!(endpoint = %self.inner.endpoint, "realtime publisher opened");
    }

    /// Stop publishing and drop the channel cache.
    pub fn close(&self) {
        self.inner.open.store(false, Ordering::SeqCst);
        self.inner.channels.clear();
        tracing::info!("realtime publisher closed");
    }

    pub fn is_open(&self) -> bool {
        self.inner.open.load(Ordering::SeqCst)
    }

    /// Number of session topics currently cached.
    pub fn cached_channels(&self) -> usize {
        self.inner.channels.len()
    }
}

impl Inner {
    fn channel_url(&self, session_id: SessionId) -> String {
        self.channels
            .entry(session_id)
            .or_insert_with(|| {
                format!(
                    "{}/channels/{}/messages",
                    self.endpoint,
                    session_topic(&session_id)
                )
            })
            .clone()
    }

    /// `key_name:key_secret` keys authenticate with basic auth.
    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let key = self.api_key.expose_secret();
        match key.split_once(':') {
            Some((name, secret)) => request.basic_auth(name, Some(secret)),
            None => request.bearer_auth(key),
        }
    }

    async fn post(&self, url: String, event: RealtimeEvent) {
        let body = PublishBody {
            name: event.name(),
            data: &event,
        };
        let result = self
            .authorize(self.client.post(&url))
            .json(&body)
            .send()
            .await;
        match result {
            Ok(response) if response.status().is_success() => {
                tracing::trace!(event = event.name(), "realtime event published");
            }
            Ok(response) => {
                tracing::warn!(
                    event = event.name(),
                    status = %response.status(),
                    "realtime publish rejected"
                );
            }
            Err(e) => {
                tracing::warn!(event = event.name(), error = %e, "realtime publish failed");
            }
        }
    }
}

impl RealtimePublisher for RestRealtimePublisher {
    fn publish(&self, event: RealtimeEvent) {
        if !self.is_open() {
            tracing::debug!(event = event.name(), "realtime publisher closed, dropping event");
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(event = event.name(), "no runtime, dropping realtime event");
            return;
        };
        let session_id = event.session_id();
        let url = self.inner.channel_url(session_id);
        if event.closes_session() {
            self.inner.channels.remove(&session_id);
        }
        let inner = Arc::clone(&self.inner);
        handle.spawn(async move {
            inner.post(url, event).await;
        });
    }
}
