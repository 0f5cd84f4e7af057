//! Realtime publisher port.
//!
//! Publishing is best-effort: implementations log their own failures and
//! never report them to the caller. The state machine publishes after every
//! committed change and moves on.

use std::sync::Arc;

use hourglass_types::event::RealtimeEvent;
use hourglass_types::session::SessionId;

use super::bus::EventBus;

/// Pub/sub topic carrying every event of one session.
pub fn session_topic(session_id: &SessionId) -> String {
    format!("hourglass:session:{session_id}")
}

/// Sink for realtime session events.
///
/// `publish` must not block; network-backed implementations hand the event
/// to a background task.
pub trait RealtimePublisher: Send + Sync {
    fn publish(&self, event: RealtimeEvent);
}

impl RealtimePublisher for EventBus {
    fn publish(&self, event: RealtimeEvent) {
        EventBus::publish(self, event);
    }
}

/// Publishes every event to several publishers (e.g. the in-process bus and
/// a hosted pub/sub service).
#[derive(Clone, Default)]
pub struct FanoutPublisher {
    targets: Vec<Arc<dyn RealtimePublisher>>,
}

impl FanoutPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, target: Arc<dyn RealtimePublisher>) -> Self {
        self.targets.push(target);
        self
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl RealtimePublisher for FanoutPublisher {
    fn publish(&self, event: RealtimeEvent) {
        for target in &self.targets {
            target.publish(event.clone());
        }
    }
}

impl std::fmt::Debug for FanoutPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanoutPublisher")
            .field("targets", &self.targets.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hourglass_types::turn::TurnId;

    #[test]
    fn topic_is_derived_from_session_id() {
        let id: SessionId = "0192f0a4-8f3c-7a10-9b5e-1c2d3e4f5a6b".parse().unwrap();
        assert_eq!(
            session_topic(&id),
            "hourglass:session:0192f0a4-8f3c-7a10-9b5e-1c2d3e4f5a6b"
        );
    }

    #[tokio::test]
    async fn fanout_reaches_every_target() {
        let a = EventBus::new(8);
        let b = EventBus::new(8);
        let mut rx_a = a.subscribe();
        let mut rx_b = b.subscribe();
        let fanout = FanoutPublisher::new()
            .with(Arc::new(a.clone()))
            .with(Arc::new(b.clone()));
        assert_eq!(fanout.len(), 2);

        let session_id = SessionId::new();
        fanout.publish(RealtimeEvent::TurnExpired {
            session_id,
            turn_id: TurnId::new(),
        });

        assert_eq!(rx_a.recv().await.unwrap().session_id(), session_id);
        assert_eq!(rx_b.recv().await.unwrap().session_id(), session_id);
    }
}
