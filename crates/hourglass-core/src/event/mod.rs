//! Realtime fan-out of session and turn state changes.
//!
//! `EventBus` is the in-process broadcast; `RealtimePublisher` is the port
//! the state machine and scheduler publish through. `PresenceTracker`
//! announces who is watching a session.

pub mod bus;
pub mod presence;
pub mod publisher;

pub use bus::EventBus;
pub use presence::PresenceTracker;
pub use publisher::{FanoutPublisher, RealtimePublisher, session_topic};
