//! Per-turn deadline timers.

pub mod expiry;
pub mod timers;

pub use expiry::{ExpirationScheduler, ExpiryOutcome};
pub use timers::TimerRegistry;
