//! Business logic and port definitions for Hourglass.
//!
//! This crate holds the session/turn state machine, the deadline scheduler,
//! notification rendering and fan-out, and the fallback co-host. It defines
//! the "ports" (repository, channel, provider and publisher traits) that the
//! infrastructure layer implements, and depends only on `hourglass-types`,
//! never on `hourglass-infra` or any database or HTTP crate.

pub mod analytics;
pub mod engine;
pub mod event;
pub mod llm;
pub mod notify;
pub mod repository;
pub mod schedule;
pub mod session;

pub use engine::HourglassEngine;
