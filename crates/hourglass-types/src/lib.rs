//! Shared domain types for Hourglass.
//!
//! Sessions, turns, participants, vault entries, notification payloads,
//! realtime events, configuration and the error enums shared by every layer.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod error;
pub mod event;
pub mod llm;
pub mod notify;
pub mod session;
pub mod turn;
