//! Infrastructure layer for Hourglass.
//!
//! Implements the ports defined in `hourglass-core`: SQLite session storage,
//! the OpenAI-compatible text provider, HTTP notification channels (chat
//! webhook, SendGrid, Twilio) and the REST realtime publisher. Also loads
//! `config.toml`.

pub mod config;
pub mod llm;
pub mod notify;
pub mod realtime;
pub mod sqlite;
