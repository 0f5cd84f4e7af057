//! Hosted realtime pub/sub publishers.

pub mod rest;

pub use rest::RestRealtimePublisher;
