//! Fire-and-forget product analytics.
//!
//! The engine reports turn lifecycle milestones through `AnalyticsSink`.
//! Capture must never fail or block the caller.

use serde_json::Value;

pub const TURN_PROMPTED: &str = "turn_prompted";
pub const TURN_WARNING: &str = "turn_warning";
pub const TIMEOUT_AUTOFILL: &str = "timeout_autofill";

pub trait AnalyticsSink: Send + Sync {
    fn capture(&self, event: &str, properties: Value);
}

/// Default sink: emits each capture as a structured tracing event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAnalytics;

impl AnalyticsSink for TracingAnalytics {
    fn capture(&self, event: &str, properties: Value) {
        tracing::info!(target: "hourglass::analytics", event, %properties, "analytics");
    }
}
