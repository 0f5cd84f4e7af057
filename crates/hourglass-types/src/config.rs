//! Global configuration types for Hourglass.
//!
//! `HourglassConfig` represents the top-level `config.toml`. Every field has
//! a default, so an empty (or missing) file yields a working configuration.
//! Credentials are never stored here; the config names the environment
//! variables they are read from.

use serde::{Deserialize, Serialize};

/// Top-level configuration.
///
/// Loaded from `~/.hourglass/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HourglassConfig {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub fallback: FallbackConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub realtime: RealtimeConfig,
}

/// Deadline timers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// How long before the deadline the warning fires.
    #[serde(default = "default_warning_threshold_secs")]
    pub warning_threshold_secs: u64,
    /// Response window applied when a request does not set one.
    #[serde(default = "default_response_window_minutes")]
    pub default_response_window_minutes: i64,
}

fn default_warning_threshold_secs() -> u64 {
    60
}

fn default_response_window_minutes() -> i64 {
    crate::session::default_response_window_minutes()
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            warning_threshold_secs: default_warning_threshold_secs(),
            default_response_window_minutes: default_response_window_minutes(),
        }
    }
}

/// Generative fallback ("AI co-host").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    /// Base URL of an OpenAI-compatible chat completions API.
    #[serde(default = "default_fallback_base_url")]
    pub base_url: String,
    #[serde(default = "default_fallback_model")]
    pub model: String,
    #[serde(default = "default_fallback_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_fallback_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_fallback_max_tokens")]
    pub max_tokens: u32,
    /// Prefix of the offline heuristic fill.
    #[serde(default = "default_heuristic_marker")]
    pub heuristic_marker: String,
    /// Max characters of the prompt echoed into the heuristic fill.
    #[serde(default = "default_heuristic_max_chars")]
    pub heuristic_max_chars: usize,
}

fn default_fallback_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_fallback_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_fallback_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_fallback_timeout_secs() -> u64 {
    10
}

fn default_fallback_max_tokens() -> u32 {
    40
}

fn default_heuristic_marker() -> String {
    "AI co-host: ".to_string()
}

fn default_heuristic_max_chars() -> usize {
    120
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            base_url: default_fallback_base_url(),
            model: default_fallback_model(),
            api_key_env: default_fallback_api_key_env(),
            timeout_secs: default_fallback_timeout_secs(),
            max_tokens: default_fallback_max_tokens(),
            heuristic_marker: default_heuristic_marker(),
            heuristic_max_chars: default_heuristic_max_chars(),
        }
    }
}

/// Outbound notification channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Product name shown in email subjects and SMS text.
    #[serde(default = "default_brand")]
    pub brand: String,
    /// Base URL for turn deep links (`{base}/turn/{id}`).
    #[serde(default)]
    pub app_base_url: Option<String>,
    /// Chat webhook used for turns whose participant has none.
    #[serde(default)]
    pub default_chat_webhook: Option<String>,
    #[serde(default = "default_email_from")]
    pub email_from: String,
    #[serde(default = "default_sendgrid_api_key_env")]
    pub sendgrid_api_key_env: String,
    #[serde(default = "default_twilio_account_sid_env")]
    pub twilio_account_sid_env: String,
    #[serde(default = "default_twilio_auth_token_env")]
    pub twilio_auth_token_env: String,
    #[serde(default)]
    pub twilio_from_number: Option<String>,
    /// Upper bound on a single channel delivery.
    #[serde(default = "default_channel_timeout_secs")]
    pub channel_timeout_secs: u64,
}

fn default_brand() -> String {
    "Hourglass".to_string()
}

fn default_email_from() -> String {
    "hourglass@localhost".to_string()
}

fn default_sendgrid_api_key_env() -> String {
    "SENDGRID_API_KEY".to_string()
}

fn default_twilio_account_sid_env() -> String {
    "TWILIO_ACCOUNT_SID".to_string()
}

fn default_twilio_auth_token_env() -> String {
    "TWILIO_AUTH_TOKEN".to_string()
}

fn default_channel_timeout_secs() -> u64 {
    5
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            brand: default_brand(),
            app_base_url: None,
            default_chat_webhook: None,
            email_from: default_email_from(),
            sendgrid_api_key_env: default_sendgrid_api_key_env(),
            twilio_account_sid_env: default_twilio_account_sid_env(),
            twilio_auth_token_env: default_twilio_auth_token_env(),
            twilio_from_number: None,
            channel_timeout_secs: default_channel_timeout_secs(),
        }
    }
}

/// Realtime fan-out to live viewers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Capacity of the in-process broadcast bus.
    #[serde(default = "default_bus_capacity")]
    pub bus_capacity: usize,
    /// REST pub/sub endpoint. When unset only the in-process bus is used.
    #[serde(default)]
    pub rest_endpoint: Option<String>,
    #[serde(default = "default_realtime_api_key_env")]
    pub api_key_env: String,
}

fn default_bus_capacity() -> usize {
    256
}

fn default_realtime_api_key_env() -> String {
    "ABLY_API_KEY".to_string()
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            bus_capacity: default_bus_capacity(),
            rest_endpoint: None,
            api_key_env: default_realtime_api_key_env(),
        }
    }
}
