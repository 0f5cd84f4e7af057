//! Fallback co-host: fills an expired turn's blank.
//!
//! Asks the configured provider for one imaginative phrase. Any provider
//! error, timeout, or empty answer degrades to a deterministic heuristic fill,
//! so `generate` always returns text and never stalls the scheduler.

use std::time::Duration;

use hourglass_types::config::FallbackConfig;
use hourglass_types::llm::{CompletionRequest, GeneratedFill, LlmError, Message, MessageRole};

use super::box_provider::BoxTextProvider;

/// Model name reported for heuristic fills.
pub const HEURISTIC_MODEL: &str = "heuristic";

const SYSTEM_PROMPT: &str = "You are the AI co-host of a collaborative fill-in-the-blank story game. \
Answer the player's prompt with one short, imaginative word or phrase. \
Reply with the phrase only: no quotes, no explanation.";

pub struct FallbackGenerator {
    provider: Option<BoxTextProvider>,
    model: String,
    max_tokens: u32,
    timeout: Duration,
    marker: String,
    heuristic_max_chars: usize,
}

impl FallbackGenerator {
    /// Create a generator. With `provider = None` every fill is heuristic.
    pub fn new(config: &FallbackConfig, provider: Option<BoxTextProvider>) -> Self {
        Self {
            provider,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            timeout: Duration::from_secs(config.timeout_secs),
            marker: config.heuristic_marker.clone(),
            heuristic_max_chars: config.heuristic_max_chars,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Produce a fill for `prompt`. Never fails.
    pub async fn generate(&self, prompt: &str, model_hint: Option<&str>) -> GeneratedFill {
        let model = model_hint.unwrap_or(&self.model);
        match self.try_provider(prompt, model).await {
            Ok(fill) => fill,
            Err(e) => {
                tracing::warn!(error = %e, model, "fallback provider unavailable, using heuristic fill");
                self.heuristic_fill(prompt)
            }
        }
    }

    async fn try_provider(&self, prompt: &str, model: &str) -> Result<GeneratedFill, LlmError> {
        let provider = self.provider.as_ref().ok_or(LlmError::NotConfigured)?;

        let request = CompletionRequest {
            model: model.to_string(),
            messages: vec![Message {
                role: MessageRole::User,
                content: prompt.to_string(),
            }],
            system: Some(SYSTEM_PROMPT.to_string()),
            max_tokens: self.max_tokens,
            temperature: Some(0.9),
        };

        let response = tokio::time::timeout(self.timeout, provider.complete(&request))
            .await
            .map_err(|_| LlmError::Timeout(self.timeout.as_millis() as u64))??;

        let text = clean_completion(&response.content).ok_or_else(|| LlmError::Provider {
            message: "empty completion".to_string(),
        })?;

        tracing::debug!(provider = provider.name(), model = %response.model, "fallback fill generated");
        Ok(GeneratedFill {
            text,
            model_used: response.model,
        })
    }

    /// Deterministic offline fill: marker followed by the truncated prompt.
    pub fn heuristic_fill(&self, prompt: &str) -> GeneratedFill {
        let trimmed = prompt.trim();
        let echoed = if trimmed.is_empty() {
            "a surprise twist".to_string()
        } else {
            truncate_chars(trimmed, self.heuristic_max_chars)
        };
        GeneratedFill {
            text: format!("{}{echoed}", self.marker),
            model_used: HEURISTIC_MODEL.to_string(),
        }
    }
}

impl std::fmt::Debug for FallbackGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackGenerator")
            .field("provider", &self.provider.as_ref().map(|p| p.name().to_string()))
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// First non-empty line of a completion with wrapping quotes removed.
fn clean_completion(raw: &str) -> Option<String> {
    let line = raw.lines().map(str::trim).find(|l| !l.is_empty())?;
    let unquoted = line
        .trim_matches(|c| matches!(c, '"' | '\'' | '“' | '”' | '`'))
        .trim();
    if unquoted.is_empty() {
        None
    } else {
        Some(unquoted.to_string())
    }
}

/// Truncate to at most `max` characters, never splitting a char.
fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
