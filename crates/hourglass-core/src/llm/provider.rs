//! TextProvider trait definition.
//!
//! The abstraction every generative-text backend implements. Uses RPITIT
//! for `complete`; see [`super::box_provider`] for dynamic dispatch.

use hourglass_types::llm::{CompletionRequest, CompletionResponse, LlmError};

/// Trait for text-generation backends (OpenAI-compatible APIs, local models).
///
/// Implementations live in hourglass-infra (e.g., `OpenAiCompatibleProvider`).
pub trait TextProvider: Send + Sync {
    /// Human-readable provider name (e.g., "openai").
    fn name(&self) -> &str;

    /// Send a completion request and receive the full response.
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<CompletionResponse, LlmError>> + Send;
}
