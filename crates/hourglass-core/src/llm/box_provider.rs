//! BoxTextProvider -- object-safe dynamic dispatch wrapper for TextProvider.
//!
//! 1. Define an object-safe `TextProviderDyn` trait with boxed futures
//! 2. Blanket-impl `TextProviderDyn` for all `T: TextProvider`
//! 3. `BoxTextProvider` wraps `Box<dyn TextProviderDyn>` and delegates

use std::future::Future;
use std::pin::Pin;

use hourglass_types::llm::{CompletionRequest, CompletionResponse, LlmError};

use super::provider::TextProvider;

/// Object-safe version of [`TextProvider`] with boxed futures.
pub trait TextProviderDyn: Send + Sync {
    fn name(&self) -> &str;

    fn complete_boxed<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + 'a>>;
}

impl<T: TextProvider> TextProviderDyn for T {
    fn name(&self) -> &str {
        TextProvider::name(self)
    }

    fn complete_boxed<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + 'a>> {
        Box::pin(self.complete(request))
    }
}

/// Type-erased text provider for runtime backend selection.
pub struct BoxTextProvider {
    inner: Box<dyn TextProviderDyn + Send + Sync>,
}

impl BoxTextProvider {
    pub fn new<T: TextProvider + 'static>(provider: T) -> Self {
        Self {
            inner: Box::new(provider),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, LlmError> {
        self.inner.complete_boxed(request).await
    }
}

impl std::fmt::Debug for BoxTextProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxTextProvider")
            .field("name", &self.inner.name())
            .finish()
    }
}
