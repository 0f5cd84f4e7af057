//! Generative-text provider abstraction and the fallback co-host built on it.

pub mod box_provider;
pub mod fallback;
pub mod provider;

pub use box_provider::BoxTextProvider;
pub use fallback::FallbackGenerator;
pub use provider::TextProvider;
