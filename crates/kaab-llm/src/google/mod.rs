//! Google Gemini provider.

pub mod provider;
pub mod types;

pub use provider::GeminiProvider;
pub use types::GeminiConfig;
