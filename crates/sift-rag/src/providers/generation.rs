//! Generation backend trait

use async_trait::async_trait;

use crate::error::Result;

/// Options forwarded to a generation call
#[derive(Debug, Clone)]
pub struct GenerationOptions {
    /// Sampling temperature
    pub temperature: f32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self { temperature: 0.3 }
    }
}

/// Trait for answer generation
///
/// Implementations:
/// - `OllamaGenerator`: local Ollama server (phi3, llama3, etc.)
///
/// Backend construction may be expensive; callers hold a single handle via
/// `GenerationCache` rather than building one per query.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate text for a prompt
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String>;

    /// Backend name for logging
    fn name(&self) -> &str;
}
