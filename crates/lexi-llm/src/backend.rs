//! The completion backend trait.

use async_trait::async_trait;
use lexi_core::Result;

/// Output budget used when a caller has no specific need.
pub const DEFAULT_MAX_TOKENS: u32 = 2048;

/// Text generation and embedding over a remote model.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Complete `prompt`, returning the generated text.
    ///
    /// Rate limits and timeouts are retried inside the backend; any error
    /// returned here is final.
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String>;

    /// Embed `text`. An empty vector means no embedding is available.
    async fn embed(&self, text: &str) -> Vec<f32>;

    /// Short backend name for logs.
    fn name(&self) -> &str;
}
