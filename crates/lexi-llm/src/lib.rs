//! Lexi LLM — completion client abstraction over the remote model.
//!
//! [`CompletionBackend`] is the seam every pipeline talks to. [`GeminiClient`]
//! implements it against the Gemini REST API with model discovery and
//! rate-limit retry. With the `mock` feature, [`mock::ScriptedBackend`]
//! replays canned replies for tests.

pub mod backend;
pub mod gemini;
pub mod json;
pub mod prompts;
pub mod retry;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use backend::{CompletionBackend, DEFAULT_MAX_TOKENS};
pub use gemini::{select_models, GeminiClient, ModelInfo, ResolvedModels};
pub use json::{parse_model_json, strip_code_fences, ModelOutput};
pub use retry::RetryPolicy;
