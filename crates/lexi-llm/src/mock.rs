//! Scripted completion backend for deterministic tests.
//!
//! Replies are served in order; every prompt is recorded so tests can assert
//! on what the pipelines asked.
//!
//! ```rust,ignore
//! let backend = ScriptedBackend::new()
//!     .with_reply(r#"{"matches": []}"#)
//!     .with_embedding(vec![0.1, 0.2]);
//! ```

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::backend::CompletionBackend;
use lexi_core::{Error, Result};

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Upstream(String),
}

/// A backend that replays queued replies.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<Reply>>,
    default_reply: Option<String>,
    embedding: Vec<f32>,
    prompts: Mutex<Vec<String>>,
    embed_inputs: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    /// No replies and an empty embedding.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a completion reply.
    pub fn with_reply(self, reply: impl Into<String>) -> Self {
        self.replies.lock().push_back(Reply::Text(reply.into()));
        self
    }

    /// Queue an upstream failure.
    pub fn with_upstream_error(self, message: impl Into<String>) -> Self {
        self.replies.lock().push_back(Reply::Upstream(message.into()));
        self
    }

    /// Reply used once the queue is empty.
    pub fn with_default_reply(mut self, reply: impl Into<String>) -> Self {
        self.default_reply = Some(reply.into());
        self
    }

    /// Embedding returned for every `embed` call.
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = embedding;
        self
    }

    /// Queue a reply on a shared backend.
    pub fn push_reply(&self, reply: impl Into<String>) {
        self.replies.lock().push_back(Reply::Text(reply.into()));
    }

    /// Prompts received so far, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().len()
    }

    /// Texts passed to `embed`, in order.
    pub fn embed_inputs(&self) -> Vec<String> {
        self.embed_inputs.lock().clone()
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn complete(&self, prompt: &str, _max_tokens: u32) -> Result<String> {
        self.prompts.lock().push(prompt.to_string());
        let next = self.replies.lock().pop_front();
        match next {
            Some(Reply::Text(text)) => Ok(text),
            Some(Reply::Upstream(message)) => Err(Error::Upstream(message)),
            None => self
                .default_reply
                .clone()
                .ok_or_else(|| Error::Upstream("No scripted reply left".into())),
        }
    }

    async fn embed(&self, text: &str) -> Vec<f32> {
        self.embed_inputs.lock().push(text.to_string());
        self.embedding.clone()
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
