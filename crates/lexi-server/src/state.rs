//! Shared application state.

use std::sync::Arc;

use lexi_core::LexiConfig;
use lexi_llm::CompletionBackend;
use lexi_store::SqliteStore;

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub config: LexiConfig,
    pub store: SqliteStore,
    /// Completion client, constructed once at startup.
    pub llm: Arc<dyn CompletionBackend>,
}

impl AppState {
    pub fn new(config: LexiConfig, store: SqliteStore, llm: Arc<dyn CompletionBackend>) -> Self {
        Self { config, store, llm }
    }
}
