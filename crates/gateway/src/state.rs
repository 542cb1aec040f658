use std::sync::Arc;

use sr_domain::config::Config;
use sr_domain::tool::ToolDefinition;
use sr_providers::LlmProvider;

use crate::runtime::{Conversation, ToolDispatcher};

/// Shared application state passed to all API handlers and the REPL.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub provider: Arc<dyn LlmProvider>,
    pub dispatcher: Arc<ToolDispatcher>,
    pub tools: Arc<Vec<ToolDefinition>>,
    pub preamble: Arc<str>,
}

impl AppState {
    /// Model used when a request does not name one.
    pub fn default_model(&self) -> Option<String> {
        self.config.llm.resolved_default_model().map(str::to_owned)
    }

    /// A fresh conversation seeded with the preamble.
    pub fn conversation(&self, model: Option<String>) -> Conversation {
        Conversation::new(
            self.provider.clone(),
            self.dispatcher.clone(),
            self.tools.clone(),
            self.preamble.clone(),
            model.or_else(|| self.default_model()),
            self.config.runtime.max_tool_loops,
        )
    }
}
