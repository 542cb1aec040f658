//! Conversation engine: the model/tool loop behind one user turn.
//!
//! The loop:
//! 1. Check cancellation.
//! 2. Call the model with the full history and the tool catalog.
//! 3. Append the assistant message.
//! 4. If it requested tools, run them in order, append one tool message per
//!    call, and go back to step 1.
//! 5. Otherwise its text is the reply.
//!
//! Cancellation mid-batch answers the unfinished calls with a `cancelled`
//! error so the history stays valid for the next turn.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::Instrument;

use sr_domain::error::{Error, Result};
use sr_domain::tool::{Message, Role, ToolCall, ToolDefinition};
use sr_providers::{ChatRequest, LlmProvider};

use super::cancel::CancelToken;
use super::tools::ToolDispatcher;

/// Default number of model responses in one turn that may request tools.
pub const MAX_TOOL_LOOPS: usize = 25;

/// Progress notification emitted around each tool execution.
#[derive(Debug, Clone)]
pub enum TurnEvent {
    ToolStart { tool_call: ToolCall },
    ToolEnd { tool_call: ToolCall, result: Value },
}

/// One conversation: its history plus the collaborators needed to extend it.
pub struct Conversation {
    provider: Arc<dyn LlmProvider>,
    dispatcher: Arc<ToolDispatcher>,
    tools: Arc<Vec<ToolDefinition>>,
    preamble: Arc<str>,
    model: Option<String>,
    max_tool_loops: usize,
    messages: Vec<Message>,
}

impl Conversation {
    /// A fresh conversation whose history is just the preamble.
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        dispatcher: Arc<ToolDispatcher>,
        tools: Arc<Vec<ToolDefinition>>,
        preamble: Arc<str>,
        model: Option<String>,
        max_tool_loops: usize,
    ) -> Self {
        let messages = vec![Message::system(preamble.as_ref())];
        Self {
            provider,
            dispatcher,
            tools,
            preamble,
            model,
            max_tool_loops,
            messages,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn set_model(&mut self, model: Option<String>) {
        self.model = model;
    }

    /// Drop the history and start over from the preamble.
    pub fn reset(&mut self) {
        self.messages = vec![Message::system(self.preamble.as_ref())];
    }

    /// Replace the history. The preamble is prepended when no system
    /// message is present.
    pub fn load_messages(&mut self, messages: Vec<Message>) {
        let has_system = messages.iter().any(|m| m.role == Role::System);
        self.messages = Vec::with_capacity(messages.len() + 1);
        if !has_system {
            self.messages.push(Message::system(self.preamble.as_ref()));
        }
        self.messages.extend(messages);
    }

    /// Append `user_input` and run the turn.
    pub async fn send(
        &mut self,
        user_input: &str,
        cancel: &CancelToken,
        observer: &mut (dyn FnMut(TurnEvent) + Send),
    ) -> Result<String> {
        self.messages.push(Message::user(user_input));
        self.run(cancel, observer).await
    }

    /// Run the model/tool loop over the current history until the model
    /// answers with text.
    pub async fn run(
        &mut self,
        cancel: &CancelToken,
        observer: &mut (dyn FnMut(TurnEvent) + Send),
    ) -> Result<String> {
        for _ in 0..self.max_tool_loops {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let request = ChatRequest {
                messages: self.messages.clone(),
                tools: self.tools.as_ref().clone(),
                model: self.model.clone(),
            };
            let span = tracing::info_span!(
                "llm.call",
                provider = %self.provider.provider_id(),
                model = %self.model.as_deref().unwrap_or("default"),
                messages = request.messages.len(),
            );
            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                r = self.provider.chat(&request).instrument(span) => r?,
            };

            let mut message = response.message;
            message.role = Role::Assistant;
            if message.tool_calls.as_ref().is_some_and(|c| c.is_empty()) {
                message.tool_calls = None;
            }
            let calls = message.requested_tools().to_vec();
            tracing::debug!(
                model = %response.model,
                tool_calls = calls.len(),
                finish_reason = ?response.finish_reason,
                "model responded"
            );
            let content = message.content.clone();
            self.messages.push(message);

            if calls.is_empty() {
                return content
                    .ok_or_else(|| Error::Protocol("LLM response missing content".into()));
            }

            for (i, call) in calls.iter().enumerate() {
                if cancel.is_cancelled() {
                    self.answer_cancelled(&calls[i..]);
                    return Err(Error::Cancelled);
                }
                observer(TurnEvent::ToolStart {
                    tool_call: call.clone(),
                });

                let span = tracing::info_span!(
                    "tool.call",
                    tool_name = %call.function.name,
                    tool_call_id = %call.id,
                );
                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    v = self
                        .dispatcher
                        .dispatch(&call.function.name, &call.function.arguments)
                        .instrument(span) => Some(v),
                };
                let Some(result) = result else {
                    self.answer_cancelled(&calls[i..]);
                    return Err(Error::Cancelled);
                };

                self.messages.push(Message::tool_result(
                    call.id.clone(),
                    call.function.name.clone(),
                    result.to_string(),
                ));
                observer(TurnEvent::ToolEnd {
                    tool_call: call.clone(),
                    result,
                });
            }
        }

        tracing::warn!(limit = self.max_tool_loops, "tool loop limit reached");
        Err(Error::ToolLoopLimit(self.max_tool_loops))
    }

    /// Every requested call needs a tool message, or the provider rejects
    /// the history on the next turn.
    fn answer_cancelled(&mut self, pending: &[ToolCall]) {
        let result = json!({ "error": "cancelled" }).to_string();
        for call in pending {
            self.messages.push(Message::tool_result(
                call.id.clone(),
                call.function.name.clone(),
                result.clone(),
            ));
        }
    }
}
