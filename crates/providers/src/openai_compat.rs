//! OpenAI-compatible adapter.
//!
//! Works with OpenAI, Ollama, vLLM, LM Studio, Together, OpenRouter and any
//! other endpoint that follows the chat completions contract.

use std::time::Duration;

use serde_json::Value;
use sr_domain::config::LlmConfig;
use sr_domain::error::{Error, Result};
use sr_domain::tool::{FunctionCall, Message, Role, ToolCall};

use crate::traits::{ChatRequest, ChatResponse, LlmProvider, Usage};
use crate::util::{from_reqwest, truncate_body};

const PROVIDER_ID: &str = "openai_compat";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An LLM provider adapter for any OpenAI-compatible API endpoint.
pub struct OpenAiCompatProvider {
    base_url: String,
    api_key: Option<String>,
    default_model: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        default_model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            default_model: default_model.into(),
            client,
        })
    }

    /// Create a provider from the resolved `[llm]` config section.
    pub fn from_config(cfg: &LlmConfig) -> Result<Self> {
        let model = cfg
            .resolved_default_model()
            .ok_or_else(|| Error::Config("no model configured".into()))?;
        if cfg.base_url.is_empty() {
            return Err(Error::Config("llm.base_url is empty".into()));
        }
        Self::new(
            &cfg.base_url,
            cfg.api_key.clone(),
            model,
            Duration::from_secs(cfg.request_timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ── Internal: build authenticated request builder ──────────────

    fn authed_post(&self, url: &str) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .post(url)
            .header("Content-Type", "application/json");
        match self.api_key.as_deref() {
            Some(key) => builder.header("Authorization", format!("Bearer {key}")),
            None => builder,
        }
    }

    // ── Internal: build the JSON body ─────────────────────────────

    fn effective_model(&self, req: &ChatRequest) -> String {
        req.model
            .clone()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| self.default_model.clone())
    }

    pub(crate) fn build_chat_body(&self, req: &ChatRequest) -> Result<Value> {
        let mut body = serde_json::json!({
            "model": self.effective_model(req),
            "messages": serde_json::to_value(&req.messages)?,
        });

        if !req.tools.is_empty() {
            let tools: Vec<Value> = req.tools.iter().map(|t| t.to_openai()).collect();
            body["tools"] = Value::Array(tools);
            body["tool_choice"] = Value::String("auto".into());
        }
        Ok(body)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response deserialization helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn defect(message: &str) -> Error {
    Error::Provider {
        provider: PROVIDER_ID.into(),
        message: message.into(),
    }
}

pub(crate) fn parse_chat_response(body: &Value) -> Result<ChatResponse> {
    let choice = body
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|a| a.first())
        .ok_or_else(|| defect("no choices in response"))?;

    if !choice.is_object() {
        return Err(defect("choice is not an object"));
    }

    let message = choice
        .get("message")
        .filter(|m| m.is_object())
        .ok_or_else(|| defect("no message in choice"))?;

    let content = message
        .get("content")
        .and_then(|v| v.as_str())
        .map(String::from);

    let tool_calls = parse_openai_tool_calls(message);

    let finish_reason = choice
        .get("finish_reason")
        .and_then(|v| v.as_str())
        .map(String::from);

    let model = body
        .get("model")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string();

    let usage = body.get("usage").and_then(parse_openai_usage);

    Ok(ChatResponse {
        message: Message {
            role: Role::Assistant,
            content,
            tool_calls: if tool_calls.is_empty() {
                None
            } else {
                Some(tool_calls)
            },
            tool_call_id: None,
            name: None,
        },
        usage,
        model,
        finish_reason,
    })
}

fn parse_openai_tool_calls(message: &Value) -> Vec<ToolCall> {
    let arr = match message.get("tool_calls").and_then(|v| v.as_array()) {
        Some(a) => a,
        None => return Vec::new(),
    };
    arr.iter()
        .filter_map(|tc| {
            let id = tc.get("id")?.as_str()?.to_string();
            let func = tc.get("function")?;
            let name = func.get("name")?.as_str()?.to_string();
            // Some servers send the arguments as an object instead of a string.
            let arguments = match func.get("arguments") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            };
            Some(ToolCall {
                id,
                kind: "function".into(),
                function: FunctionCall { name, arguments },
            })
        })
        .collect()
}

fn parse_openai_usage(v: &Value) -> Option<Usage> {
    Some(Usage {
        prompt_tokens: v.get("prompt_tokens")?.as_u64()? as u32,
        completion_tokens: v.get("completion_tokens")?.as_u64()? as u32,
        total_tokens: v.get("total_tokens")?.as_u64()? as u32,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl LlmProvider for OpenAiCompatProvider {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_chat_body(req)?;

        tracing::debug!(
            url = %url,
            messages = req.messages.len(),
            tools = req.tools.len(),
            "openai_compat chat request"
        );

        let resp = self
            .authed_post(&url)
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        let resp_text = resp.text().await.map_err(from_reqwest)?;

        if !status.is_success() {
            return Err(Error::Provider {
                provider: PROVIDER_ID.into(),
                message: format!("HTTP {} - {}", status.as_u16(), truncate_body(&resp_text, 2048)),
            });
        }

        let resp_json: Value = serde_json::from_str(&resp_text)?;
        let parsed = parse_chat_response(&resp_json)?;

        tracing::debug!(
            model = %parsed.model,
            finish_reason = ?parsed.finish_reason,
            tool_calls = parsed.message.requested_tools().len(),
            "openai_compat chat response"
        );
        Ok(parsed)
    }

    fn provider_id(&self) -> &str {
        PROVIDER_ID
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sr_domain::tool::ToolDefinition;

    fn provider() -> OpenAiCompatProvider {
        OpenAiCompatProvider::new(
            "http://localhost:9999/v1/",
            Some("sk-test".into()),
            "default-model",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn trailing_slash_is_stripped() {
        assert_eq!(provider().base_url(), "http://localhost:9999/v1");
    }

    #[test]
    fn body_includes_tools_and_auto_choice() {
        let req = ChatRequest {
            messages: vec![Message::system("s"), Message::user("hi")],
            tools: vec![ToolDefinition {
                name: "list_skills".into(),
                description: "d".into(),
                parameters: json!({"type": "object", "properties": {}}),
            }],
            model: None,
        };
        let body = provider().build_chat_body(&req).unwrap();
        assert_eq!(body["model"], "default-model");
        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["tools"][0]["function"]["name"], "list_skills");
        assert_eq!(body["messages"][1]["role"], "user");
    }

    #[test]
    fn body_omits_tools_when_empty() {
        let req = ChatRequest {
            messages: vec![Message::user("hi")],
            tools: vec![],
            model: Some("other".into()),
        };
        let body = provider().build_chat_body(&req).unwrap();
        assert_eq!(body["model"], "other");
        assert!(body.get("tools").is_none());
        assert!(body.get("tool_choice").is_none());
    }

    #[test]
    fn parses_tool_call_response_without_content() {
        let body = json!({
            "model": "m",
            "choices": [{
                "finish_reason": "tool_calls",
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "get_skill", "arguments": "{\"skill_name\":\"calc\"}"}
                    }]
                }
            }],
            "usage": {"prompt_tokens": 3, "completion_tokens": 4, "total_tokens": 7}
        });
        let resp = parse_chat_response(&body).unwrap();
        assert!(resp.message.content.is_none());
        let calls = resp.message.requested_tools();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_1");
        assert_eq!(calls[0].function.arguments, "{\"skill_name\":\"calc\"}");
        assert_eq!(resp.usage.unwrap().total_tokens, 7);
        assert_eq!(resp.finish_reason.as_deref(), Some("tool_calls"));
    }

    #[test]
    fn object_arguments_are_reencoded() {
        let body = json!({
            "choices": [{"message": {
                "role": "assistant",
                "tool_calls": [{"id": "c", "function": {"name": "x", "arguments": {"a": 1}}}]
            }}]
        });
        let resp = parse_chat_response(&body).unwrap();
        assert_eq!(resp.message.requested_tools()[0].function.arguments, r#"{"a":1}"#);
    }

    #[test]
    fn missing_choices_is_provider_error() {
        let err = parse_chat_response(&json!({"id": "x"})).unwrap_err();
        assert!(err.to_string().contains("no choices"));
    }

    #[test]
    fn non_object_choice_is_provider_error() {
        let err = parse_chat_response(&json!({"choices": ["text"]})).unwrap_err();
        assert!(err.to_string().contains("not an object"));
    }

    #[test]
    fn missing_message_is_provider_error() {
        let err = parse_chat_response(&json!({"choices": [{"index": 0}]})).unwrap_err();
        assert!(err.to_string().contains("no message"));
    }
}
