//! OpenAI-compatible `/v1/chat/completions` endpoint.
//!
//! The request's message history replaces the conversation history, the
//! engine runs one turn, and the reply comes back either as a single
//! `chat.completion` object or as an SSE stream. The stream carries the
//! standard role/content/stop chunks plus `{"type":"tool"}` and
//! `{"type":"error"}` frames for tool progress and failures.

use std::convert::Infallible;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json};
use futures_util::stream::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use sr_domain::tool::{Message, Role, ToolCall};

use crate::runtime::cancel::CancelOnDrop;
use crate::runtime::{spawn_turn, BridgeEvent, CancelToken, TurnEvent};
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct OpenAIChatRequest {
    #[serde(default)]
    pub model: Option<String>,
    /// Kept loose: entries that are not objects are skipped, and content
    /// may be a string or a list of text parts.
    pub messages: Vec<Value>,
    #[serde(default)]
    pub stream: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Serialize)]
struct OpenAIChatResponse {
    id: String,
    object: &'static str,
    created: i64,
    model: String,
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Serialize)]
struct OpenAIChoice {
    index: u32,
    message: OpenAIResponseMessage,
    finish_reason: &'static str,
}

#[derive(Debug, Serialize)]
struct OpenAIResponseMessage {
    role: &'static str,
    content: String,
}

// ── Streaming chunk types ────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct OpenAIChunk {
    id: String,
    object: &'static str,
    created: i64,
    model: String,
    choices: Vec<OpenAIChunkChoice>,
}

#[derive(Debug, Serialize)]
struct OpenAIChunkChoice {
    index: u32,
    delta: OpenAIChunkDelta,
    finish_reason: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct OpenAIChunkDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

/// Out-of-band frame reporting tool progress.
#[derive(Debug, Serialize)]
struct ToolFrame<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    phase: &'static str,
    tool_call: &'a ToolCall,
    result: Option<&'a Value>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/chat/completions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn chat_completions(
    State(state): State<AppState>,
    Json(body): Json<OpenAIChatRequest>,
) -> impl IntoResponse {
    if body.stream {
        chat_completions_stream(state, body).into_response()
    } else {
        chat_completions_blocking(state, body).await.into_response()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Non-streaming
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

async fn chat_completions_blocking(state: AppState, body: OpenAIChatRequest) -> impl IntoResponse {
    let model = resolve_model(&state, body.model);
    let mut conversation = state.conversation(model.clone());
    conversation.load_messages(messages_from_request(&body.messages));

    let cancel = CancelToken::new();
    let mut ignore = |_: TurnEvent| {};
    let content = match conversation.run(&cancel, &mut ignore).await {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!(error = %e, "chat completion failed");
            return openai_error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "server_error",
                &e.to_string(),
            )
            .into_response();
        }
    };

    let response = OpenAIChatResponse {
        id: completion_id(),
        object: "chat.completion",
        created: chrono::Utc::now().timestamp(),
        model: model.unwrap_or_default(),
        choices: vec![OpenAIChoice {
            index: 0,
            message: OpenAIResponseMessage {
                role: "assistant",
                content,
            },
            finish_reason: "stop",
        }],
    };

    Json(response).into_response()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Streaming
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn chat_completions_stream(state: AppState, body: OpenAIChatRequest) -> impl IntoResponse {
    let model = resolve_model(&state, body.model);
    let mut conversation = state.conversation(model.clone());
    conversation.load_messages(messages_from_request(&body.messages));

    let cancel = CancelToken::new();
    let guard = cancel.drop_guard();
    let (_handle, rx) = spawn_turn(conversation, cancel);

    let stream = make_openai_sse_stream(
        rx,
        guard,
        completion_id(),
        chrono::Utc::now().timestamp(),
        model.unwrap_or_default(),
    );

    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn make_openai_sse_stream(
    mut rx: mpsc::UnboundedReceiver<BridgeEvent>,
    guard: CancelOnDrop,
    completion_id: String,
    created: i64,
    model: String,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let chunk = move |delta: OpenAIChunkDelta, finish_reason: Option<&'static str>| OpenAIChunk {
        id: completion_id.clone(),
        object: "chat.completion.chunk",
        created,
        model: model.clone(),
        choices: vec![OpenAIChunkChoice {
            index: 0,
            delta,
            finish_reason,
        }],
    };

    async_stream::stream! {
        // Dropping the stream (client went away) cancels the turn.
        let _guard = guard;

        let initial = chunk(OpenAIChunkDelta { role: Some("assistant"), content: None }, None);
        if let Ok(data) = serde_json::to_string(&initial) {
            yield Ok(Event::default().data(data));
        }

        while let Some(event) = rx.recv().await {
            match event {
                BridgeEvent::ToolStart { tool_call } => {
                    let frame = ToolFrame {
                        kind: "tool",
                        phase: "start",
                        tool_call: &tool_call,
                        result: None,
                    };
                    if let Ok(data) = serde_json::to_string(&frame) {
                        yield Ok(Event::default().data(data));
                    }
                }
                BridgeEvent::ToolEnd { tool_call, result } => {
                    let frame = ToolFrame {
                        kind: "tool",
                        phase: "end",
                        tool_call: &tool_call,
                        result: Some(&result),
                    };
                    if let Ok(data) = serde_json::to_string(&frame) {
                        yield Ok(Event::default().data(data));
                    }
                }
                BridgeEvent::FinalText { chunks } => {
                    for text in chunks {
                        let c = chunk(OpenAIChunkDelta { role: None, content: Some(text) }, None);
                        if let Ok(data) = serde_json::to_string(&c) {
                            yield Ok(Event::default().data(data));
                        }
                    }
                }
                BridgeEvent::Error { message } => {
                    let frame = serde_json::json!({ "type": "error", "message": message });
                    yield Ok(Event::default().data(frame.to_string()));
                }
                BridgeEvent::Done => {
                    let stop = chunk(OpenAIChunkDelta { role: None, content: None }, Some("stop"));
                    if let Ok(data) = serde_json::to_string(&stop) {
                        yield Ok(Event::default().data(data));
                    }
                    break;
                }
            }
        }

        yield Ok(Event::default().data("[DONE]"));
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn resolve_model(state: &AppState, requested: Option<String>) -> Option<String> {
    requested
        .filter(|m| !m.trim().is_empty())
        .or_else(|| state.default_model())
}

fn completion_id() -> String {
    format!("chatcmpl-{}", uuid::Uuid::new_v4().simple())
}

/// Convert request messages into history entries. Non-object entries are
/// skipped; unrecognised roles are treated as `user`.
pub fn messages_from_request(messages: &[Value]) -> Vec<Message> {
    messages.iter().filter_map(message_from_value).collect()
}

fn message_from_value(value: &Value) -> Option<Message> {
    let obj = value.as_object()?;
    let role = match obj.get("role").and_then(Value::as_str).unwrap_or("user") {
        "system" => Role::System,
        "assistant" => Role::Assistant,
        "tool" => Role::Tool,
        _ => Role::User,
    };
    let content = match obj.get("content") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Array(parts)) => Some(
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join(""),
        ),
        Some(other) => Some(other.to_string()),
    };
    let tool_calls = obj
        .get("tool_calls")
        .filter(|v| !v.is_null())
        .and_then(|v| serde_json::from_value::<Vec<ToolCall>>(v.clone()).ok());
    let text_field = |key: &str| obj.get(key).and_then(Value::as_str).map(str::to_owned);

    Some(Message {
        role,
        content,
        tool_calls,
        tool_call_id: text_field("tool_call_id"),
        name: text_field("name"),
    })
}

/// Build an OpenAI-style error response.
pub fn openai_error_response(
    status: StatusCode,
    error_type: &str,
    message: &str,
) -> (StatusCode, Json<Value>) {
    (
        status,
        Json(serde_json::json!({
            "error": {
                "message": message,
                "type": error_type,
            }
        })),
    )
}
