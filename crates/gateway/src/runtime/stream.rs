//! Bridge between a running turn and an incremental consumer.
//!
//! The turn runs on its own task and reports progress over an unbounded
//! channel. `Done` is always the last event sent.

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use sr_domain::tool::ToolCall;

use super::cancel::CancelToken;
use super::turn::{Conversation, TurnEvent};

/// Characters per content chunk in the final text.
pub const CHUNK_CHARS: usize = 24;

#[derive(Debug, Clone)]
pub enum BridgeEvent {
    ToolStart { tool_call: ToolCall },
    ToolEnd { tool_call: ToolCall, result: Value },
    FinalText { chunks: Vec<String> },
    Error { message: String },
    Done,
}

impl From<TurnEvent> for BridgeEvent {
    fn from(event: TurnEvent) -> Self {
        match event {
            TurnEvent::ToolStart { tool_call } => Self::ToolStart { tool_call },
            TurnEvent::ToolEnd { tool_call, result } => Self::ToolEnd { tool_call, result },
        }
    }
}

/// Run `conversation` on a background task.
///
/// The consumer should hold `cancel.drop_guard()` while it reads, so that
/// abandoning the receiver stops the turn. The join handle yields the
/// conversation back with its updated history.
pub fn spawn_turn(
    mut conversation: Conversation,
    cancel: CancelToken,
) -> (JoinHandle<Conversation>, mpsc::UnboundedReceiver<BridgeEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();

    let handle = tokio::spawn(async move {
        let events = tx.clone();
        let mut observer = move |event: TurnEvent| {
            // A closed channel means the consumer is gone; the cancel
            // token handles stopping the loop.
            let _ = events.send(event.into());
        };

        let outcome = conversation.run(&cancel, &mut observer).await;
        let last = match outcome {
            Ok(text) => BridgeEvent::FinalText {
                chunks: chunk_text(&text, CHUNK_CHARS),
            },
            Err(e) => {
                tracing::warn!(error = %e, "streamed turn failed");
                BridgeEvent::Error {
                    message: e.to_string(),
                }
            }
        };
        let _ = tx.send(last);
        let _ = tx.send(BridgeEvent::Done);
        conversation
    });

    (handle, rx)
}

/// Split `text` into pieces of at most `size` characters.
pub fn chunk_text(text: &str, size: usize) -> Vec<String> {
    let size = size.max(1);
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(size)
        .map(|chunk| chunk.iter().collect())
        .collect()
}
