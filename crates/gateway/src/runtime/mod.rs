//! Core runtime: the conversation engine that alternates model calls and
//! tool dispatch, plus the bridge that streams its progress.
//!
//! Entry points: [`Conversation::send`] / [`Conversation::run`] for a
//! blocking turn, [`stream::spawn_turn`] for an incremental one.

pub mod cancel;
pub mod preamble;
pub mod stream;
pub mod tools;
pub mod turn;

pub use cancel::{CancelOnDrop, CancelToken};
pub use stream::{spawn_turn, BridgeEvent};
pub use tools::{build_tool_definitions, SkillTool, ToolDispatcher};
pub use turn::{Conversation, TurnEvent, MAX_TOOL_LOOPS};
