use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Conversation runtime
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Model responses that may request tools before a turn is aborted.
    #[serde(default = "d_25")]
    pub max_tool_loops: usize,
    /// Operating preamble file. When unset, `soul.md` is searched for in
    /// the working directory and its ancestors.
    #[serde(default)]
    pub soul_path: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_tool_loops: d_25(),
            soul_path: None,
        }
    }
}

fn d_25() -> usize {
    25
}
