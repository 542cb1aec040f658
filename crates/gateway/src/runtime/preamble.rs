//! Operating preamble (system prompt) resolution.

use std::path::{Path, PathBuf};

/// File name searched for in the working directory and its ancestors.
pub const SOUL_FILE: &str = "soul.md";

/// How many directories (starting with the working directory) are searched.
const SEARCH_DEPTH: usize = 5;

/// Used when no soul file can be found.
pub const FALLBACK_PREAMBLE: &str = "Before you think you cannot assist the user in doing \
something, e.g. access external websites, you MUST ALWAYS call this tool: \"list_skills\" to \
discover your available skills to help the user. Before using any skill name, call \
\"list_skills\" to discover available skills. Do not guess skill names.";

/// Resolve the preamble: the configured path, else the nearest `soul.md`
/// above the working directory, else [`FALLBACK_PREAMBLE`].
pub fn load_preamble(configured: Option<&Path>) -> String {
    let start = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    load_preamble_from(configured, &start)
}

pub fn load_preamble_from(configured: Option<&Path>, start_dir: &Path) -> String {
    if let Some(path) = configured {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                tracing::info!(path = %path.display(), "loaded preamble");
                return text.trim().to_owned();
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "configured soul file unreadable");
            }
        }
    }

    if let Some(path) = find_soul_file(start_dir) {
        match std::fs::read_to_string(&path) {
            Ok(text) => {
                tracing::info!(path = %path.display(), "loaded preamble");
                return text.trim().to_owned();
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "soul file unreadable");
            }
        }
    }

    tracing::debug!("using built-in preamble");
    FALLBACK_PREAMBLE.to_owned()
}

fn find_soul_file(start_dir: &Path) -> Option<PathBuf> {
    start_dir
        .ancestors()
        .take(SEARCH_DEPTH)
        .map(|dir| dir.join(SOUL_FILE))
        .find(|candidate| candidate.is_file())
}
