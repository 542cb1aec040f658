use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Remote model
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Connection settings for the OpenAI-compatible upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL up to (not including) `/chat/completions`.
    #[serde(default)]
    pub base_url: String,
    /// Environment variable holding the bearer credential.
    #[serde(default = "d_api_key_env")]
    pub api_key_env: String,
    /// Resolved credential. Populated from `api_key_env` at load time and
    /// never written back out by `config show`.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Model used when a request does not name one.
    #[serde(default)]
    pub default_model: Option<String>,
    /// Models advertised by `/v1/models`.
    #[serde(default)]
    pub models: Vec<String>,
    #[serde(default = "d_120")]
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key_env: d_api_key_env(),
            api_key: None,
            default_model: None,
            models: Vec::new(),
            request_timeout_secs: d_120(),
        }
    }
}

impl LlmConfig {
    /// The model to use when none is requested: `default_model`, else the
    /// first advertised model.
    pub fn resolved_default_model(&self) -> Option<&str> {
        self.default_model
            .as_deref()
            .filter(|m| !m.is_empty())
            .or_else(|| self.models.first().map(String::as_str))
    }

    /// Advertised models, with the default model included when it is not
    /// already in the list.
    pub fn available_models(&self) -> Vec<String> {
        let mut out = self.models.clone();
        if let Some(default) = self.resolved_default_model() {
            if !out.iter().any(|m| m == default) {
                out.insert(0, default.to_owned());
            }
        }
        out
    }
}

fn d_api_key_env() -> String {
    "LLM_API_KEY".into()
}
fn d_120() -> u64 {
    120
}
