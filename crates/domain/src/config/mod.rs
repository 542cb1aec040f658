mod llm;
mod runtime;
mod server;
mod skills;

pub use llm::*;
pub use runtime::*;
pub use server::*;
pub use skills::*;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub skills: SkillsConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Environment overrides
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub const ENV_BASE_URL: &str = "LLM_API_BASE_URL";
pub const ENV_MODEL_NAME: &str = "LLM_MODEL_NAME";
pub const ENV_MODEL_NAMES: &str = "LLM_MODEL_NAMES";
pub const ENV_SKILLS_PATH: &str = "SKILLS_FOLDER_PATH";
pub const ENV_SCRIPT_TIMEOUT: &str = "SCRIPT_TIMEOUT_SECONDS";

impl Config {
    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup. Blank values count as unset.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };

        if let Some(key) = get(&self.llm.api_key_env) {
            self.llm.api_key = Some(key);
        }
        if let Some(url) = get(ENV_BASE_URL) {
            self.llm.base_url = url;
        }
        if let Some(list) = get(ENV_MODEL_NAMES) {
            let models: Vec<String> = list
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_owned)
                .collect();
            if !models.is_empty() {
                self.llm.models = models;
            }
        }
        if let Some(model) = get(ENV_MODEL_NAME) {
            self.llm.default_model = Some(model);
        }
        if let Some(path) = get(ENV_SKILLS_PATH) {
            self.skills.path = PathBuf::from(path);
        }
        if let Some(raw) = get(ENV_SCRIPT_TIMEOUT) {
            match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => self.skills.script_timeout_secs = secs,
                _ => {
                    return Err(Error::Config(format!(
                        "{ENV_SCRIPT_TIMEOUT} must be a positive integer, got {raw:?}"
                    )))
                }
            }
        }

        self.llm.base_url = self.llm.base_url.trim_end_matches('/').to_owned();
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl ConfigError {
    fn error(field: &str, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Error,
            field: field.into(),
            message: message.into(),
        }
    }

    fn warning(field: &str, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Warning,
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError::error("server.port", "port must be greater than 0"));
        }
        if self.server.host.is_empty() {
            errors.push(ConfigError::error("server.host", "host must not be empty"));
        }
        if self.server.max_concurrent_requests == 0 {
            errors.push(ConfigError::error(
                "server.max_concurrent_requests",
                "must be greater than 0",
            ));
        }

        if self.llm.base_url.is_empty() {
            errors.push(ConfigError::error(
                "llm.base_url",
                format!("base URL is required (set {ENV_BASE_URL})"),
            ));
        }
        if self.llm.resolved_default_model().is_none() {
            errors.push(ConfigError::error(
                "llm.models",
                format!("at least one model is required (set {ENV_MODEL_NAME} or {ENV_MODEL_NAMES})"),
            ));
        }
        if self.llm.api_key.is_none() {
            errors.push(ConfigError::warning(
                "llm.api_key",
                format!("{} is not set; requests are sent without credentials", self.llm.api_key_env),
            ));
        }
        if self.llm.request_timeout_secs == 0 {
            errors.push(ConfigError::error("llm.request_timeout_secs", "must be greater than 0"));
        }

        if self.skills.path.as_os_str().is_empty() {
            errors.push(ConfigError::error("skills.path", "skills folder path must not be empty"));
        }
        if self.skills.script_timeout_secs == 0 {
            errors.push(ConfigError::error("skills.script_timeout_secs", "must be greater than 0"));
        }
        if self.skills.install_timeout_secs == 0 {
            errors.push(ConfigError::error("skills.install_timeout_secs", "must be greater than 0"));
        }
        if self.skills.python.trim().is_empty() {
            errors.push(ConfigError::error("skills.python", "base interpreter must not be empty"));
        }
        if self.skills.proposal_ttl_secs == 0 {
            errors.push(ConfigError::warning(
                "skills.proposal_ttl_secs",
                "0 disables expiry; unconfirmed proposals are kept until restart",
            ));
        }

        if self.runtime.max_tool_loops == 0 {
            errors.push(ConfigError::error("runtime.max_tool_loops", "must be greater than 0"));
        }

        if self.server.cors.allowed_origins.iter().any(|o| o == "*") {
            errors.push(ConfigError::warning(
                "server.cors.allowed_origins",
                "wildcard \"*\" allows all origins (not recommended for production)",
            ));
        }

        errors
    }

    /// True when `validate()` reports at least one error-level issue.
    pub fn has_errors(&self) -> bool {
        self.validate()
            .iter()
            .any(|e| e.severity == ConfigSeverity::Error)
    }
}
