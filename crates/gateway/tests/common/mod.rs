#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tempfile::TempDir;

use sr_domain::config::Config;
use sr_domain::error::{Error, Result};
use sr_domain::tool::{Message, ToolCall};
use sr_gateway::runtime::{build_tool_definitions, Conversation, ToolDispatcher};
use sr_gateway::state::AppState;
use sr_providers::{ChatRequest, ChatResponse, LlmProvider};
use sr_skills::{PendingCreationStore, SandboxProvider, ScriptExecutionResult, SkillsRegistry};

pub const PREAMBLE: &str = "You are a test assistant.";

// ── Scripted model ────────────────────────────────────────────────────

/// Replies with queued messages in order and records every request.
#[derive(Default)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Message>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    pub fn new(replies: impl IntoIterator<Item = Message>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait::async_trait]
impl LlmProvider for ScriptedProvider {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        self.requests.lock().push(req.clone());
        let message = self
            .replies
            .lock()
            .pop_front()
            .ok_or_else(|| Error::Other("script exhausted".into()))?;
        Ok(ChatResponse {
            message,
            usage: None,
            model: req.model.clone().unwrap_or_else(|| "scripted".into()),
            finish_reason: None,
        })
    }

    fn provider_id(&self) -> &str {
        "scripted"
    }
}

/// Never answers.
pub struct HangingProvider;

#[async_trait::async_trait]
impl LlmProvider for HangingProvider {
    async fn chat(&self, _req: &ChatRequest) -> Result<ChatResponse> {
        std::future::pending().await
    }

    fn provider_id(&self) -> &str {
        "hanging"
    }
}

pub fn tool_call(id: &str, name: &str, args: &str) -> ToolCall {
    ToolCall::new(id, name, args)
}

// ── Sandbox ───────────────────────────────────────────────────────────

/// Provisions by creating `venv/bin/python` as an empty file; never runs
/// anything.
pub struct FakeSandbox;

#[async_trait::async_trait]
impl SandboxProvider for FakeSandbox {
    fn find_interpreter(&self, skill_dir: &Path) -> Option<PathBuf> {
        let python = skill_dir.join("venv/bin/python");
        python.exists().then_some(python)
    }

    async fn execute(
        &self,
        _interpreter: &Path,
        script: &str,
        _cwd: &Path,
        _timeout: Duration,
    ) -> ScriptExecutionResult {
        ScriptExecutionResult {
            stdout: format!("ran: {script}"),
            ..Default::default()
        }
    }

    async fn provision(&self, skill_dir: &Path) -> std::result::Result<(), String> {
        let bin = skill_dir.join("venv/bin");
        std::fs::create_dir_all(&bin).map_err(|e| e.to_string())?;
        std::fs::write(bin.join("python"), "").map_err(|e| e.to_string())
    }

    async fn install_requirements(
        &self,
        _skill_dir: &Path,
        _manifest: &Path,
        _timeout: Duration,
    ) -> std::result::Result<(), String> {
        Ok(())
    }
}

// ── Fixtures ──────────────────────────────────────────────────────────

/// A skills folder holding one skill, `calc`, with a provisioned runtime.
pub fn skills_fixture() -> TempDir {
    let dir = TempDir::new().unwrap();
    let calc = dir.path().join("calc");
    std::fs::create_dir_all(calc.join("venv/bin")).unwrap();
    std::fs::write(calc.join("venv/bin/python"), "").unwrap();
    std::fs::write(calc.join("SKILL.MD"), "# Calc\nAdds numbers.").unwrap();
    dir
}

pub fn dispatcher(root: &Path) -> Arc<ToolDispatcher> {
    let registry = Arc::new(SkillsRegistry::new(
        root,
        Arc::new(FakeSandbox),
        Duration::from_secs(5),
    ));
    Arc::new(ToolDispatcher::new(
        registry,
        Arc::new(PendingCreationStore::with_ttl_secs(3600)),
        Duration::from_secs(5),
    ))
}

pub fn conversation(
    provider: Arc<dyn LlmProvider>,
    root: &Path,
    max_tool_loops: usize,
) -> Conversation {
    Conversation::new(
        provider,
        dispatcher(root),
        Arc::new(build_tool_definitions()),
        PREAMBLE.into(),
        Some("test-model".into()),
        max_tool_loops,
    )
}

pub fn app_state(provider: Arc<dyn LlmProvider>, root: &Path) -> AppState {
    let mut config = Config::default();
    config.llm.base_url = "http://127.0.0.1:9".into();
    config.llm.models = vec!["test-model".into(), "other-model".into()];
    config.skills.path = root.to_path_buf();

    AppState {
        config: Arc::new(config),
        provider,
        dispatcher: dispatcher(root),
        tools: Arc::new(build_tool_definitions()),
        preamble: PREAMBLE.into(),
    }
}
