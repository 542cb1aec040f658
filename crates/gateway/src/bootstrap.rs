//! AppState construction and background-task spawning shared by the `serve`
//! and `chat` commands.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use sr_domain::config::{Config, ConfigSeverity};
use sr_providers::{LlmProvider, OpenAiCompatProvider};
use sr_skills::{PendingCreationStore, SandboxProvider, SkillsRegistry, VenvSandbox};

use crate::runtime::preamble::load_preamble;
use crate::runtime::{build_tool_definitions, ToolDispatcher};
use crate::state::AppState;

/// Validate config, initialize every subsystem and return a fully-wired
/// [`AppState`].
pub fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if config.has_errors() {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── Skills root ──────────────────────────────────────────────────
    let skills_root = &config.skills.path;
    std::fs::create_dir_all(skills_root)
        .with_context(|| format!("creating skills folder {}", skills_root.display()))?;
    tracing::info!(path = %skills_root.display(), "skills folder ready");

    // ── LLM provider ─────────────────────────────────────────────────
    let provider: Arc<dyn LlmProvider> = Arc::new(
        OpenAiCompatProvider::from_config(&config.llm).context("initializing LLM provider")?,
    );
    tracing::info!(
        base_url = %config.llm.base_url,
        models = config.llm.available_models().len(),
        "LLM provider ready"
    );

    // ── Sandbox, registry, pending creations ─────────────────────────
    let install_timeout = Duration::from_secs(config.skills.install_timeout_secs);
    let sandbox: Arc<dyn SandboxProvider> =
        Arc::new(VenvSandbox::new(config.skills.python.clone(), install_timeout));
    let registry = Arc::new(SkillsRegistry::new(
        skills_root.clone(),
        sandbox,
        Duration::from_secs(config.skills.script_timeout_secs),
    ));
    let creations = Arc::new(PendingCreationStore::with_ttl_secs(
        config.skills.proposal_ttl_secs,
    ));
    let dispatcher = Arc::new(ToolDispatcher::new(registry, creations, install_timeout));

    // ── Preamble + tool catalog ──────────────────────────────────────
    let preamble: Arc<str> = load_preamble(config.runtime.soul_path.as_deref()).into();
    let tools = Arc::new(build_tool_definitions());

    Ok(AppState {
        config,
        provider,
        dispatcher,
        tools,
        preamble,
    })
}

/// Spawn the long-running background tasks used by the HTTP server.
pub fn spawn_background_tasks(state: &AppState) {
    // ── Periodic sweep of expired creation proposals ─────────────────
    if state.config.skills.proposal_ttl_secs > 0 {
        let creations = state.dispatcher.creations().clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                let purged = creations.purge_expired();
                if purged > 0 {
                    tracing::debug!(purged, "expired creation proposals removed");
                }
            }
        });
    }
}
