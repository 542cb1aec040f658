pub mod chat;
pub mod config;

use anyhow::Context;
use clap::{Parser, Subcommand};

use sr_domain::config::Config;

/// skills-runner: a chat assistant that discovers and runs local skills.
#[derive(Debug, Parser)]
#[command(name = "skills-runner", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the HTTP API (default when no subcommand is given).
    Serve,
    /// Chat with the assistant. With a prompt, run one turn and exit;
    /// without, start an interactive session.
    Chat {
        /// Message to send.
        prompt: Option<String>,
        /// Model override (defaults to the configured default model).
        #[arg(long)]
        model: Option<String>,
    },
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load `.env`, then the configuration from the path in `SR_CONFIG` (or
/// `config.toml` by default), then apply environment overrides. Returns the
/// resolved [`Config`] and the path that was used.
pub fn load_config() -> anyhow::Result<(Config, String)> {
    // A missing .env is fine.
    let _ = dotenvy::dotenv();

    let config_path = std::env::var("SR_CONFIG").unwrap_or_else(|_| "config.toml".into());

    let mut config: Config = if std::path::Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path)
            .with_context(|| format!("reading {config_path}"))?;
        toml::from_str(&raw).with_context(|| format!("parsing {config_path}"))?
    } else {
        Config::default()
    };

    config
        .apply_env()
        .with_context(|| format!("applying environment overrides to {config_path}"))?;

    Ok((config, config_path))
}
