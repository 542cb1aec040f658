//! `skills-runner chat`: one-shot prompt or interactive REPL.
//!
//! Tool activity is echoed to stderr so stdout carries only the assistant's
//! replies. The REPL is also where pending skill creations get confirmed.

use std::sync::Arc;

use sr_domain::config::Config;

use crate::bootstrap;
use crate::runtime::{CancelToken, Conversation, TurnEvent};
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Public entry point
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn chat(
    config: Arc<Config>,
    prompt: Option<String>,
    model: Option<String>,
) -> anyhow::Result<()> {
    let state = bootstrap::build_app_state(config)?;
    let mut conversation = state.conversation(model);

    if let Some(prompt) = prompt {
        let reply = run_turn(&mut conversation, &prompt).await?;
        println!("{reply}");
        return Ok(());
    }

    repl(&state, conversation).await
}

async fn repl(state: &AppState, mut conversation: Conversation) -> anyhow::Result<()> {
    let history_path = dirs::home_dir()
        .unwrap_or_default()
        .join(".skills-runner")
        .join("chat_history.txt");
    if let Some(parent) = history_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let mut rl = rustyline::DefaultEditor::new()?;
    let _ = rl.load_history(&history_path);

    eprintln!("Skills Runner v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("Type 'exit' to quit, /help for commands");
    eprintln!();

    loop {
        match rl.readline("you> ") {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                rl.add_history_entry(&line).ok();

                match ReplCommand::parse(trimmed) {
                    ReplCommand::Exit => break,
                    ReplCommand::Message(text) => match run_turn(&mut conversation, text).await {
                        Ok(reply) => println!("{reply}"),
                        Err(e) => eprintln!("\x1B[31merror: {e}\x1B[0m"),
                    },
                    command => handle_command(state, &mut conversation, command).await,
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                eprintln!("(Use Ctrl+D or exit to quit)");
                continue;
            }
            Err(rustyline::error::ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("\x1B[31mreadline error: {e}\x1B[0m");
                break;
            }
        }
    }

    rl.save_history(&history_path).ok();
    eprintln!("Goodbye!");
    Ok(())
}

/// Send one message. Ctrl+C while the turn runs cancels it.
async fn run_turn(conversation: &mut Conversation, text: &str) -> anyhow::Result<String> {
    let cancel = CancelToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let mut echo = |event: TurnEvent| match event {
        TurnEvent::ToolStart { tool_call } => {
            eprintln!(
                "[Tool Call] {}({})",
                tool_call.function.name, tool_call.function.arguments
            );
        }
        TurnEvent::ToolEnd { result, .. } => {
            eprintln!("[Tool Result] {result}");
        }
    };
    let result = conversation.send(text, &cancel, &mut echo).await;
    watcher.abort();
    Ok(result?)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Command handling
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, PartialEq, Eq)]
enum ReplCommand<'a> {
    Exit,
    Confirm(Option<&'a str>),
    Model(Option<&'a str>),
    Reset,
    Help,
    Unknown(&'a str),
    Message(&'a str),
}

impl<'a> ReplCommand<'a> {
    fn parse(input: &'a str) -> Self {
        if input.eq_ignore_ascii_case("exit") {
            return Self::Exit;
        }
        if !input.starts_with('/') {
            return Self::Message(input);
        }

        let mut parts = input.splitn(2, ' ');
        let cmd = parts.next().unwrap_or_default();
        let arg = parts.next().map(str::trim).filter(|s| !s.is_empty());

        match cmd {
            "/exit" | "/quit" => Self::Exit,
            "/confirm" => Self::Confirm(arg),
            "/model" => Self::Model(arg),
            "/reset" => Self::Reset,
            "/help" => Self::Help,
            other => Self::Unknown(other),
        }
    }
}

async fn handle_command(state: &AppState, conversation: &mut Conversation, command: ReplCommand<'_>) {
    match command {
        ReplCommand::Confirm(Some(token)) => {
            let outcome = state.dispatcher.confirm_creation(token).await;
            match serde_json::to_string_pretty(&outcome) {
                Ok(json) => println!("{json}"),
                Err(e) => eprintln!("\x1B[31merror: {e}\x1B[0m"),
            }
        }
        ReplCommand::Confirm(None) => {
            eprintln!("Usage: /confirm <token>");
        }

        ReplCommand::Model(Some(name)) => {
            conversation.set_model(Some(name.to_owned()));
            eprintln!("Model set to: {name}");
        }
        ReplCommand::Model(None) => {
            eprintln!("Current model: {}", conversation.model().unwrap_or("(default)"));
            let models = state.config.llm.available_models();
            if !models.is_empty() {
                eprintln!("Available: {}", models.join(", "));
            }
            eprintln!("Usage: /model <name>");
        }

        ReplCommand::Reset => {
            conversation.reset();
            eprintln!("Conversation reset.");
        }

        ReplCommand::Help => {
            eprintln!("Commands:");
            eprintln!("  /confirm <token>  Create a proposed skill");
            eprintln!("  /model [name]     Show or set the model");
            eprintln!("  /reset            Start a fresh conversation");
            eprintln!("  /exit, exit       Exit the chat");
            eprintln!("  /help             Show this help");
        }

        ReplCommand::Unknown(other) => {
            eprintln!("Unknown command: {other}  (type /help for a list)");
        }

        ReplCommand::Exit | ReplCommand::Message(_) => {}
    }
}
