//! `cwa` — the CloudWatch Log Chat Agent's interactive terminal client.
//!
//! Boots the runtime, then opens a readline loop that sends each line to
//! the orchestrator and prints the response. Configuration loading, CLI
//! flag parsing, and credential storage are deliberately thin here — this
//! binary is a harness over the agent runtime, not a product surface.

mod bootstrap;

use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use cwa_domain::config::Config;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = load_config()?;
    let app = bootstrap::build_app(config).await.context("starting runtime")?;

    app.orchestrator.register_tool_listener(|record| {
        tracing::debug!(
            tool = %record.tool_name,
            status = ?record.status,
            "tool call"
        );
    });
    app.orchestrator.set_context_notification_callback(|n| {
        eprintln!("\x1B[2m[{:?}] {}\x1B[0m", n.severity, n.message);
    });

    run_repl(app.orchestrator).await
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,cwa_orchestrator=debug")),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Load config from the path named by `CWA_CONFIG` (or `./cwa.toml` if
/// present), falling back to built-in defaults. No flag parsing: this
/// binary is a thin harness, not the configuration surface.
fn load_config() -> anyhow::Result<Config> {
    let path = std::env::var("CWA_CONFIG")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| std::path::PathBuf::from("cwa.toml"));

    if path.exists() {
        Config::load(&path).with_context(|| format!("loading config from {}", path.display()))
    } else {
        Ok(Config::default())
    }
}

async fn run_repl(orchestrator: Arc<cwa_orchestrator::Orchestrator>) -> anyhow::Result<()> {
    let history_path = dirs::home_dir()
        .unwrap_or_default()
        .join(".cwa")
        .join("chat_history.txt");
    if let Some(parent) = history_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let mut rl = rustyline::DefaultEditor::new()?;
    let _ = rl.load_history(&history_path);

    eprintln!("CloudWatch Log Chat Agent");
    eprintln!("Type /help for commands, Ctrl+D to exit");
    eprintln!();

    loop {
        let readline = rl.readline("you> ");
        match readline {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                rl.add_history_entry(&line).ok();

                if trimmed.starts_with('/') {
                    if handle_slash_command(trimmed, &orchestrator) {
                        break;
                    }
                    continue;
                }

                if let Err(e) = send_message(&orchestrator, trimmed).await {
                    eprintln!("\x1B[31merror: {e}\x1B[0m");
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                eprintln!("(Use Ctrl+D or /exit to quit)");
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

/// Handle a slash command. Returns `true` if the REPL should exit.
fn handle_slash_command(input: &str, orchestrator: &cwa_orchestrator::Orchestrator) -> bool {
    match input {
        "/exit" | "/quit" => true,
        "/clear" => {
            eprint!("\x1B[2J\x1B[1;1H");
            false
        }
        "/reset" => {
            orchestrator.clear_history();
            eprintln!("History cleared.");
            false
        }
        "/help" => {
            eprintln!("Commands:");
            eprintln!("  /clear   Clear the screen");
            eprintln!("  /reset   Clear conversation history and budget usage");
            eprintln!("  /exit, /quit  Exit the chat");
            eprintln!("  /help    Show this help");
            false
        }
        other => {
            eprintln!("Unknown command: {other}  (type /help for a list)");
            false
        }
    }
}

async fn send_message(orchestrator: &Arc<cwa_orchestrator::Orchestrator>, user_message: &str) -> anyhow::Result<()> {
    let mut rx = orchestrator.chat_stream(user_message.to_string());
    while let Some(chunk) = rx.recv().await {
        match chunk {
            Ok(text) => {
                print!("{text}");
                std::io::stdout().flush().ok();
            }
            Err(e) => {
                eprintln!("\x1B[31merror: {e}\x1B[0m");
                break;
            }
        }
    }
    println!();
    println!();
    Ok(())
}
