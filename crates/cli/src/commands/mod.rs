//! Subcommands and the plumbing they share.

pub mod ask;
pub mod config_cmd;
pub mod review;

use std::io::Write;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use toolloop_agent::{AgentLoop, AgentStreamEvent, CancellationToken};
use toolloop_config::AppConfig;
use toolloop_core::session::{Session, SessionStatus};
use toolloop_core::tool::ToolRegistry;
use tracing::{info, warn};

/// Load configuration and insist on an API key.
pub(crate) fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // Check for API key early: give a clear error
    if !config.has_api_key() && config.default_provider != "ollama" {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    OPENAI_API_KEY   = 'sk-...'");
        eprintln!("    TOOLLOOP_API_KEY = 'sk-...'");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    Ok(config)
}

/// Wire an agent loop from configuration.
pub(crate) fn build_agent(
    config: &AppConfig,
    tools: ToolRegistry,
    max_steps: Option<u32>,
) -> AgentLoop {
    let provider = toolloop_providers::build_from_config(config);
    let agent = AgentLoop::new(provider, &config.default_model, Arc::new(tools))
        .with_settings(&config.agent)
        .with_temperature(config.default_temperature)
        .with_max_tokens(config.default_max_tokens);
    match max_steps {
        Some(max) => agent.with_max_steps(max),
        None => agent,
    }
}

/// A token that fires on Ctrl-C.
pub(crate) fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, cancelling session");
            trigger.cancel();
        }
    });
    token
}

/// Where one rendered event goes.
#[derive(Debug, PartialEq)]
enum Output {
    /// Answer text, written without a trailing newline
    Stdout(String),
    /// Progress and diagnostics, one line each
    Stderr(String),
}

/// Render one agent event.
fn render(event: &AgentStreamEvent) -> Output {
    match event {
        AgentStreamEvent::Chunk { content } => Output::Stdout(content.clone()),
        AgentStreamEvent::StreamRestarted { deltas_consumed } => Output::Stderr(format!(
            "\n  [discarded partial output after {deltas_consumed} deltas; the model is calling tools]"
        )),
        AgentStreamEvent::ToolCall { name, input, .. } => {
            Output::Stderr(format!("  → {name} {input}"))
        }
        AgentStreamEvent::ToolResult { name, success, .. } => {
            let outcome = if *success { "ok" } else { "failed" };
            Output::Stderr(format!("  ← {name}: {outcome}"))
        }
        AgentStreamEvent::Error { message } => Output::Stderr(format!("  [Error] {message}")),
        AgentStreamEvent::Done { .. } => Output::Stdout("\n".into()),
    }
}

/// Render agent events: answer text on stdout, tool activity on stderr.
/// Ends at the `done` event or when the sender goes away.
pub(crate) fn spawn_printer(mut rx: mpsc::UnboundedReceiver<AgentStreamEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut stdout = std::io::stdout();
        while let Some(event) = rx.recv().await {
            match render(&event) {
                Output::Stdout(text) => {
                    print!("{text}");
                    let _ = stdout.flush();
                }
                Output::Stderr(line) => eprintln!("{line}"),
            }
            if matches!(event, AgentStreamEvent::Done { .. }) {
                break;
            }
        }
    })
}

/// Report how a session ended. A failed session is an error.
pub(crate) fn report(session: &Session) -> Result<(), Box<dyn std::error::Error>> {
    match session.status() {
        SessionStatus::Completed => {
            info!(steps = session.step_count(), "Done");
            Ok(())
        }
        SessionStatus::MaxStepsExceeded => {
            warn!(
                steps = session.step_count(),
                "Stopped at the step limit before a final answer"
            );
            Ok(())
        }
        SessionStatus::Cancelled => {
            eprintln!("  Cancelled.");
            Ok(())
        }
        SessionStatus::Failed { reason } => Err(format!("Session failed: {reason}").into()),
        SessionStatus::Running => Err("Session ended while still running".into()),
    }
}
