//! `toolloop review`: review the unstaged changes of the current repository.

use tokio::sync::mpsc;
use toolloop_config::AppConfig;
use toolloop_core::change_source::ChangeSource;
use toolloop_core::message::{Conversation, Message};
use toolloop_core::provider::ResponseMode;
use toolloop_core::tool::ToolRegistry;
use toolloop_tools::{GitChangeSource, WebSearchTool};
use tracing::info;

use super::{build_agent, cancel_on_ctrl_c, load_config, report, spawn_printer};

/// Built-in reviewer instructions.
pub const REVIEW_PROMPT: &str = "\
You are an expert code reviewer. You will be given a diff of code changes.
Identify potential breaking changes, bugs and regressions they introduce.
Use the web_search tool when you need documentation for an API or library \
you are unsure about.
For every problem you find, explain the impact and suggest a fix as a \
markdown code block. If the changes look safe, say so briefly.";

/// Reviewer instructions: the configured override or the built-in prompt.
pub fn system_prompt(config: &AppConfig) -> &str {
    config
        .review
        .system_prompt
        .as_deref()
        .unwrap_or(REVIEW_PROMPT)
}

/// The opening messages of a review session.
pub fn review_messages(system: &str, changes: &str) -> Vec<Message> {
    vec![
        Message::system(system),
        Message::user(format!("Code changes:\n```diff\n{changes}\n```")),
    ]
}

pub async fn run(max_steps: Option<u32>, buffered: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;

    let source = GitChangeSource::new();
    let changes = source.changes().await?;
    if changes.trim().is_empty() {
        info!(source = source.name(), "No changes found");
        println!("Nothing to review.");
        return Ok(());
    }
    info!(bytes = changes.len(), "Reviewing changes");

    let mut tools = ToolRegistry::new();
    tools.register(Box::new(WebSearchTool::new()));

    let (tx, rx) = mpsc::unbounded_channel();
    let mut agent = build_agent(&config, tools, max_steps).with_observer(tx);
    if buffered {
        agent = agent.with_response_mode(ResponseMode::Buffered);
    }
    let mode = agent.effective_mode();

    let printer = spawn_printer(rx);
    let conversation = Conversation::from_messages(review_messages(system_prompt(&config), &changes));
    let result = agent.run(conversation, cancel_on_ctrl_c()).await;

    // The printer stops once the observer is gone
    drop(agent);
    let _ = printer.await;

    let session = result?;
    if mode == ResponseMode::Buffered {
        if let Some(answer) = session.final_answer() {
            println!("{answer}");
        }
    }
    report(&session)
}
