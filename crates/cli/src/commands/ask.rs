//! `toolloop ask`: one question, answered with the built-in tools.

use tokio::sync::mpsc;
use toolloop_core::message::{Conversation, Message};
use toolloop_core::provider::ResponseMode;

use super::{build_agent, cancel_on_ctrl_c, load_config, report, spawn_printer};

pub async fn run(message: String, max_steps: Option<u32>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;

    let (tx, rx) = mpsc::unbounded_channel();
    let agent = build_agent(&config, toolloop_tools::default_registry(), max_steps).with_observer(tx);
    let mode = agent.effective_mode();

    let printer = spawn_printer(rx);
    let result = agent
        .run(
            Conversation::from_messages([Message::user(message)]),
            cancel_on_ctrl_c(),
        )
        .await;
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
