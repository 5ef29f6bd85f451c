//! `stepwise chat` — Interactive or single-message chat mode.

use std::io::Write;
use std::sync::Arc;
use stepwise_agent::{AgentLoopController, AgentStreamEvent, TurnOptions, TurnOutcome, stop_pair};
use stepwise_config::AppConfig;
use stepwise_core::agent::AgentConfig;
use stepwise_core::error::ProviderError;
use stepwise_core::event::EventBus;
use stepwise_core::message::{Conversation, ConversationId};
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;

/// Longest tool output echoed to the terminal.
const TOOL_OUTPUT_PREVIEW: usize = 200;

pub async fn run(
    message: Option<String>,
    conversation: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;

    let provider = match stepwise_providers::build_from_config(&config) {
        Ok(provider) => provider,
        Err(ProviderError::NotConfigured(reason)) => {
            print_setup_help(&reason);
            return Err(format!("Provider not configured: {reason}").into());
        }
        Err(e) => return Err(e.into()),
    };

    let store = super::open_store(&config);
    let tools = Arc::new(stepwise_tools::default_registry());
    let controller = AgentLoopController::new(provider, tools, Arc::new(EventBus::default()))
        .with_store(store.clone());
    let agent_config = config.agent_config();

    let mut conv = match conversation {
        Some(id) => store
            .load(&ConversationId::from(&id))
            .await?
            .ok_or_else(|| format!("Conversation {id} not found"))?,
        None => Conversation::new(),
    };

    if let Some(msg) = message {
        // Single message mode
        let outcome = turn(&controller, &mut conv, &agent_config, &msg).await;
        eprintln!("  conversation: {}", conv.id);
        outcome?;
        return Ok(());
    }

    // Interactive mode
    println!();
    println!("  stepwise — interactive mode");
    println!();
    println!("  Provider:      {}", config.default_provider);
    println!("  Model:         {}", agent_config.model_id);
    println!("  Conversation:  {}", conv.id);
    println!("  Store:         {}", store.name());
    println!();
    println!("  Type your message and press Enter.");
    println!("  Ctrl+C stops a running turn; 'exit' or Ctrl+C at the prompt quits.");
    println!();

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if matches!(input, "exit" | "quit") {
            break;
        }

        println!();
        if let Err(e) = turn(&controller, &mut conv, &agent_config, input).await {
            eprintln!("  [Error] {e}");
            eprintln!("  Your message was kept; send it again to retry.");
        }
        println!();
    }

    println!();
    println!("  Conversation saved as {}", conv.id);
    Ok(())
}

/// Run one turn, streaming output to the terminal. Ctrl+C stops the turn.
async fn turn(
    controller: &AgentLoopController,
    conv: &mut Conversation,
    agent_config: &AgentConfig,
    text: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let (handle, signal) = stop_pair();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.stop();
        }
    });

    let (tx, rx) = mpsc::channel(64);
    let printer = tokio::spawn(print_events(rx));

    let result = controller
        .run_turn(
            conv,
            text,
            agent_config,
            TurnOptions::new().with_stop(signal).with_events(tx),
        )
        .await;

    ctrl_c.abort();
    let _ = printer.await;

    match result? {
        TurnOutcome::Completed { .. } | TurnOutcome::Cancelled { .. } => Ok(()),
        TurnOutcome::StepLimitExceeded { max_turns, .. } => Err(format!(
            "No final answer after {max_turns} model calls (raise agent.max_turns to allow more)"
        )
        .into()),
    }
}

async fn print_events(mut rx: mpsc::Receiver<AgentStreamEvent>) {
    let mut mid_line = false;
    while let Some(event) = rx.recv().await {
        match event {
            AgentStreamEvent::Chunk { content } => {
                print!("{content}");
                let _ = std::io::stdout().flush();
                mid_line = !content.ends_with('\n');
            }
            AgentStreamEvent::Thought { .. } => {}
            AgentStreamEvent::ToolCall { name, input } => {
                if std::mem::take(&mut mid_line) {
                    println!();
                }
                eprintln!("  → {name}({input})");
            }
            AgentStreamEvent::ToolResult {
                output, success, ..
            } => {
                let marker = if success { "✓" } else { "✗" };
                eprintln!("  ← {marker} {}", preview(&output));
            }
            AgentStreamEvent::Done { .. } => {
                if mid_line {
                    println!();
                }
            }
            AgentStreamEvent::StepLimit { max_turns } => {
                eprintln!();
                eprintln!("  [Stopped] step limit of {max_turns} model calls reached");
            }
            AgentStreamEvent::Cancelled => {
                eprintln!();
                eprintln!("  [Stopped]");
            }
            AgentStreamEvent::Error { .. } => {
                if mid_line {
                    println!();
                }
            }
        }
    }
}

fn preview(output: &str) -> String {
    let flat = output.replace('\n', " ");
    if flat.chars().count() <= TOOL_OUTPUT_PREVIEW {
        return flat;
    }
    let cut: String = flat.chars().take(TOOL_OUTPUT_PREVIEW).collect();
    format!("{cut}…")
}

fn print_setup_help(reason: &str) {
    eprintln!();
    eprintln!("  ERROR: {reason}");
    eprintln!();
    eprintln!("  Set one of these environment variables:");
    eprintln!("    STEPWISE_API_KEY      (any provider)");
    eprintln!("    OPENROUTER_API_KEY    (OpenRouter, the default)");
    eprintln!("    OPENAI_API_KEY        (OpenAI direct)");
    eprintln!();
    eprintln!("  Or add it to your config file:");
    eprintln!("    {}", AppConfig::config_path().display());
    eprintln!();
    eprintln!("  For a local model: STEPWISE_PROVIDER=ollama STEPWISE_MODEL=llama3.2");
    eprintln!();
}
