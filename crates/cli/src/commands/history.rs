//! `stepwise history` — Replay a stored conversation.

use stepwise_agent::{group_for_display, render_steps};
use stepwise_core::message::{ConversationId, Message, Role};

pub async fn run(id: &str, raw: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let store = super::open_store(&config);

    let conv = store
        .load(&ConversationId::from(id))
        .await?
        .ok_or_else(|| format!("Conversation {id} not found in the {} store", store.name()))?;

    println!();
    println!("  Conversation {}", conv.id);
    println!("  Started {}", conv.created_at.format("%Y-%m-%d %H:%M"));
    println!();

    let messages = if raw {
        conv.messages.clone()
    } else {
        group_for_display(&conv.messages)
    };
    for message in &messages {
        print!("{}", render_message(message));
    }
    Ok(())
}

fn render_message(message: &Message) -> String {
    let label = match message.role {
        Role::User => "You",
        Role::Assistant => "Agent",
        Role::System => "System",
    };
    let mut out = format!("  {label} > {}\n", message.content);
    if let Some(steps) = message.execution_steps.as_deref().filter(|s| !s.is_empty()) {
        for line in render_steps(steps).lines() {
            out.push_str(&format!("      {line}\n"));
        }
    }
    out.push('\n');
    out
}
