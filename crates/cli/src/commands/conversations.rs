//! `stepwise conversations` — List stored conversations.

use stepwise_core::store::ConversationSummary;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let store = super::open_store(&config);
    let summaries = store.list().await?;

    if summaries.is_empty() {
        println!("No conversations in the {} store.", store.name());
        return Ok(());
    }

    println!("{} conversation(s):", summaries.len());
    println!();
    for summary in &summaries {
        println!("{}", summary_line(summary));
    }
    println!();
    println!("Replay one with: stepwise history <id>");
    Ok(())
}

fn summary_line(summary: &ConversationSummary) -> String {
    format!(
        "  {}  {}  {:>4} msgs  {}",
        summary.id,
        summary.updated_at.format("%Y-%m-%d %H:%M"),
        summary.message_count,
        summary.title.as_deref().unwrap_or("(untitled)"),
    )
}
