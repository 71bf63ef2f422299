//! `fetch` subcommand: one-shot read of the channel window.

use anyhow::{anyhow, Result};

use crate::commands::{describe, AppContext};
use crate::models::ChatMessage;

pub fn format_message(message: &ChatMessage) -> String {
    let bot = if message.is_bot { " [bot]" } else { "" };
    format!(
        "[{}] {}{}: {}",
        message.timestamp.format("%Y-%m-%d %H:%M"),
        message.author,
        bot,
        message.content
    )
}

pub async fn run(ctx: &AppContext) -> Result<()> {
    let gateway = ctx.active_gateway()?;
    let relay = ctx.relay_client()?;

    println!("📥 Fetching #{} via {}", gateway.channel_id, gateway.relay_url);
    let messages = relay
        .fetch_messages(&gateway)
        .await
        .map_err(|e| anyhow!("❌ {}", describe(&e)))?;

    for message in &messages {
        println!("{}", format_message(message));
    }
    println!("\n✅ {} messages", messages.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn bot_messages_are_tagged() {
        let message = ChatMessage {
            id: "1".into(),
            author: "pulse".into(),
            content: "hi".into(),
            timestamp: Utc.with_ymd_and_hms(2025, 3, 1, 9, 5, 0).unwrap(),
            is_bot: true,
        };
        assert_eq!(format_message(&message), "[2025-03-01 09:05] pulse [bot]: hi");
    }
}
