//! `analyze` subcommand: fetch, analyze once, record and optionally post.

use anyhow::{anyhow, Context, Result};

use crate::analysis::{AnalysisHistory, AnalysisRequester, PostOutcome};
use crate::commands::{describe, AppContext};
use crate::integrations::GeminiClient;
use crate::models::AnalysisResult;

pub fn render(result: &AnalysisResult) -> String {
    let mut out = format!(
        "📊 Sentiment: {:+.2}\n🏷️  Themes: {}\n\n{}",
        result.sentiment_score,
        if result.themes.is_empty() {
            "-".to_string()
        } else {
            result.themes.join(", ")
        },
        result.summary
    );
    if !result.grounding_urls.is_empty() {
        out.push_str("\n\nSources:");
        for url in &result.grounding_urls {
            out.push_str(&format!("\n  - {}", url));
        }
    }
    out
}

pub async fn run(ctx: &AppContext, no_post: bool) -> Result<()> {
    let gateway = ctx.active_gateway()?;
    let relay = ctx.relay_client()?;
    let model = GeminiClient::from_config(&ctx.config).context("Gemini client unavailable")?;
    let requester =
        AnalysisRequester::new(model, relay.clone()).with_window(ctx.config.analysis_window);

    let messages = relay
        .fetch_messages(&gateway)
        .await
        .map_err(|e| anyhow!("❌ {}", describe(&e)))?;
    println!("🧠 Analyzing {} messages from #{}...", messages.len(), gateway.channel_id);

    let result = requester.analyze(&messages).await?;

    let history_path = ctx.store.history_path();
    let mut history = AnalysisHistory::load(&history_path);
    history.push(result.clone());
    history.save(&history_path)?;

    println!("\n{}", render(&result));

    if no_post {
        return Ok(());
    }
    match requester.publish(&gateway, &result).await {
        PostOutcome::Skipped => {}
        PostOutcome::Delivered => println!("\n📣 Posted to #{}", gateway.target_channel()),
        PostOutcome::Rejected => println!("\n⚠️  Gateway rejected the post"),
        PostOutcome::Failed(e) => println!("\n⚠️  Post failed: {}", e),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn render_lists_sources() {
        let result = AnalysisResult {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            sentiment_score: -0.25,
            summary: "Cautious.".into(),
            themes: vec![],
            grounding_urls: vec!["https://a.example".into()],
        };
        let text = render(&result);
        assert!(text.starts_with("📊 Sentiment: -0.25"));
        assert!(text.contains("Themes: -"));
        assert!(text.ends_with("  - https://a.example"));
    }
}
