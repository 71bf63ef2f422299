//! `history` subcommand: recorded sentiment trend.

use anyhow::Result;

use crate::analysis::AnalysisHistory;
use crate::commands::AppContext;

/// Text bar for a score in [-1, 1], centred on zero.
pub fn trend_bar(score: f64) -> String {
    const HALF: usize = 10;
    let filled = ((score.abs() * HALF as f64).round() as usize).min(HALF);
    if score >= 0.0 {
        format!("{}|{}{}", " ".repeat(HALF), "█".repeat(filled), " ".repeat(HALF - filled))
    } else {
        format!("{}{}|{}", " ".repeat(HALF - filled), "█".repeat(filled), " ".repeat(HALF))
    }
}

/// Mean of the recorded scores; `None` when nothing is recorded.
pub fn average_score(history: &AnalysisHistory) -> Option<f64> {
    let scores = history.scores();
    if scores.is_empty() {
        return None;
    }
    Some(scores.iter().map(|(_, score)| score).sum::<f64>() / scores.len() as f64)
}

pub fn run(ctx: &AppContext, limit: usize) -> Result<()> {
    let history = AnalysisHistory::load(&ctx.store.history_path());
    if history.is_empty() {
        println!("No analyses recorded yet");
        return Ok(());
    }

    println!("📈 Last {} of {} analyses\n", limit.min(history.len()), history.len());
    for result in history.recent(limit) {
        println!(
            "{}  {:+.2} {}  {}",
            result.timestamp.format("%Y-%m-%d %H:%M"),
            result.sentiment_score,
            trend_bar(result.sentiment_score),
            result.themes.join(", ")
        );
    }
    if let Some(avg) = average_score(&history) {
        println!("\nAverage over {} analyses: {:+.2}", history.len(), avg);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::analysis::requester::parse_reply;
    use crate::analysis::ModelReply;

    fn scored(score: f64) -> crate::models::AnalysisResult {
        parse_reply(ModelReply {
            text: format!(r#"{{"overallSentiment": {}}}"#, score),
            grounding_urls: vec![],
        })
        .unwrap()
    }

    #[test]
    fn average_over_whole_history() {
        let mut history = AnalysisHistory::new();
        assert_eq!(average_score(&history), None);
        history.push(scored(0.5));
        history.push(scored(-0.1));
        let avg = average_score(&history).unwrap();
        assert!((avg - 0.2).abs() < 1e-9);
    }

    #[test]
    fn bar_is_fixed_width() {
        for score in [-1.0, -0.5, 0.0, 0.3, 1.0] {
            assert_eq!(trend_bar(score).chars().count(), 21, "score {}", score);
        }
    }

    #[test]
    fn bar_direction_follows_sign() {
        assert!(trend_bar(0.5).starts_with("          |█████"));
        assert!(trend_bar(-0.5).ends_with("█████|          "));
    }
}
