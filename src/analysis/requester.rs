//! Analysis requester: transcript → model → structured report.

use std::time::Instant;

use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis::{AnalysisPrompt, LanguageModel, ModelReply};
use crate::config::ANALYSIS_WINDOW;
use crate::gateway::{GatewayConfig, RelayClient};
use crate::metrics;
use crate::models::{AnalysisResult, ChatMessage};
use crate::prompts::Prompt;
use crate::{Error, Result};

pub const TRANSCRIPT_HEADER: &str = "Chat History from the last hour:\n";
pub const DEFAULT_SUMMARY: &str = "No summary generated.";

/// Result of the optional auto-post step. Never affects recorded history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostOutcome {
    /// Auto-post disabled.
    Skipped,
    Delivered,
    /// Relay or platform answered non-2xx.
    Rejected,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct AnalysisRequester<M> {
    model: M,
    relay: RelayClient,
    window: usize,
    persona: String,
}

impl<M: LanguageModel> AnalysisRequester<M> {
    pub fn new(model: M, relay: RelayClient) -> Self {
        Self {
            model,
            relay,
            window: ANALYSIS_WINDOW,
            persona: Prompt::MarketAnalyst.load_or_builtin(),
        }
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window.max(1);
        self
    }

    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = persona.into();
        self
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn build_prompt(&self, messages: &[ChatMessage]) -> Result<AnalysisPrompt> {
        if messages.is_empty() {
            return Err(Error::InvalidInput(
                "no messages to analyze; fetch the feed first".to_string(),
            ));
        }
        Ok(AnalysisPrompt {
            system: self.persona.clone(),
            content: format!("{}{}", TRANSCRIPT_HEADER, build_transcript(messages, self.window)),
        })
    }

    /// Analyze the most recent `window` messages of `messages`.
    ///
    /// Any failure (model transport, empty or non-JSON reply) fails the whole
    /// attempt; there is no partial result.
    pub async fn analyze(&self, messages: &[ChatMessage]) -> Result<AnalysisResult> {
        let prompt = self.build_prompt(messages)?;
        let started = Instant::now();
        let result = match self.model.generate(&prompt).await {
            Ok(reply) => parse_reply(reply),
            Err(e) => Err(e),
        };
        metrics::observe_analysis(started.elapsed(), result.is_ok());

        match &result {
            Ok(r) => info!(
                score = r.sentiment_score,
                themes = r.themes.len(),
                messages = messages.len().min(self.window),
                "Analysis complete"
            ),
            Err(e) => warn!(error = %e, "Analysis failed"),
        }
        result
    }

    /// Post the pulse message when the config asks for it.
    pub async fn publish(&self, config: &GatewayConfig, result: &AnalysisResult) -> PostOutcome {
        if !config.auto_post {
            return PostOutcome::Skipped;
        }
        match self.relay.post_message(config, &format_pulse(result)).await {
            Ok(true) => PostOutcome::Delivered,
            Ok(false) => PostOutcome::Rejected,
            Err(e) => PostOutcome::Failed(e.to_string()),
        }
    }
}

/// `"author: content"` lines for the last `window` messages, oldest first.
pub fn build_transcript(messages: &[ChatMessage], window: usize) -> String {
    let start = messages.len().saturating_sub(window);
    messages[start..]
        .iter()
        .map(ChatMessage::transcript_line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse the model's JSON report, filling defaults for missing fields.
pub fn parse_reply(reply: ModelReply) -> Result<AnalysisResult> {
    let text = strip_code_fences(&reply.text);
    if text.is_empty() {
        return Err(Error::MalformedResponse("no response from model".to_string()));
    }

    let value: Value = serde_json::from_str(text)
        .map_err(|e| Error::MalformedResponse(format!("model reply is not valid JSON: {}", e)))?;
    let object = value
        .as_object()
        .ok_or_else(|| Error::MalformedResponse("model reply is not a JSON object".to_string()))?;

    let sentiment_score = object
        .get("overallSentiment")
        .and_then(Value::as_f64)
        .map(clamp_score)
        .unwrap_or(0.0);
    let summary = object
        .get("summaryMarkdown")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| DEFAULT_SUMMARY.to_string());
    let themes = object
        .get("keyThemes")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(AnalysisResult {
        id: Uuid::new_v4(),
        timestamp: Utc::now(),
        sentiment_score,
        summary,
        themes,
        grounding_urls: reply.grounding_urls,
    })
}

fn clamp_score(score: f64) -> f64 {
    if score.is_finite() {
        score.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// Drop a surrounding ```json ... ``` fence if present.
fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Channel message announcing a finished analysis.
pub fn format_pulse(result: &AnalysisResult) -> String {
    let icon = if result.sentiment_score > 0.0 { "📈" } else { "📉" };
    format!(
        "**Market Pulse** {}\nScore: {:.2}\nThemes: {}\n\n{}",
        icon,
        result.sentiment_score,
        result.themes.join(", "),
        result.summary
    )
}
