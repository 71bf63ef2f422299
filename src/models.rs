//! Domain records shared by the gateway, poller, analysis and dashboard.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single chat message, normalized from the platform payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub author: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub is_bot: bool,
}

impl ChatMessage {
    /// Transcript line fed to the language model.
    pub fn transcript_line(&self) -> String {
        format!("{}: {}", self.author, self.content)
    }
}

/// Structured sentiment report produced by one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// -1.0 (bearish) ..= 1.0 (bullish)
    pub sentiment_score: f64,
    pub summary: String,
    pub themes: Vec<String>,
    #[serde(default)]
    pub grounding_urls: Vec<String>,
}

/// Probe stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticStep {
    UrlValidation,
    Connectivity,
    CorsHeaders,
    AccessPolicy,
}

impl DiagnosticStep {
    pub const ALL: [DiagnosticStep; 4] = [
        DiagnosticStep::UrlValidation,
        DiagnosticStep::Connectivity,
        DiagnosticStep::CorsHeaders,
        DiagnosticStep::AccessPolicy,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            DiagnosticStep::UrlValidation => "URL Validation",
            DiagnosticStep::Connectivity => "Connectivity",
            DiagnosticStep::CorsHeaders => "CORS & Headers",
            DiagnosticStep::AccessPolicy => "Access Policy",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticStatus {
    Pending,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticResult {
    pub step: DiagnosticStep,
    pub status: DiagnosticStatus,
    pub details: String,
}

impl DiagnosticResult {
    pub fn success(step: DiagnosticStep, details: impl Into<String>) -> Self {
        Self {
            step,
            status: DiagnosticStatus::Success,
            details: details.into(),
        }
    }

    pub fn error(step: DiagnosticStep, details: impl Into<String>) -> Self {
        Self {
            step,
            status: DiagnosticStatus::Error,
            details: details.into(),
        }
    }

    /// Initial state before any run: every stage pending.
    pub fn pending_set() -> Vec<DiagnosticResult> {
        DiagnosticStep::ALL
            .iter()
            .map(|step| DiagnosticResult {
                step: *step,
                status: DiagnosticStatus::Pending,
                details: "waiting".to_string(),
            })
            .collect()
    }

    pub fn all_passed(results: &[DiagnosticResult]) -> bool {
        !results.is_empty()
            && results
                .iter()
                .all(|r| r.status == DiagnosticStatus::Success)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Success,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}
