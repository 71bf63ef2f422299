//! Sentiment analysis over the message buffer.
//!
//! - `requester`: builds the transcript, calls the model, parses the report
//!   and optionally posts it back to the channel
//! - `history`: append-only list of completed reports

use std::future::Future;

use crate::Result;

pub mod history;
pub mod requester;

pub use history::AnalysisHistory;
pub use requester::{AnalysisRequester, PostOutcome};

/// Request sent to a language model.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisPrompt {
    /// Persona / output contract.
    pub system: String,
    /// Transcript with its header line.
    pub content: String,
}

/// Raw model output before parsing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelReply {
    pub text: String,
    pub grounding_urls: Vec<String>,
}

/// A model that turns a prompt into text expected to hold the JSON report.
pub trait LanguageModel: Send + Sync {
    fn generate(&self, prompt: &AnalysisPrompt) -> impl Future<Output = Result<ModelReply>> + Send;
}
