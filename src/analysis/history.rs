//! Append-only record of completed analyses.

use std::path::Path;

use crate::models::AnalysisResult;
use crate::store::{read_json, write_json_atomic};
use crate::Result;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisHistory {
    results: Vec<AnalysisResult>,
}

impl AnalysisHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from `path`; missing or unreadable files give an empty history.
    pub fn load(path: &Path) -> Self {
        Self {
            results: read_json(path).unwrap_or_default(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, &self.results)
    }

    pub fn push(&mut self, result: AnalysisResult) {
        self.results.push(result);
    }

    /// Most recently appended result.
    pub fn latest(&self) -> Option<&AnalysisResult> {
        self.results.last()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &AnalysisResult> {
        self.results.iter()
    }

    /// Last `n` results, oldest first.
    pub fn recent(&self, n: usize) -> &[AnalysisResult] {
        &self.results[self.results.len().saturating_sub(n)..]
    }

    /// Sentiment trend as `(timestamp, score)` points.
    pub fn scores(&self) -> Vec<(chrono::DateTime<chrono::Utc>, f64)> {
        self.results
            .iter()
            .map(|r| (r.timestamp, r.sentiment_score))
            .collect()
    }
}
