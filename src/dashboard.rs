//! Dashboard shell: the application state behind the UI.
//!
//! Holds the active gateway config, the latest feed snapshot, analysis
//! history, diagnostics and the activity log. There are no globals; each
//! CLI session owns one `Dashboard`.
//!
//! The active config is held behind an `Arc` and replaced wholesale on
//! reconnect, so an analysis in flight keeps the config it started with.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::warn;

use crate::activity_log::ActivityLog;
use crate::analysis::{AnalysisHistory, AnalysisRequester, LanguageModel, PostOutcome};
use crate::gateway::{DiagnosticRunner, GatewayConfig};
use crate::models::{AnalysisResult, ChatMessage, DiagnosticResult};
use crate::poller::{FeedPoller, FeedSnapshot};
use crate::{Error, Result};

/// Inputs captured when an analysis starts.
#[derive(Debug, Clone)]
pub struct AnalysisJob {
    pub config: Arc<GatewayConfig>,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug)]
pub struct Dashboard {
    config: Option<Arc<GatewayConfig>>,
    feed: FeedSnapshot,
    history: AnalysisHistory,
    history_path: Option<PathBuf>,
    diagnostics: Vec<DiagnosticResult>,
    log: ActivityLog,
    poller: FeedPoller,
    analyzing: bool,
    diagnosing: bool,
}

impl Dashboard {
    pub fn new(poller: FeedPoller) -> Self {
        Self {
            config: None,
            feed: FeedSnapshot::default(),
            history: AnalysisHistory::new(),
            history_path: None,
            diagnostics: DiagnosticResult::pending_set(),
            log: ActivityLog::new(),
            poller,
            analyzing: false,
            diagnosing: false,
        }
    }

    /// Load history from `path` and save it there after every analysis.
    pub fn with_history_file(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        self.history = AnalysisHistory::load(&path);
        self.history_path = Some(path);
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<FeedSnapshot> {
        self.poller.subscribe()
    }

    /// Validate `config`, make it active and start polling.
    pub fn connect(&mut self, config: GatewayConfig) -> Result<()> {
        if let Err(e) = config.validate() {
            self.log.error(format!("Connect rejected: {}", e));
            return Err(e);
        }
        self.log.info(format!(
            "Connecting to channel {} via {} (token {})",
            config.channel_id,
            config.relay_url,
            config.masked_token()
        ));
        self.poller.arm(config.clone());
        self.config = Some(Arc::new(config));
        Ok(())
    }

    /// Stop polling. The message buffer is kept.
    pub fn disconnect(&mut self) {
        if self.config.take().is_some() {
            self.poller.disarm();
            self.log.warn("Gateway disconnected");
        }
    }

    pub fn is_connected(&self) -> bool {
        self.config.is_some()
    }

    pub fn config(&self) -> Option<&GatewayConfig> {
        self.config.as_deref()
    }

    pub fn feed(&self) -> &FeedSnapshot {
        &self.feed
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.feed.messages
    }

    pub fn history(&self) -> &AnalysisHistory {
        &self.history
    }

    pub fn latest_analysis(&self) -> Option<&AnalysisResult> {
        self.history.latest()
    }

    pub fn diagnostics(&self) -> &[DiagnosticResult] {
        &self.diagnostics
    }

    pub fn log(&self) -> &ActivityLog {
        &self.log
    }

    pub fn is_analyzing(&self) -> bool {
        self.analyzing
    }

    pub fn is_diagnosing(&self) -> bool {
        self.diagnosing
    }

    /// Apply a poller snapshot. Returns whether it was applied.
    ///
    /// Snapshots arriving while disconnected, or not newer than the one
    /// already shown, are dropped.
    pub fn sync_feed(&mut self, snapshot: FeedSnapshot) -> bool {
        if !self.is_connected() || snapshot.sequence <= self.feed.sequence {
            return false;
        }

        match (&self.feed.last_error, &snapshot.last_error) {
            (_, Some(err)) => {
                let repeated = self
                    .feed
                    .last_error
                    .as_ref()
                    .is_some_and(|prev| prev.message == err.message);
                if !repeated {
                    self.log.error(format!("Fetch failed: {}", err.message));
                }
            }
            (Some(_), None) => {
                self.log
                    .success(format!("Feed recovered: {} messages", snapshot.messages.len()));
            }
            (None, None) => {
                let known: HashSet<&str> =
                    self.feed.messages.iter().map(|m| m.id.as_str()).collect();
                let fresh = snapshot
                    .messages
                    .iter()
                    .filter(|m| !known.contains(m.id.as_str()))
                    .count();
                if self.feed.sequence == 0 {
                    self.log
                        .success(format!("Feed online: {} messages", snapshot.messages.len()));
                } else if fresh > 0 {
                    self.log.info(format!("Received {} new messages", fresh));
                }
            }
        }

        self.feed = snapshot;
        true
    }

    /// Capture config and buffer for an analysis run and mark it busy.
    pub fn begin_analysis(&mut self) -> Result<AnalysisJob> {
        if self.analyzing {
            return Err(Error::InvalidInput("analysis already running".to_string()));
        }
        let config = self
            .config
            .clone()
            .ok_or_else(|| Error::InvalidInput("not connected to a gateway".to_string()))?;
        if self.feed.messages.is_empty() {
            return Err(Error::InvalidInput(
                "no messages to analyze; wait for the feed".to_string(),
            ));
        }
        self.analyzing = true;
        self.log.info(format!(
            "Analyzing {} messages",
            self.feed.messages.len()
        ));
        Ok(AnalysisJob {
            config,
            messages: self.feed.messages.clone(),
        })
    }

    /// Record the outcome of a run started with [`Dashboard::begin_analysis`].
    ///
    /// Failures leave history and the message buffer untouched.
    pub fn finish_analysis(&mut self, outcome: &Result<AnalysisResult>) {
        self.analyzing = false;
        match outcome {
            Ok(result) => {
                self.log.success(format!(
                    "Analysis complete: sentiment {:+.2}, themes: {}",
                    result.sentiment_score,
                    result.themes.join(", ")
                ));
                self.history.push(result.clone());
                if let Some(path) = &self.history_path {
                    if let Err(e) = self.history.save(path) {
                        warn!(path = %path.display(), error = %e, "Failed to save analysis history");
                    }
                }
            }
            Err(e) => self.log.error(format!("Analysis failed: {}", e)),
        }
    }

    pub fn record_post(&mut self, outcome: &PostOutcome) {
        match outcome {
            PostOutcome::Skipped => {}
            PostOutcome::Delivered => self.log.success("Market pulse posted to channel"),
            PostOutcome::Rejected => self.log.warn("Gateway rejected market pulse post"),
            PostOutcome::Failed(e) => self.log.error(format!("Market pulse post failed: {}", e)),
        }
    }

    /// Analyze the current buffer, record the result and auto-post it.
    pub async fn run_analysis<M: LanguageModel>(
        &mut self,
        requester: &AnalysisRequester<M>,
    ) -> Result<AnalysisResult> {
        let job = self.begin_analysis()?;
        let outcome = requester.analyze(&job.messages).await;
        self.finish_analysis(&outcome);
        let result = outcome?;

        let posted = requester.publish(&job.config, &result).await;
        self.record_post(&posted);
        Ok(result)
    }

    /// Reset the diagnostics list to pending and mark a run busy.
    pub fn begin_diagnostics(&mut self, target: &GatewayConfig) -> Result<()> {
        if self.diagnosing {
            return Err(Error::InvalidInput("diagnostics already running".to_string()));
        }
        self.diagnosing = true;
        self.diagnostics = DiagnosticResult::pending_set();
        self.log.info(format!("Running diagnostics against {}", target.relay_url));
        Ok(())
    }

    /// Replace the diagnostics list with the results of a finished run.
    pub fn finish_diagnostics(&mut self, results: Vec<DiagnosticResult>) -> &[DiagnosticResult] {
        if DiagnosticResult::all_passed(&results) {
            self.log.success("Diagnostics passed");
        } else if let Some(failed) = results
            .iter()
            .find(|r| r.status == crate::models::DiagnosticStatus::Error)
        {
            self.log.error(format!(
                "Diagnostics failed at {}: {}",
                failed.step.label(),
                failed.details
            ));
        }

        self.diagnostics = results;
        self.diagnosing = false;
        &self.diagnostics
    }

    /// Probe `target` and replace the diagnostics list with the results.
    pub async fn run_diagnostics(
        &mut self,
        runner: &DiagnosticRunner,
        target: &GatewayConfig,
    ) -> Result<&[DiagnosticResult]> {
        self.begin_diagnostics(target)?;
        let results = runner.run_for(target).await;
        Ok(self.finish_diagnostics(results))
    }

    /// One-line summary of connection, feed and sentiment.
    pub fn status_line(&self) -> String {
        let Some(config) = self.config() else {
            return format!("Disconnected ({} cached messages)", self.feed.messages.len());
        };
        let channel = &config.channel_id;

        let mut line = if let Some(err) = &self.feed.last_error {
            format!(
                "Gateway error on #{}: {} ({} cached messages)",
                channel,
                err.message,
                self.feed.messages.len()
            )
        } else if let Some(at) = self.feed.fetched_at {
            format!(
                "Live on #{}: {} messages, synced {}",
                channel,
                self.feed.messages.len(),
                at.format("%H:%M:%S")
            )
        } else {
            format!("Connecting to #{}...", channel)
        };

        if let Some(latest) = self.latest_analysis() {
            line.push_str(&format!(" | sentiment {:+.2}", latest.sentiment_score));
        }
        if self.analyzing {
            line.push_str(" | analyzing");
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AnalysisPrompt, ModelReply};
    use crate::gateway::RelayClient;
    use crate::models::LogLevel;
    use crate::poller::FeedError;
    use chrono::{TimeZone, Utc};
    use httpmock::prelude::*;
    use std::time::Duration;
    use tempfile::TempDir;

    struct FixedModel(&'static str);

    impl LanguageModel for FixedModel {
        async fn generate(&self, _prompt: &AnalysisPrompt) -> Result<ModelReply> {
            Ok(ModelReply {
                text: self.0.to_string(),
                grounding_urls: vec![],
            })
        }
    }

    fn relay() -> RelayClient {
        RelayClient::with_defaults()
            .unwrap()
            .with_timeout(Duration::from_secs(2))
    }

    fn dashboard() -> Dashboard {
        // long period: tests drive snapshots by hand
        Dashboard::new(FeedPoller::new(relay(), Duration::from_secs(3600)))
    }

    fn config(relay_url: &str) -> GatewayConfig {
        GatewayConfig {
            bot_token: "secret-token".into(),
            channel_id: "42".into(),
            relay_url: relay_url.into(),
            ..Default::default()
        }
    }

    fn message(id: &str) -> ChatMessage {
        ChatMessage {
            id: id.into(),
            author: "alice".into(),
            content: format!("msg {}", id),
            timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            is_bot: false,
        }
    }

    fn snapshot(sequence: u64, ids: &[&str]) -> FeedSnapshot {
        FeedSnapshot {
            sequence,
            messages: ids.iter().map(|id| message(id)).collect(),
            last_error: None,
            fetched_at: Some(Utc::now()),
        }
    }

    fn failed(sequence: u64, message: &str) -> FeedSnapshot {
        FeedSnapshot {
            sequence,
            messages: vec![],
            last_error: Some(FeedError {
                kind: crate::error::ErrorKind::Unreachable,
                message: message.into(),
            }),
            fetched_at: None,
        }
    }

    #[tokio::test]
    async fn connect_rejects_invalid_config() {
        let mut dash = dashboard();
        let err = dash.connect(GatewayConfig::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(!dash.is_connected());
        assert_eq!(dash.log().latest().unwrap().level, LogLevel::Error);
    }

    #[tokio::test]
    async fn connect_log_masks_token() {
        let mut dash = dashboard();
        dash.connect(config("http://127.0.0.1:1")).unwrap();
        let entry = dash.log().latest().unwrap();
        assert!(!entry.message.contains("secret-token"));
        assert!(entry.message.contains("oken"));
        dash.disconnect();
    }

    #[tokio::test]
    async fn stale_and_disconnected_snapshots_are_ignored() {
        let mut dash = dashboard();
        assert!(!dash.sync_feed(snapshot(1, &["1"])));

        dash.connect(config("http://127.0.0.1:1")).unwrap();
        assert!(dash.sync_feed(snapshot(3, &["1", "2"])));
        assert!(!dash.sync_feed(snapshot(2, &["9"])));
        assert_eq!(dash.messages().len(), 2);

        dash.disconnect();
        assert!(!dash.sync_feed(snapshot(4, &[])));
        assert_eq!(dash.messages().len(), 2);
    }

    #[tokio::test]
    async fn repeated_fetch_errors_logged_once() {
        let mut dash = dashboard();
        dash.connect(config("http://127.0.0.1:1")).unwrap();
        let before = dash.log().len();
        dash.sync_feed(failed(1, "down"));
        dash.sync_feed(failed(2, "down"));
        assert_eq!(dash.log().len(), before + 1);

        dash.sync_feed(snapshot(3, &["1"]));
        assert!(dash.log().latest().unwrap().message.contains("recovered"));
        assert!(dash.status_line().starts_with("Live on #42: 1 messages"));
        dash.disconnect();
    }

    #[tokio::test]
    async fn analysis_requires_messages() {
        let mut dash = dashboard();
        dash.connect(config("http://127.0.0.1:1")).unwrap();
        let requester = AnalysisRequester::new(FixedModel("{}"), relay());
        let err = dash.run_analysis(&requester).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(!dash.is_analyzing());
        assert!(dash.history().is_empty());
        dash.disconnect();
    }

    #[tokio::test]
    async fn failed_analysis_keeps_buffer_and_history() {
        let mut dash = dashboard();
        dash.connect(config("http://127.0.0.1:1")).unwrap();
        dash.sync_feed(snapshot(1, &["1", "2"]));

        let requester = AnalysisRequester::new(FixedModel("not json"), relay());
        assert!(dash.run_analysis(&requester).await.is_err());
        assert_eq!(dash.messages().len(), 2);
        assert!(dash.history().is_empty());
        assert!(!dash.is_analyzing());
        dash.disconnect();
    }

    #[tokio::test]
    async fn analysis_appends_history_and_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("analysis_history.json");
        let mut dash = dashboard().with_history_file(&path);
        dash.connect(config("http://127.0.0.1:1")).unwrap();
        dash.sync_feed(snapshot(1, &["1"]));

        let requester = AnalysisRequester::new(
            FixedModel(r#"{"overallSentiment":0.6,"summaryMarkdown":"up","keyThemes":["BTC"]}"#),
            relay(),
        );
        let result = dash.run_analysis(&requester).await.unwrap();
        assert_eq!(dash.latest_analysis(), Some(&result));
        assert!(dash.status_line().contains("sentiment +0.60"));
        assert_eq!(AnalysisHistory::load(&path).len(), 1);
        dash.disconnect();
    }

    #[tokio::test]
    async fn rejected_post_does_not_affect_history() {
        let server = MockServer::start_async().await;
        let post = server.mock(|when, then| {
            when.method(POST).path("/api/discord/channels/42/messages");
            then.status(403);
        });

        let mut dash = dashboard();
        let mut cfg = config(&server.base_url());
        cfg.auto_post = true;
        dash.connect(cfg).unwrap();
        dash.sync_feed(snapshot(1, &["1"]));

        let requester = AnalysisRequester::new(FixedModel("{}"), relay());
        dash.run_analysis(&requester).await.unwrap();
        assert_eq!(dash.history().len(), 1);
        assert_eq!(dash.log().latest().unwrap().level, LogLevel::Warn);
        post.assert_calls(1);
        dash.disconnect();
    }

    #[tokio::test]
    async fn diagnostics_replace_list_wholesale() {
        let mut dash = dashboard();
        assert_eq!(dash.diagnostics().len(), 4);
        let runner = DiagnosticRunner::new(relay());
        let results = dash
            .run_diagnostics(&runner, &config("not-a-url"))
            .await
            .unwrap();
        assert_eq!(results.len(), 4);
        assert!(!DiagnosticResult::all_passed(results));
        assert!(!dash.is_diagnosing());
        assert!(dash
            .log()
            .latest()
            .unwrap()
            .message
            .starts_with("Diagnostics failed at URL Validation"));
    }

    #[tokio::test]
    async fn diagnostics_finish_while_analysis_in_flight() {
        let mut dash = dashboard();
        dash.connect(config("http://127.0.0.1:1")).unwrap();
        dash.sync_feed(snapshot(1, &["1"]));

        let job = dash.begin_analysis().unwrap();
        let target = (*job.config).clone();
        dash.begin_diagnostics(&target).unwrap();
        assert!(dash.is_analyzing() && dash.is_diagnosing());
        assert!(dash
            .diagnostics()
            .iter()
            .all(|r| r.status == crate::models::DiagnosticStatus::Pending));
        assert!(dash.begin_diagnostics(&target).is_err());

        let results = DiagnosticRunner::new(relay()).run_for(&target).await;
        dash.finish_diagnostics(results);
        assert!(!dash.is_diagnosing());
        assert!(dash.is_analyzing());

        dash.finish_analysis(&Err(Error::Llm("quota".into())));
        assert!(!dash.is_analyzing());
        assert_eq!(dash.messages().len(), 1);
        dash.disconnect();
    }

    #[test]
    fn status_line_when_disconnected() {
        let dash = dashboard();
        assert_eq!(dash.status_line(), "Disconnected (0 cached messages)");
    }
}
