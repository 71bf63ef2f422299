//! `watch` subcommand: live dashboard session in the terminal.
//!
//! Keys (followed by Enter): `a` analyze, `d` diagnose, `s` status,
//! `l` recent log, `q` quit.
//!
//! Analysis, its auto-post and diagnostics run as background tasks, so
//! feed updates, further keys and Ctrl-C are served while they are in flight.

use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinSet;
use tracing::warn;

use crate::analysis::{AnalysisRequester, LanguageModel, PostOutcome};
use crate::commands::{analyze, diagnose, AppContext};
use crate::dashboard::Dashboard;
use crate::gateway::{DiagnosticRunner, GatewayConfig};
use crate::integrations::GeminiClient;
use crate::models::{AnalysisResult, DiagnosticResult, DiagnosticStep, LogEntry};
use crate::poller::FeedPoller;
use crate::Error;

/// Interactive commands read from stdin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchKey {
    Analyze,
    Diagnose,
    Status,
    Log,
    Quit,
}

impl WatchKey {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "a" | "analyze" => Some(Self::Analyze),
            "d" | "diagnose" => Some(Self::Diagnose),
            "s" | "status" => Some(Self::Status),
            "l" | "log" => Some(Self::Log),
            "q" | "quit" | "exit" => Some(Self::Quit),
            _ => None,
        }
    }
}

/// A background operation that has completed.
#[derive(Debug)]
pub enum Finished {
    Analysis(crate::Result<AnalysisResult>),
    Post(PostOutcome),
    Diagnostics(Vec<DiagnosticResult>),
}

/// Operations started from the keyboard, each on its own task.
///
/// The dashboard's busy flags allow one analysis and one diagnostic run at
/// a time; both may be in flight together with the poller.
pub struct Background<M> {
    requester: Option<Arc<AnalysisRequester<M>>>,
    runner: DiagnosticRunner,
    analysis_config: Option<Arc<GatewayConfig>>,
    analyses: JoinSet<crate::Result<AnalysisResult>>,
    posts: JoinSet<PostOutcome>,
    diagnostics: JoinSet<Vec<DiagnosticResult>>,
}

impl<M: LanguageModel + 'static> Background<M> {
    pub fn new(requester: Option<AnalysisRequester<M>>, runner: DiagnosticRunner) -> Self {
        Self {
            requester: requester.map(Arc::new),
            runner,
            analysis_config: None,
            analyses: JoinSet::new(),
            posts: JoinSet::new(),
            diagnostics: JoinSet::new(),
        }
    }

    pub fn start_analysis(&mut self, dashboard: &mut Dashboard) -> crate::Result<()> {
        let requester = self.requester.clone().ok_or_else(|| {
            Error::InvalidInput("analysis unavailable: set GOOGLE_API_KEY".to_string())
        })?;
        let job = dashboard.begin_analysis()?;
        self.analysis_config = Some(job.config);
        let messages = job.messages;
        self.analyses
            .spawn(async move { requester.analyze(&messages).await });
        Ok(())
    }

    pub fn start_diagnostics(
        &mut self,
        dashboard: &mut Dashboard,
        target: GatewayConfig,
    ) -> crate::Result<()> {
        dashboard.begin_diagnostics(&target)?;
        let runner = self.runner.clone();
        self.diagnostics
            .spawn(async move { runner.run_for(&target).await });
        Ok(())
    }

    /// Post a recorded result using the config its analysis started with.
    pub fn start_post(&mut self, result: AnalysisResult) {
        let (Some(requester), Some(config)) = (self.requester.clone(), self.analysis_config.take())
        else {
            return;
        };
        self.posts
            .spawn(async move { requester.publish(&config, &result).await });
    }

    /// Wait for the next completed operation. Pending forever when idle.
    pub async fn next(&mut self) -> Finished {
        tokio::select! {
            Some(joined) = self.analyses.join_next() => Finished::Analysis(
                joined.unwrap_or_else(|e| Err(Error::Llm(format!("analysis task failed: {}", e)))),
            ),
            Some(joined) = self.posts.join_next() => Finished::Post(
                joined.unwrap_or_else(|e| PostOutcome::Failed(e.to_string())),
            ),
            Some(joined) = self.diagnostics.join_next() => Finished::Diagnostics(
                joined.unwrap_or_else(|e| {
                    let detail = format!("diagnostic task failed: {}", e);
                    DiagnosticStep::ALL
                        .iter()
                        .map(|step| DiagnosticResult::error(*step, detail.clone()))
                        .collect()
                }),
            ),
            else => std::future::pending().await,
        }
    }

    /// Apply a completed operation to the dashboard and print it.
    pub fn apply(&mut self, dashboard: &mut Dashboard, finished: Finished) {
        match finished {
            Finished::Analysis(outcome) => {
                dashboard.finish_analysis(&outcome);
                match outcome {
                    Ok(result) => {
                        println!("{}", analyze::render(&result));
                        self.start_post(result);
                    }
                    Err(e) => {
                        self.analysis_config = None;
                        println!("❌ {}", e);
                    }
                }
            }
            Finished::Post(outcome) => {
                dashboard.record_post(&outcome);
                match outcome {
                    PostOutcome::Skipped => {}
                    PostOutcome::Delivered => println!("📨 Market pulse posted"),
                    PostOutcome::Rejected => println!("⚠️  Gateway rejected the market pulse"),
                    PostOutcome::Failed(e) => println!("❌ Post failed: {}", e),
                }
            }
            Finished::Diagnostics(results) => {
                println!("{}", diagnose::render(dashboard.finish_diagnostics(results)));
            }
        }
    }
}

fn print_entry(entry: &LogEntry) {
    println!(
        "{} [{:?}] {}",
        entry.timestamp.format("%H:%M:%S"),
        entry.level,
        entry.message
    );
}

fn print_help() {
    println!("Keys: [a]nalyze  [d]iagnose  [s]tatus  [l]og  [q]uit");
}

pub async fn run(ctx: &AppContext) -> Result<()> {
    let gateway = ctx.active_gateway()?;
    let relay = ctx.relay_client()?;

    let requester = match GeminiClient::from_config(&ctx.config) {
        Ok(model) => Some(
            AnalysisRequester::new(model, relay.clone()).with_window(ctx.config.analysis_window),
        ),
        Err(e) => {
            warn!(error = %e, "Analysis disabled");
            None
        }
    };
    let mut background = Background::new(requester, DiagnosticRunner::new(relay.clone()));

    let poller = FeedPoller::new(relay, ctx.config.poll_interval());
    let mut dashboard = Dashboard::new(poller).with_history_file(ctx.store.history_path());
    let mut feed = dashboard.subscribe();
    dashboard.connect(gateway.clone())?;

    print_help();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            changed = feed.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = feed.borrow_and_update().clone();
                if dashboard.sync_feed(snapshot) {
                    println!("{}", dashboard.status_line());
                }
            }
            finished = background.next() => background.apply(&mut dashboard, finished),
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let started = match WatchKey::parse(&line) {
                    Some(WatchKey::Analyze) => background
                        .start_analysis(&mut dashboard)
                        .map(|()| "🧠 Analysis started"),
                    Some(WatchKey::Diagnose) => background
                        .start_diagnostics(&mut dashboard, gateway.clone())
                        .map(|()| "🔎 Diagnostics started"),
                    Some(WatchKey::Status) => {
                        println!("{}", dashboard.status_line());
                        continue;
                    }
                    Some(WatchKey::Log) => {
                        dashboard.log().tail(10).for_each(print_entry);
                        continue;
                    }
                    Some(WatchKey::Quit) => break,
                    None if line.trim().is_empty() => continue,
                    None => {
                        print_help();
                        continue;
                    }
                };
                match started {
                    Ok(notice) => println!("{}", notice),
                    Err(e) => println!("❌ {}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    dashboard.disconnect();
    println!("👋 Watch stopped");
    Ok(())
}
