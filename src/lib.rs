//! Market Sentinel Library
//!
//! This library provides tools to:
//! - Read a chat channel through an HTTP relay and keep a live message window
//! - Diagnose relay reachability, cross-origin acceptance and access policy
//! - Score market sentiment of the window with a language model
//! - Post the resulting "market pulse" back to the channel
//! - Run the relay server itself

pub mod activity_log;
pub mod analysis;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod gateway;
pub mod integrations;
pub mod metrics;
pub mod models;
pub mod poller;
pub mod prompts;
pub mod relay;
pub mod store;

// Re-export common types
pub use activity_log::ActivityLog;
pub use analysis::{AnalysisHistory, AnalysisRequester, LanguageModel, PostOutcome};
pub use config::Config;
pub use dashboard::Dashboard;
pub use error::{Error, ErrorKind, Result};
pub use gateway::{DiagnosticRunner, GatewayConfig, RelayClient};
pub use integrations::GeminiClient;
pub use models::{AnalysisResult, ChatMessage, DiagnosticResult, DiagnosticStatus, DiagnosticStep};
pub use poller::{FeedPoller, FeedSnapshot};
pub use prompts::Prompt;
pub use store::SettingsStore;

// Commands module uses re-exported types, so it must be declared after the re-exports
pub mod commands;
