//! Command implementations
//!
//! Each module corresponds to a subcommand of the `market_sentinel` CLI.

use std::path::PathBuf;

use anyhow::{anyhow, Context};

use crate::config::Config;
use crate::gateway::{GatewayConfig, RelayClient};
use crate::store::SettingsStore;

pub mod analyze;
pub mod diagnose;
pub mod fetch;
pub mod history;
pub mod relay;
pub mod settings;
pub mod watch;

pub use diagnose::DiagnoseArgs;
pub use settings::SettingsEdit;

/// Configuration and storage shared by every command.
#[derive(Debug, Clone)]
pub struct AppContext {
    pub config: Config,
    pub store: SettingsStore,
}

impl AppContext {
    /// Load `Config`; `storage_dir` overrides the configured directory.
    pub fn new(storage_dir: Option<PathBuf>) -> Self {
        let mut config = Config::new();
        if let Some(dir) = storage_dir {
            config.storage_dir = dir;
        }
        let store = SettingsStore::from_config(&config);
        Self { config, store }
    }

    /// The committed gateway configuration.
    pub fn active_gateway(&self) -> anyhow::Result<GatewayConfig> {
        self.store.load_committed().ok_or_else(|| {
            anyhow!("No gateway configured. Run `settings edit` and `settings commit` first.")
        })
    }

    pub fn relay_client(&self) -> anyhow::Result<RelayClient> {
        RelayClient::from_config(&self.config).context("Failed to build relay client")
    }
}

/// Error text with a remediation hint when one is known.
pub(crate) fn describe(err: &crate::Error) -> String {
    match err.hint() {
        Some(hint) => format!("{}\n   Hint: {}", err, hint),
        None => err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn describe_appends_hint_for_auth_errors() {
        let text = describe(&crate::Error::NotFound);
        assert!(text.starts_with("Not Found: Incorrect Channel ID."));
        assert!(text.contains("Hint: Double-check the channel ID."));
        assert_eq!(
            describe(&crate::Error::Llm("boom".into())),
            "LLM error: boom"
        );
    }

    #[test]
    fn active_gateway_requires_committed_settings() {
        let dir = TempDir::new().unwrap();
        let ctx = AppContext::new(Some(dir.path().to_path_buf()));
        assert_eq!(ctx.store.dir(), dir.path());

        let err = ctx.active_gateway().unwrap_err();
        assert!(err.to_string().contains("No gateway configured"));
    }
}
