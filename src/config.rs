//! Runtime configuration for the sentinel
//!
//! Loads configuration from config.yml file, with `.env` and environment
//! variable overrides.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Default constants (fallback if config.yml not found)
pub const DEFAULT_RELAY_URL: &str = "http://localhost:3001/api/discord";
pub const FETCH_TIMEOUT_SECS: u64 = 12;
pub const POLL_INTERVAL_SECS: u64 = 30;
pub const ANALYSIS_WINDOW: usize = 50;
pub const DEFAULT_MODEL: &str = "gemini-2.5-pro";
pub const DEFAULT_ORIGIN: &str = "http://localhost:3000";
pub const STORAGE_DIR: &str = ".market_sentinel";
pub const RELAY_LISTEN: &str = "0.0.0.0:3001";
pub const UPSTREAM_API: &str = "https://discord.com/api/v10";
pub const ALLOWED_ORIGIN_SUFFIX: &str = ".scf.usercontent.goog";

/// YAML config structures
#[derive(Debug, Default, Deserialize)]
struct YamlConfig {
    relay: Option<RelaySection>,
    poller: Option<PollerSection>,
    analysis: Option<AnalysisSection>,
    dashboard: Option<DashboardSection>,
    storage: Option<StorageSection>,
    server: Option<ServerSection>,
}

#[derive(Debug, Default, Deserialize)]
struct RelaySection {
    default_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct PollerSection {
    interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct AnalysisSection {
    window: Option<usize>,
    model: Option<String>,
    temperature: Option<f32>,
    max_output_tokens: Option<u32>,
    thinking_budget: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct DashboardSection {
    origin: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StorageSection {
    dir: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerSection {
    listen: Option<String>,
    upstream: Option<String>,
    allowed_origin_suffixes: Option<Vec<String>>,
    access_id: Option<String>,
    access_secret: Option<String>,
}

/// Main configuration struct
#[derive(Debug, Clone)]
pub struct Config {
    pub default_relay_url: String,
    pub fetch_timeout_secs: u64,
    pub poll_interval_secs: u64,
    pub analysis_window: usize,
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub thinking_budget: u32,
    pub dashboard_origin: String,
    pub storage_dir: PathBuf,
    pub server: ServerConfig,
}

/// Relay server settings (the `relay` subcommand and `sentinel_relay` binary).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen: String,
    pub upstream: String,
    pub allowed_origin_suffixes: Vec<String>,
    pub access_id: Option<String>,
    pub access_secret: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: RELAY_LISTEN.to_string(),
            upstream: UPSTREAM_API.to_string(),
            allowed_origin_suffixes: vec![ALLOWED_ORIGIN_SUFFIX.to_string()],
            access_id: None,
            access_secret: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Load configuration from config.yml or use defaults
    /// Environment variables take precedence over config.yml values
    pub fn new() -> Self {
        Self::load_from_file("config.yml")
            .or_else(|_| Self::load_from_file("../config.yml"))
            .unwrap_or_else(|_| {
                Self::load_dotenv();
                Self::from_yaml(YamlConfig::default())
            })
    }

    /// Resolve a value: prefer env var if config value looks like ${VAR}
    fn resolve_env_string(value: Option<String>, env_key: &str) -> Option<String> {
        if let Some(ref v) = value {
            if v.starts_with("${") && v.ends_with('}') {
                let var_name = &v[2..v.len() - 1];
                return std::env::var(var_name)
                    .ok()
                    .or_else(|| std::env::var(env_key).ok())
                    .filter(|s| !s.is_empty());
            }
        }
        if let Ok(env_val) = std::env::var(env_key) {
            if !env_val.is_empty() {
                return Some(env_val);
            }
        }
        value.filter(|s| !s.is_empty())
    }

    /// Resolve a numeric value: explicit YAML numbers win, otherwise env var
    fn resolve_env_parsed<T: FromStr>(value: Option<T>, env_key: &str, default: T) -> T {
        if let Some(v) = value {
            return v;
        }
        std::env::var(env_key)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(default)
    }

    /// Load .env file into environment variables using dotenvy
    fn load_dotenv() {
        if dotenvy::dotenv().is_err() {
            let _ = dotenvy::from_filename("../.env");
        }
    }

    /// Load configuration from a specific file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        Self::load_dotenv();

        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let yaml: YamlConfig = serde_yaml::from_str(&content)
            .map_err(|e| format!("Failed to parse config file: {}", e))?;

        Ok(Self::from_yaml(yaml))
    }

    fn from_yaml(yaml: YamlConfig) -> Self {
        let relay = yaml.relay.unwrap_or_default();
        let poller = yaml.poller.unwrap_or_default();
        let analysis = yaml.analysis.unwrap_or_default();
        let dashboard = yaml.dashboard.unwrap_or_default();
        let storage = yaml.storage.unwrap_or_default();
        let server = yaml.server.unwrap_or_default();

        let server = ServerConfig {
            listen: Self::resolve_env_string(server.listen, "RELAY_LISTEN")
                .unwrap_or_else(|| RELAY_LISTEN.to_string()),
            upstream: Self::resolve_env_string(server.upstream, "RELAY_UPSTREAM")
                .unwrap_or_else(|| UPSTREAM_API.to_string()),
            allowed_origin_suffixes: server
                .allowed_origin_suffixes
                .unwrap_or_else(|| vec![ALLOWED_ORIGIN_SUFFIX.to_string()]),
            access_id: Self::resolve_env_string(server.access_id, "RELAY_ACCESS_ID"),
            access_secret: Self::resolve_env_string(server.access_secret, "RELAY_ACCESS_SECRET"),
        };

        Self {
            default_relay_url: Self::resolve_env_string(relay.default_url, "RELAY_URL")
                .unwrap_or_else(|| DEFAULT_RELAY_URL.to_string()),
            fetch_timeout_secs: Self::resolve_env_parsed(
                relay.timeout_secs,
                "FETCH_TIMEOUT",
                FETCH_TIMEOUT_SECS,
            ),
            poll_interval_secs: Self::resolve_env_parsed(
                poller.interval_secs,
                "POLL_INTERVAL",
                POLL_INTERVAL_SECS,
            ),
            analysis_window: analysis.window.unwrap_or(ANALYSIS_WINDOW),
            model: Self::resolve_env_string(analysis.model, "GEMINI_MODEL")
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature: analysis.temperature.unwrap_or(0.4),
            max_output_tokens: analysis.max_output_tokens.unwrap_or(4000),
            thinking_budget: analysis.thinking_budget.unwrap_or(2000),
            dashboard_origin: Self::resolve_env_string(dashboard.origin, "DASHBOARD_ORIGIN")
                .unwrap_or_else(|| DEFAULT_ORIGIN.to_string()),
            storage_dir: PathBuf::from(
                Self::resolve_env_string(storage.dir, "SENTINEL_STORAGE_DIR")
                    .unwrap_or_else(|| STORAGE_DIR.to_string()),
            ),
            server,
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}
