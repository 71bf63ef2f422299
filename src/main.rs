//! Market Sentinel CLI - main entry point

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use market_sentinel::commands::{self, AppContext, DiagnoseArgs, SettingsEdit};
use market_sentinel::metrics;
use tracing::warn;

#[derive(Parser)]
#[command(name = "market_sentinel")]
#[command(about = "Chat sentiment sentinel with relay diagnostics", long_about = None)]
#[command(version)]
struct Cli {
    /// Address to expose Prometheus metrics (e.g., 0.0.0.0:9898)
    #[arg(long, env = "METRICS_ADDR")]
    metrics_addr: Option<String>,

    /// Directory for settings and analysis history
    #[arg(long)]
    storage_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show or edit the gateway configuration
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Probe a relay: URL, connectivity, CORS and access policy
    Diagnose {
        /// Relay URL (defaults to the stored configuration)
        #[arg(long)]
        url: Option<String>,

        /// Access policy client id
        #[arg(long, requires = "access_secret")]
        access_id: Option<String>,

        /// Access policy client secret
        #[arg(long, requires = "access_id")]
        access_secret: Option<String>,
    },

    /// Fetch the latest channel messages once
    Fetch,

    /// Analyze the latest messages and record the result
    Analyze {
        /// Do not auto-post the market pulse even if enabled
        #[arg(long, default_value_t = false)]
        no_post: bool,
    },

    /// Live session: poll the channel and react to keys
    Watch,

    /// Show recorded sentiment history
    History {
        /// Number of entries to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Run the relay server
    Relay {
        /// Listen address (e.g., 0.0.0.0:3001)
        #[arg(long)]
        listen: Option<String>,

        /// Upstream platform API base URL
        #[arg(long)]
        upstream: Option<String>,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print active configuration and draft
    Show,

    /// Change draft fields (empty string clears optional ones)
    Edit {
        #[arg(long)]
        token: Option<String>,

        #[arg(long)]
        channel: Option<String>,

        #[arg(long)]
        relay_url: Option<String>,

        #[arg(long)]
        access_id: Option<String>,

        #[arg(long)]
        access_secret: Option<String>,

        /// Post the market pulse after each analysis
        #[arg(long)]
        auto_post: Option<bool>,

        /// Channel for auto-posts (defaults to the read channel)
        #[arg(long)]
        output_channel: Option<String>,
    },

    /// Activate the draft
    Commit,

    /// Drop the draft
    Discard,

    /// Remove the active configuration
    Clear,
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Settings { .. } => "settings",
            Commands::Diagnose { .. } => "diagnose",
            Commands::Fetch => "fetch",
            Commands::Analyze { .. } => "analyze",
            Commands::Watch => "watch",
            Commands::History { .. } => "history",
            Commands::Relay { .. } => "relay",
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env for local development
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("market_sentinel=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    if let Some(addr) = cli.metrics_addr.as_deref() {
        match addr.parse::<SocketAddr>() {
            Ok(socket) => metrics::spawn_metrics_server(socket),
            Err(err) => warn!(%addr, "Invalid metrics address: {}", err),
        }
    }

    let ctx = AppContext::new(cli.storage_dir);
    let command_name = cli.command.name();
    metrics::record_command_start(command_name);
    let start = Instant::now();

    let result = execute_command(&ctx, cli.command).await;

    metrics::record_command_result(command_name, start.elapsed(), result.is_ok());

    result
}

async fn execute_command(ctx: &AppContext, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Settings { action } => match action {
            SettingsAction::Show => commands::settings::show(ctx),
            SettingsAction::Edit {
                token,
                channel,
                relay_url,
                access_id,
                access_secret,
                auto_post,
                output_channel,
            } => commands::settings::edit(
                ctx,
                &SettingsEdit {
                    bot_token: token,
                    channel_id: channel,
                    relay_url,
                    access_id,
                    access_secret,
                    auto_post,
                    output_channel_id: output_channel,
                },
            ),
            SettingsAction::Commit => commands::settings::commit(ctx),
            SettingsAction::Discard => commands::settings::discard(ctx),
            SettingsAction::Clear => commands::settings::clear(ctx),
        },
        Commands::Diagnose {
            url,
            access_id,
            access_secret,
        } => {
            commands::diagnose::run(
                ctx,
                &DiagnoseArgs {
                    url,
                    access_id,
                    access_secret,
                },
            )
            .await
        }
        Commands::Fetch => commands::fetch::run(ctx).await,
        Commands::Analyze { no_post } => commands::analyze::run(ctx, no_post).await,
        Commands::Watch => commands::watch::run(ctx).await,
        Commands::History { limit } => commands::history::run(ctx, limit),
        Commands::Relay { listen, upstream } => commands::relay::run(ctx, listen, upstream).await,
    }
}
