//! Standalone relay server
//!
//! Использование:
//!   sentinel_relay                              - слушать 0.0.0.0:3001
//!   sentinel_relay --listen 127.0.0.1:4000      - другой адрес
//!   sentinel_relay --allow-origin .example.app  - доп. суффикс для CORS
//!
//! Примеры:
//!   cargo run --bin sentinel_relay
//!   RELAY_ACCESS_ID=id RELAY_ACCESS_SECRET=secret cargo run --bin sentinel_relay

use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use market_sentinel::{metrics, relay, Config};

#[derive(Parser)]
#[command(name = "sentinel_relay")]
#[command(about = "HTTP relay in front of the chat platform API", long_about = None)]
struct Cli {
    /// Listen address
    #[arg(long)]
    listen: Option<String>,

    /// Upstream platform API base URL
    #[arg(long)]
    upstream: Option<String>,

    /// Extra allowed origin suffix (repeatable)
    #[arg(long = "allow-origin")]
    allow_origin: Vec<String>,

    /// Address to expose Prometheus metrics
    #[arg(long, env = "METRICS_ADDR")]
    metrics_addr: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
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

    let mut server = Config::new().server;
    if let Some(listen) = cli.listen {
        server.listen = listen;
    }
    if let Some(upstream) = cli.upstream {
        server.upstream = upstream;
    }
    server.allowed_origin_suffixes.extend(cli.allow_origin);

    info!(
        listen = %server.listen,
        upstream = %server.upstream,
        origins = ?server.allowed_origin_suffixes,
        "Starting relay"
    );
    relay::run(&server).await
}
