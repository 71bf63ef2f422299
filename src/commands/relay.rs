//! `relay` subcommand: run the relay server in the foreground.

use anyhow::Result;

use crate::commands::AppContext;
use crate::config::ServerConfig;

pub fn server_config(ctx: &AppContext, listen: Option<String>, upstream: Option<String>) -> ServerConfig {
    let mut server = ctx.config.server.clone();
    if let Some(listen) = listen {
        server.listen = listen;
    }
    if let Some(upstream) = upstream {
        server.upstream = upstream;
    }
    server
}

pub async fn run(ctx: &AppContext, listen: Option<String>, upstream: Option<String>) -> Result<()> {
    let server = server_config(ctx, listen, upstream);
    println!("🚀 Relay listening on {} → {}", server.listen, server.upstream);
    println!("   Health check: http://{}/health", server.listen);
    crate::relay::run(&server).await
}
