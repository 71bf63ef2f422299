//! `diagnose` subcommand: staged relay reachability check.

use anyhow::{bail, Result};

use crate::commands::AppContext;
use crate::gateway::{DiagnosticRunner, GatewayConfig};
use crate::models::{DiagnosticResult, DiagnosticStatus};

/// Overrides for the probe target; unset fields come from the stored
/// configuration (draft first, then committed).
#[derive(Debug, Clone, Default)]
pub struct DiagnoseArgs {
    pub url: Option<String>,
    pub access_id: Option<String>,
    pub access_secret: Option<String>,
}

pub fn resolve_target(ctx: &AppContext, args: &DiagnoseArgs) -> GatewayConfig {
    let mut target = ctx
        .store
        .load_draft()
        .or_else(|| ctx.store.load_committed())
        .unwrap_or_default();
    if let Some(url) = &args.url {
        target.relay_url = url.clone();
    }
    if args.access_id.is_some() || args.access_secret.is_some() {
        target.access_id = args.access_id.clone();
        target.access_secret = args.access_secret.clone();
    }
    if target.relay_url.trim().is_empty() {
        target.relay_url = ctx.config.default_relay_url.clone();
    }
    target
}

fn icon(status: DiagnosticStatus) -> &'static str {
    match status {
        DiagnosticStatus::Pending => "⏳",
        DiagnosticStatus::Success => "✅",
        DiagnosticStatus::Error => "❌",
    }
}

pub fn render(results: &[DiagnosticResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, r)| format!("{} {}. {:<16} {}", icon(r.status), i + 1, r.step.label(), r.details))
        .collect::<Vec<_>>()
        .join("\n")
}

pub async fn run(ctx: &AppContext, args: &DiagnoseArgs) -> Result<()> {
    let target = resolve_target(ctx, args);
    println!("🔍 Diagnosing relay {}\n", target.relay_url);

    let runner = DiagnosticRunner::new(ctx.relay_client()?);
    let results = runner.run_for(&target).await;
    println!("{}", render(&results));

    if DiagnosticResult::all_passed(&results) {
        println!("\n✅ Relay is reachable and accepts this dashboard");
        Ok(())
    } else {
        let failed = results
            .iter()
            .filter(|r| r.status == DiagnosticStatus::Error)
            .count();
        bail!("{} of {} diagnostic stages failed", failed, results.len())
    }
}
