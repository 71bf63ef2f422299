//! Staged reachability diagnosis for a candidate relay.
//!
//! Four stages, always reported in order:
//! 1. URL validation (no I/O)
//! 2. Connectivity: one `GET /health` on the relay origin
//! 3. Cross-origin & header acceptance, read from the stage 2 response
//! 4. Access policy, read from the same response
//!
//! A 403 on the probe cannot be attributed to CORS or to the access policy
//! from a single request, so both stages report it as a candidate cause.

use reqwest::header::ORIGIN;
use tracing::{info, warn};

use crate::gateway::client::RelayClient;
use crate::gateway::settings::{AccessCredentials, GatewayConfig};
use crate::gateway::url::{has_http_scheme, health_url};
use crate::metrics;
use crate::models::{DiagnosticResult, DiagnosticStep};

pub const SKIPPED_INVALID_URL: &str = "skipped: invalid URL";

/// Runs the probe sequence. Holds no state between runs.
#[derive(Debug, Clone)]
pub struct DiagnosticRunner {
    relay: RelayClient,
}

impl DiagnosticRunner {
    pub fn new(relay: RelayClient) -> Self {
        Self { relay }
    }

    /// Diagnose the relay described by a gateway config.
    pub async fn run_for(&self, config: &GatewayConfig) -> Vec<DiagnosticResult> {
        match config.access_credentials() {
            Ok(access) => self.run(&config.relay_url, access.as_ref()).await,
            Err(e) => {
                let results = rejected_input(&e.to_string());
                metrics::record_diagnostic_run(outcome(&results));
                results
            }
        }
    }

    /// Probe `relay_url`. Always returns four entries; at most one request.
    pub async fn run(
        &self,
        relay_url: &str,
        access: Option<&AccessCredentials>,
    ) -> Vec<DiagnosticResult> {
        let results = self.probe(relay_url, access).await;
        for r in &results {
            info!(step = r.step.label(), status = ?r.status, details = %r.details, "Diagnostic stage");
        }
        metrics::record_diagnostic_run(outcome(&results));
        results
    }

    async fn probe(
        &self,
        relay_url: &str,
        access: Option<&AccessCredentials>,
    ) -> Vec<DiagnosticResult> {
        let relay_url = relay_url.trim();
        if !has_http_scheme(relay_url) {
            return rejected_input("URL must start with http:// or https://");
        }
        let validated = DiagnosticResult::success(
            DiagnosticStep::UrlValidation,
            format!("Valid URL: {}", relay_url),
        );

        let url = match health_url(relay_url) {
            Ok(url) => url,
            Err(e) => return with_first(validated, unreachable_stages(&e.to_string())),
        };

        let mut request = self
            .relay
            .http()
            .get(url.clone())
            .header(ORIGIN, self.relay.origin());
        if let Some(credentials) = access {
            request = credentials.apply(request);
        }

        match self.relay.exchange(request).await {
            Ok((status, _)) => with_first(
                validated,
                evaluate_response(status.as_u16(), url.as_str(), self.relay.origin()),
            ),
            Err(e) => {
                warn!(url = %url, error = %e, "Relay health probe failed");
                with_first(validated, unreachable_stages(&e.to_string()))
            }
        }
    }
}

fn with_first(first: DiagnosticResult, rest: [DiagnosticResult; 3]) -> Vec<DiagnosticResult> {
    let mut results = Vec::with_capacity(4);
    results.push(first);
    results.extend(rest);
    results
}

/// Stage 1 failed: nothing else is attempted, later stages are marked error.
fn rejected_input(message: &str) -> Vec<DiagnosticResult> {
    with_first(
        DiagnosticResult::error(DiagnosticStep::UrlValidation, message),
        [
            DiagnosticResult::error(DiagnosticStep::Connectivity, SKIPPED_INVALID_URL),
            DiagnosticResult::error(DiagnosticStep::CorsHeaders, SKIPPED_INVALID_URL),
            DiagnosticResult::error(DiagnosticStep::AccessPolicy, SKIPPED_INVALID_URL),
        ],
    )
}

/// Stages 2-4 when the probe raised a transport error.
fn unreachable_stages(detail: &str) -> [DiagnosticResult; 3] {
    [
        DiagnosticResult::error(
            DiagnosticStep::Connectivity,
            format!("Host unreachable / DNS or connection failure: {}", detail),
        ),
        DiagnosticResult::error(DiagnosticStep::CorsHeaders, "Blocked before reaching server"),
        DiagnosticResult::error(DiagnosticStep::AccessPolicy, "Not evaluated"),
    ]
}

/// Stages 2-4 from the status of the single health response.
pub fn evaluate_response(status: u16, probed: &str, origin: &str) -> [DiagnosticResult; 3] {
    let ok = (200..300).contains(&status);
    let connectivity = DiagnosticResult::success(
        DiagnosticStep::Connectivity,
        format!("HTTP {} from {}", status, probed),
    );

    let cors = if ok {
        DiagnosticResult::success(
            DiagnosticStep::CorsHeaders,
            format!("Relay accepted cross-origin request from {}", origin),
        )
    } else if status == 403 {
        DiagnosticResult::error(
            DiagnosticStep::CorsHeaders,
            "HTTP 403: Authorization, Content-Type and CF-Access-Client-* headers are likely \
             not allow-listed by the relay's CORS policy, or this origin is not allowed",
        )
    } else {
        DiagnosticResult::error(
            DiagnosticStep::CorsHeaders,
            format!("Unexpected status HTTP {}", status),
        )
    };

    let access = if ok {
        DiagnosticResult::success(DiagnosticStep::AccessPolicy, "Access policy passed")
    } else if status == 403 {
        DiagnosticResult::error(
            DiagnosticStep::AccessPolicy,
            "HTTP 403: an access policy layer in front of the relay rejected the request; \
             check the access client id and secret",
        )
    } else {
        DiagnosticResult::error(
            DiagnosticStep::AccessPolicy,
            format!("Unexpected status HTTP {}", status),
        )
    };

    [connectivity, cors, access]
}

fn outcome(results: &[DiagnosticResult]) -> &'static str {
    if DiagnosticResult::all_passed(results) {
        "passed"
    } else {
        "failed"
    }
}
