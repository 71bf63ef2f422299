//! Prometheus metrics for Market Sentinel.
//!
//! Exposes:
//! - `market_sentinel_command_duration_seconds` (histogram)
//! - `market_sentinel_command_total` (counter with status)
//! - `market_sentinel_command_inflight` (gauge)
//! - `market_sentinel_relay_requests_total` (counter by operation and outcome)
//! - `market_sentinel_diagnostic_runs_total` (counter by outcome)
//! - `market_sentinel_analysis_duration_seconds` (histogram by status)
//! - process metrics via `process` collector

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use once_cell::sync::Lazy;
use prometheus::process_collector::ProcessCollector;
use prometheus::{
    default_registry, register_histogram_vec, register_int_counter_vec, register_int_gauge_vec,
    Encoder, HistogramVec, IntCounterVec, IntGaugeVec, TextEncoder,
};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

static PROCESS_COLLECTOR: Lazy<()> = Lazy::new(|| {
    if let Err(err) = default_registry().register(Box::new(ProcessCollector::for_self())) {
        warn!("Failed to register process collector: {}", err);
    }
});

static COMMAND_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    // 50ms .. ~7 minutes; `watch` runs long.
    let buckets =
        prometheus::exponential_buckets(0.05, 2.0, 14).expect("failed to create histogram buckets");
    register_histogram_vec!(
        "market_sentinel_command_duration_seconds",
        "CLI command duration in seconds",
        &["command"],
        buckets
    )
    .expect("failed to register command duration histogram")
});

static COMMAND_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "market_sentinel_command_total",
        "Total command executions by status",
        &["command", "status"]
    )
    .expect("failed to register command counter")
});

static COMMAND_INFLIGHT: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "market_sentinel_command_inflight",
        "Number of in-flight commands",
        &["command"]
    )
    .expect("failed to register inflight gauge")
});

static RELAY_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "market_sentinel_relay_requests_total",
        "Relay requests by operation and outcome",
        &["operation", "outcome"]
    )
    .expect("failed to register relay request counter")
});

static DIAGNOSTIC_RUNS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "market_sentinel_diagnostic_runs_total",
        "Diagnostic runs by outcome",
        &["outcome"]
    )
    .expect("failed to register diagnostic counter")
});

static ANALYSIS_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    let buckets =
        prometheus::exponential_buckets(0.25, 2.0, 10).expect("failed to create histogram buckets");
    register_histogram_vec!(
        "market_sentinel_analysis_duration_seconds",
        "Language model analysis latency in seconds",
        &["status"],
        buckets
    )
    .expect("failed to register analysis histogram")
});

fn init_collectors() {
    Lazy::force(&PROCESS_COLLECTOR);
    Lazy::force(&COMMAND_DURATION);
    Lazy::force(&COMMAND_TOTAL);
    Lazy::force(&COMMAND_INFLIGHT);
    Lazy::force(&RELAY_REQUESTS);
    Lazy::force(&DIAGNOSTIC_RUNS);
    Lazy::force(&ANALYSIS_DURATION);
}

fn status_label(success: bool) -> &'static str {
    if success {
        "ok"
    } else {
        "error"
    }
}

pub fn record_command_start(command: &'static str) {
    init_collectors();
    COMMAND_INFLIGHT.with_label_values(&[command]).inc();
}

/// Record command completion with duration and status.
pub fn record_command_result(command: &'static str, duration: Duration, success: bool) {
    init_collectors();
    COMMAND_INFLIGHT.with_label_values(&[command]).dec();
    COMMAND_DURATION
        .with_label_values(&[command])
        .observe(duration.as_secs_f64());
    COMMAND_TOTAL
        .with_label_values(&[command, status_label(success)])
        .inc();
}

/// `operation` is `fetch`, `post` or `proxy`; `outcome` is `ok` or an error kind.
pub fn record_relay_request(operation: &'static str, outcome: &str) {
    init_collectors();
    RELAY_REQUESTS.with_label_values(&[operation, outcome]).inc();
}

pub fn record_diagnostic_run(outcome: &'static str) {
    init_collectors();
    DIAGNOSTIC_RUNS.with_label_values(&[outcome]).inc();
}

pub fn observe_analysis(duration: Duration, success: bool) {
    init_collectors();
    ANALYSIS_DURATION
        .with_label_values(&[status_label(success)])
        .observe(duration.as_secs_f64());
}

async fn metrics_response() -> Result<Response<Full<Bytes>>, Infallible> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", err);
        let mut response = Response::new(Full::from("encode error"));
        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        return Ok(response);
    }

    let mut response = Response::new(Full::from(buffer));
    if let Ok(value) = hyper::header::HeaderValue::from_str(encoder.format_type()) {
        response
            .headers_mut()
            .insert(hyper::header::CONTENT_TYPE, value);
    }
    Ok(response)
}

async fn handle_request(req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    match req.uri().path() {
        "/metrics" => metrics_response().await,
        _ => {
            let mut response = Response::new(Full::new(Bytes::new()));
            *response.status_mut() = StatusCode::NOT_FOUND;
            Ok(response)
        }
    }
}

async fn serve(addr: SocketAddr) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Prometheus metrics endpoint started");

    loop {
        let (stream, peer) = listener.accept().await?;
        let service = service_fn(handle_request);
        let io = TokioIo::new(stream);

        tokio::spawn(async move {
            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                warn!(?peer, "Metrics connection error: {}", err);
            }
        });
    }
}

/// Spawn the metrics HTTP endpoint on the given address.
pub fn spawn_metrics_server(addr: SocketAddr) {
    init_collectors();
    tokio::spawn(async move {
        if let Err(err) = serve(addr).await {
            error!(%addr, "Metrics server failed: {}", err);
        }
    });
}
