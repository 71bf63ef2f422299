//! Relay HTTP server: health check plus a pass-through proxy for channel
//! messages, with CORS and an optional access-policy gate in front.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Incoming;
use hyper::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE, ORIGIN};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use reqwest::Url;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::gateway::client::FETCH_LIMIT;
use crate::gateway::settings::{AccessCredentials, ACCESS_ID_HEADER, ACCESS_SECRET_HEADER};
use crate::gateway::url::{API_PATH, HEALTH_PATH};
use crate::metrics;
use crate::relay::cors::{CorsPolicy, OriginDecision};
use crate::{Error, Result};

const MAX_BODY_BYTES: usize = 64 * 1024;
const UPSTREAM_TIMEOUT_SECS: u64 = 30;
/// Platform cap on messages per page.
const MAX_LIMIT: u32 = 100;

type RelayResponse = Response<Full<Bytes>>;

/// Shared, read-only server state.
#[derive(Debug)]
pub struct RelayState {
    upstream: String,
    cors: CorsPolicy,
    access: Option<AccessCredentials>,
    http: reqwest::Client,
    port: u16,
}

impl RelayState {
    pub fn new(config: &ServerConfig) -> Result<Self> {
        let access = AccessCredentials::from_parts(
            config.access_id.as_deref(),
            config.access_secret.as_deref(),
        )?;
        let http = reqwest::Client::builder()
            .user_agent("market_sentinel-relay/0.1.0")
            .timeout(Duration::from_secs(UPSTREAM_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::InvalidInput(format!("HTTP client error: {}", e)))?;

        Ok(Self {
            upstream: config.upstream.trim_end_matches('/').to_string(),
            cors: CorsPolicy::new(config.allowed_origin_suffixes.clone()),
            access,
            http,
            port: 0,
        })
    }

    pub fn upstream(&self) -> &str {
        &self.upstream
    }

    pub fn has_access_policy(&self) -> bool {
        self.access.is_some()
    }
}

/// Accept connections on `listener` forever.
pub async fn serve(listener: TcpListener, mut state: RelayState) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    state.port = addr.port();
    let state = Arc::new(state);
    info!(
        %addr,
        upstream = %state.upstream,
        access_policy = state.has_access_policy(),
        "Relay server started"
    );

    loop {
        let (stream, peer) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let state = Arc::clone(&state);

        tokio::spawn(async move {
            let service = service_fn(move |req| handle(req, Arc::clone(&state)));
            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                warn!(?peer, "Relay connection error: {}", err);
            }
        });
    }
}

/// Bind `config.listen` and serve until Ctrl-C.
pub async fn run(config: &ServerConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = config.listen.parse()?;
    let listener = TcpListener::bind(addr).await?;
    let state = RelayState::new(config)?;

    tokio::select! {
        result = serve(listener, state) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Relay server shutting down");
            Ok(())
        }
    }
}

async fn handle(req: Request<Incoming>, state: Arc<RelayState>) -> std::result::Result<RelayResponse, Infallible> {
    let origin = req
        .headers()
        .get(ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let decision = state.cors.evaluate(origin.as_deref());
    if let OriginDecision::Denied(origin) = &decision {
        warn!(%origin, "Rejected cross-origin request");
        return Ok(json_response(
            StatusCode::FORBIDDEN,
            &json!({ "error": "Not allowed by CORS" }),
        ));
    }

    let preflight = req.method() == Method::OPTIONS;
    let mut response = if preflight {
        empty_response(StatusCode::NO_CONTENT)
    } else if !access_granted(&state, &req) {
        warn!(path = %req.uri().path(), "Access policy rejected request");
        json_response(StatusCode::FORBIDDEN, &json!({ "error": "Access denied" }))
    } else {
        route(req, &state).await
    };

    state.cors.apply(response.headers_mut(), &decision, preflight);
    Ok(response)
}

fn access_granted(state: &RelayState, req: &Request<Incoming>) -> bool {
    let Some(expected) = &state.access else {
        return true;
    };
    let header = |name: &str| req.headers().get(name).and_then(|v| v.to_str().ok());
    header(ACCESS_ID_HEADER) == Some(expected.client_id.as_str())
        && header(ACCESS_SECRET_HEADER) == Some(expected.client_secret.as_str())
}

async fn route(req: Request<Incoming>, state: &RelayState) -> RelayResponse {
    let path = req.uri().path().to_string();
    match (req.method().clone(), path.as_str()) {
        (Method::GET, HEALTH_PATH) => json_response(
            StatusCode::OK,
            &json!({
                "status": "ok",
                "port": state.port,
                "handshake": "verified",
                "timestamp": Utc::now().to_rfc3339(),
            }),
        ),
        (method @ (Method::GET | Method::POST), path) => match channel_id(path) {
            Some(channel) => {
                let channel = channel.to_string();
                proxy(req, method, &channel, state).await
            }
            None => not_found(),
        },
        _ => not_found(),
    }
}

/// `{API_PATH}/channels/{id}/messages` → `id`.
fn channel_id(path: &str) -> Option<&str> {
    let id = path
        .strip_prefix(API_PATH)?
        .strip_prefix("/channels/")?
        .strip_suffix("/messages")?;
    (!id.is_empty() && !id.contains('/')).then_some(id)
}

/// `limit` query parameter, clamped to the platform range.
fn query_limit(query: Option<&str>) -> u32 {
    query
        .and_then(|q| Url::parse(&format!("http://relay.local/?{}", q)).ok())
        .and_then(|url| {
            url.query_pairs()
                .find(|(key, _)| key == "limit")
                .map(|(_, value)| value.into_owned())
        })
        .and_then(|value| value.trim().parse::<u32>().ok())
        .map(|limit| limit.clamp(1, MAX_LIMIT))
        .unwrap_or(FETCH_LIMIT as u32)
}

async fn proxy(req: Request<Incoming>, method: Method, channel: &str, state: &RelayState) -> RelayResponse {
    let Some(auth) = req.headers().get(AUTHORIZATION).cloned() else {
        metrics::record_relay_request("proxy", "unauthorized");
        return json_response(
            StatusCode::UNAUTHORIZED,
            &json!({ "error": "Missing Authorization header" }),
        );
    };

    let url = format!("{}/channels/{}/messages", state.upstream, channel);
    info!(method = %method, channel = %channel, "Proxying to upstream");

    let upstream = if method == Method::GET {
        let limit = query_limit(req.uri().query());
        state
            .http
            .get(&url)
            .query(&[("limit", limit)])
            .header(AUTHORIZATION, auth)
    } else {
        let body = match Limited::new(req.into_body(), MAX_BODY_BYTES).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                debug!(error = %e, "Unreadable request body");
                return json_response(
                    StatusCode::BAD_REQUEST,
                    &json!({ "error": "Invalid request body" }),
                );
            }
        };
        if !body.is_empty() && serde_json::from_slice::<Value>(&body).is_err() {
            return json_response(StatusCode::BAD_REQUEST, &json!({ "error": "Invalid JSON body" }));
        }
        state
            .http
            .post(&url)
            .header(AUTHORIZATION, auth)
            .body(body)
    };

    let result = async {
        let response = upstream
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await?;
        let status = response.status();
        let body = response.bytes().await?;
        Ok::<_, reqwest::Error>((status, body))
    }
    .await;

    match result {
        Ok((status, body)) => {
            let parsed = serde_json::from_slice::<Value>(&body);
            match (status.is_success(), parsed) {
                (_, Ok(value)) => {
                    metrics::record_relay_request(
                        "proxy",
                        if status.is_success() { "ok" } else { "upstream_error" },
                    );
                    json_response(status, &value)
                }
                (false, Err(_)) => {
                    metrics::record_relay_request("proxy", "upstream_error");
                    json_response(status, &json!({}))
                }
                (true, Err(e)) => {
                    error!(channel = %channel, error = %e, "Upstream returned non-JSON body");
                    metrics::record_relay_request("proxy", "error");
                    internal_error()
                }
            }
        }
        Err(e) => {
            error!(channel = %channel, error = %e, "Proxy upstream request failed");
            metrics::record_relay_request("proxy", "error");
            internal_error()
        }
    }
}

fn json_response(status: StatusCode, body: &Value) -> RelayResponse {
    let mut response = Response::new(Full::from(body.to_string()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

fn empty_response(status: StatusCode) -> RelayResponse {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}

fn not_found() -> RelayResponse {
    json_response(StatusCode::NOT_FOUND, &json!({ "error": "Not Found" }))
}

fn internal_error() -> RelayResponse {
    json_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        &json!({ "error": "Internal Proxy Error" }),
    )
}
