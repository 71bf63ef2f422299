//! Relay client: authenticated calls to the chat platform through the relay.

use std::error::Error as StdError;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, ORIGIN};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::config::{Config, DEFAULT_ORIGIN, FETCH_TIMEOUT_SECS};
use crate::gateway::settings::GatewayConfig;
use crate::gateway::url::messages_url;
use crate::metrics;
use crate::models::ChatMessage;
use crate::{Error, Result};

/// Messages requested per poll.
pub const FETCH_LIMIT: usize = 50;
/// Platform limit for a single message body.
pub const MAX_POST_CHARS: usize = 2000;

/// HTTP client for the relay surface.
#[derive(Debug, Clone)]
pub struct RelayClient {
    http: Client,
    timeout: Duration,
    origin: String,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    id: String,
    author: RawAuthor,
    #[serde(default)]
    content: Option<String>,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct RawAuthor {
    username: String,
    #[serde(default)]
    bot: bool,
}

impl From<RawMessage> for ChatMessage {
    fn from(raw: RawMessage) -> Self {
        ChatMessage {
            id: raw.id,
            author: raw.author.username,
            content: raw.content.unwrap_or_default(),
            timestamp: raw.timestamp,
            is_bot: raw.author.bot,
        }
    }
}

impl RelayClient {
    pub fn new(timeout: Duration, origin: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .user_agent("market_sentinel/0.1.0")
            .build()
            .map_err(|e| Error::InvalidInput(format!("HTTP client error: {}", e)))?;

        Ok(Self {
            http,
            timeout,
            origin: origin.into(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.fetch_timeout(), config.dashboard_origin.clone())
    }

    /// Client with the default 12s deadline and local dashboard origin.
    pub fn with_defaults() -> Result<Self> {
        Self::new(Duration::from_secs(FETCH_TIMEOUT_SECS), DEFAULT_ORIGIN)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    fn request(&self, method: Method, url: &str, config: &GatewayConfig) -> Result<RequestBuilder> {
        let mut request = self
            .http
            .request(method, url)
            .header(AUTHORIZATION, config.authorization())
            .header(CONTENT_TYPE, "application/json")
            .header(ORIGIN, &self.origin);

        if let Some(credentials) = config.access_credentials()? {
            request = credentials.apply(request);
        }
        Ok(request)
    }

    /// Send a request and read the body under a single deadline.
    ///
    /// Elapsing the deadline drops the in-flight request.
    pub(crate) async fn exchange(&self, request: RequestBuilder) -> Result<(StatusCode, String)> {
        let deadline = self.timeout;
        let call = async {
            let response = request
                .send()
                .await
                .map_err(|e| classify_transport(e, deadline))?;
            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| classify_transport(e, deadline))?;
            Ok::<_, Error>((status, body))
        };

        match tokio::time::timeout(deadline, call).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(deadline)),
        }
    }

    /// Fetch the latest message window in chronological order.
    pub async fn fetch_messages(&self, config: &GatewayConfig) -> Result<Vec<ChatMessage>> {
        config.validate()?;
        let url = messages_url(&config.relay_url, &config.channel_id);
        let request = self
            .request(Method::GET, &url, config)?
            .query(&[("limit", FETCH_LIMIT)]);

        debug!(%url, "Fetching channel messages");
        let result = match self.exchange(request).await {
            Ok((status, body)) if status.is_success() => parse_messages(&body),
            Ok((status, body)) => Err(status_error(status, &body)),
            Err(e) => Err(e),
        };

        metrics::record_relay_request("fetch", outcome_label(&result));
        result
    }

    /// Post `text` to the configured target channel.
    ///
    /// Platform rejections yield `Ok(false)`; only transport failures
    /// surface as errors.
    pub async fn post_message(&self, config: &GatewayConfig, text: &str) -> Result<bool> {
        config.validate()?;
        let channel = config.target_channel();
        let url = messages_url(&config.relay_url, channel);
        let content = truncate_for_platform(text);
        let request = self
            .request(Method::POST, &url, config)?
            .json(&json!({ "content": content }));

        match self.exchange(request).await {
            Ok((status, _)) if status.is_success() => {
                info!(channel = %channel, "Message posted via gateway");
                metrics::record_relay_request("post", "ok");
                Ok(true)
            }
            Ok((status, body)) => {
                warn!(
                    channel = %channel,
                    status = status.as_u16(),
                    error = %error_message(status, &body),
                    "Gateway rejected message"
                );
                metrics::record_relay_request("post", "rejected");
                Ok(false)
            }
            Err(e) => {
                warn!(channel = %channel, error = %e, "Error sending message via gateway");
                metrics::record_relay_request("post", e.kind().as_str());
                Err(e)
            }
        }
    }
}

/// Parse a newest-first platform payload into chronological order.
pub fn parse_messages(body: &str) -> Result<Vec<ChatMessage>> {
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| Error::MalformedResponse(format!("body is not JSON: {}", e)))?;
    if !value.is_array() {
        return Err(Error::MalformedResponse(
            "expected an array of messages".to_string(),
        ));
    }
    let raw: Vec<RawMessage> = serde_json::from_value(value)
        .map_err(|e| Error::MalformedResponse(format!("unexpected message shape: {}", e)))?;

    let mut messages: Vec<ChatMessage> = raw.into_iter().rev().map(ChatMessage::from).collect();
    // stable: keeps reversed order for equal timestamps
    messages.sort_by_key(|m| m.timestamp);
    Ok(messages)
}

fn status_error(status: StatusCode, body: &str) -> Error {
    match status {
        StatusCode::UNAUTHORIZED => Error::Unauthorized,
        StatusCode::FORBIDDEN => Error::Forbidden,
        StatusCode::NOT_FOUND => Error::NotFound,
        _ => Error::Http {
            status: status.as_u16(),
            message: error_message(status, body),
        },
    }
}

/// `message`/`error` field of a JSON error body, else the status reason.
fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
        })
}

/// Map a reqwest failure to `Timeout` or `Unreachable`, keeping the cause chain.
pub(crate) fn classify_transport(err: reqwest::Error, deadline: Duration) -> Error {
    if err.is_timeout() {
        return Error::Timeout(deadline);
    }
    let mut detail = err.to_string();
    let mut source = StdError::source(&err);
    while let Some(cause) = source {
        detail.push_str(": ");
        detail.push_str(&cause.to_string());
        source = cause.source();
    }
    Error::Unreachable(detail)
}

fn outcome_label<T>(result: &Result<T>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(e) => e.kind().as_str(),
    }
}

/// Cut `text` to the platform limit on a char boundary.
pub fn truncate_for_platform(text: &str) -> String {
    if text.chars().count() <= MAX_POST_CHARS {
        return text.to_string();
    }
    let mut out: String = text.chars().take(MAX_POST_CHARS - 1).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use std::time::Instant;

    fn gateway_for(server: &MockServer) -> GatewayConfig {
        GatewayConfig {
            bot_token: "tok".into(),
            channel_id: "42".into(),
            relay_url: server.base_url(),
            access_id: None,
            access_secret: None,
            auto_post: false,
            output_channel_id: None,
        }
    }

    fn payload(id: &str, ts: &str, author: &str) -> serde_json::Value {
        json!({
            "id": id,
            "author": { "username": author, "bot": false },
            "content": format!("msg {}", id),
            "timestamp": ts,
        })
    }

    fn client() -> RelayClient {
        RelayClient::with_defaults().unwrap()
    }

    #[tokio::test]
    async fn fetch_returns_chronological_order() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/discord/channels/42/messages")
                .query_param("limit", "50")
                .header("authorization", "Bot tok");
            then.status(200).json_body(json!([
                payload("3", "2025-01-01T10:03:00+00:00", "carol"),
                payload("2", "2025-01-01T10:02:00+00:00", "bob"),
                payload("1", "2025-01-01T10:01:00+00:00", "alice"),
            ]));
        });

        let messages = client().fetch_messages(&gateway_for(&server)).await.unwrap();
        mock.assert_calls(1);
        let ids: Vec<_> = messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["1", "2", "3"]);
        assert_eq!(messages[0].author, "alice");
        assert!(messages.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[tokio::test]
    async fn fetch_attaches_access_headers_and_origin() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/discord/channels/42/messages")
                .header("CF-Access-Client-Id", "cid")
                .header("CF-Access-Client-Secret", "csecret")
                .header("origin", DEFAULT_ORIGIN);
            then.status(200).json_body(json!([]));
        });

        let mut cfg = gateway_for(&server);
        cfg.access_id = Some("cid".into());
        cfg.access_secret = Some("csecret".into());

        let messages = client().fetch_messages(&cfg).await.unwrap();
        assert!(messages.is_empty());
        mock.assert_calls(1);
    }

    #[tokio::test]
    async fn fetch_rejects_half_configured_access_pair_without_io() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET).path("/api/discord/channels/42/messages");
            then.status(200).json_body(json!([]));
        });

        let mut cfg = gateway_for(&server);
        cfg.access_id = Some("cid".into());

        let err = client().fetch_messages(&cfg).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        mock.assert_calls(0);
    }

    #[tokio::test]
    async fn fetch_maps_platform_statuses() {
        for (code, expected) in [(401u16, "unauthorized"), (403, "forbidden"), (404, "not_found")] {
            let server = MockServer::start_async().await;
            server.mock(|when, then| {
                when.method(GET).path("/api/discord/channels/42/messages");
                then.status(code).json_body(json!({ "message": "nope" }));
            });

            let err = client().fetch_messages(&gateway_for(&server)).await.unwrap_err();
            assert_eq!(err.kind().as_str(), expected, "status {}", code);
        }
    }

    #[tokio::test]
    async fn fetch_propagates_other_statuses_with_body_message() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/discord/channels/42/messages");
            then.status(500).json_body(json!({ "error": "Internal Proxy Error" }));
        });

        let err = client().fetch_messages(&gateway_for(&server)).await.unwrap_err();
        match err {
            Error::Http { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "Internal Proxy Error");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn fetch_rejects_non_array_body() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/discord/channels/42/messages");
            then.status(200).json_body(json!({ "messages": [] }));
        });

        let err = client().fetch_messages(&gateway_for(&server)).await.unwrap_err();
        assert!(matches!(err, Error::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn fetch_times_out_without_blocking_other_calls() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/discord/channels/slow/messages");
            then.status(200)
                .json_body(json!([]))
                .delay(Duration::from_secs(3));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/discord/channels/42/messages");
            then.status(200).json_body(json!([]));
        });

        let relay = client().with_timeout(Duration::from_millis(300));
        let mut slow_cfg = gateway_for(&server);
        slow_cfg.channel_id = "slow".into();
        let fast_cfg = gateway_for(&server);

        let started = Instant::now();
        let (slow, fast) = tokio::join!(
            relay.fetch_messages(&slow_cfg),
            relay.fetch_messages(&fast_cfg)
        );

        assert!(matches!(slow, Err(Error::Timeout(_))));
        assert!(fast.is_ok());
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(300));
        assert!(elapsed < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn fetch_reports_unreachable_on_connection_refused() {
        let cfg = GatewayConfig {
            bot_token: "tok".into(),
            channel_id: "42".into(),
            relay_url: "http://127.0.0.1:1".into(),
            ..Default::default()
        };
        let err = client().fetch_messages(&cfg).await.unwrap_err();
        assert_eq!(err.kind().as_str(), "unreachable");
    }

    #[test]
    fn default_deadline_is_twelve_seconds() {
        assert_eq!(client().timeout(), Duration::from_secs(12));
    }

    #[tokio::test]
    async fn post_targets_output_channel() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/discord/channels/777/messages")
                .json_body(json!({ "content": "hello" }));
            then.status(200).json_body(json!({ "id": "1" }));
        });

        let mut cfg = gateway_for(&server);
        cfg.output_channel_id = Some("777".into());
        assert!(client().post_message(&cfg, "hello").await.unwrap());
        mock.assert_calls(1);
    }

    #[tokio::test]
    async fn post_returns_false_on_platform_rejection() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/api/discord/channels/42/messages");
            then.status(403).json_body(json!({ "message": "Missing Access" }));
        });

        let posted = client()
            .post_message(&gateway_for(&server), "hello")
            .await
            .unwrap();
        assert!(!posted);
    }

    #[tokio::test]
    async fn post_propagates_transport_failure() {
        let cfg = GatewayConfig {
            bot_token: "tok".into(),
            channel_id: "42".into(),
            relay_url: "http://127.0.0.1:1".into(),
            ..Default::default()
        };
        assert!(client().post_message(&cfg, "hello").await.is_err());
    }

    #[test]
    fn null_content_reads_as_empty() {
        let body = r#"[
            {"id":"2","author":{"username":"bob"},"content":null,"timestamp":"2025-01-01T10:02:00Z"},
            {"id":"1","author":{"username":"alice"},"timestamp":"2025-01-01T10:01:00Z"}
        ]"#;
        let messages = parse_messages(body).unwrap();
        assert_eq!(messages.len(), 2);
        assert!(messages.iter().all(|m| m.content.is_empty()));
    }

    #[test]
    fn parse_messages_defaults_missing_bot_flag() {
        let body = r#"[{"id":"9","author":{"username":"dave"},"content":"hi","timestamp":"2025-01-01T00:00:00.000000+00:00"}]"#;
        let messages = parse_messages(body).unwrap();
        assert_eq!(messages.len(), 1);
        assert!(!messages[0].is_bot);
    }

    #[test]
    fn parse_messages_rejects_missing_author() {
        let body = r#"[{"id":"9","content":"hi","timestamp":"2025-01-01T00:00:00Z"}]"#;
        assert!(matches!(
            parse_messages(body),
            Err(Error::MalformedResponse(_))
        ));
    }

    #[test]
    fn truncate_keeps_short_text() {
        assert_eq!(truncate_for_platform("short"), "short");
    }

    #[test]
    fn truncate_cuts_on_char_boundary() {
        let long = "📈".repeat(MAX_POST_CHARS + 10);
        let cut = truncate_for_platform(&long);
        assert_eq!(cut.chars().count(), MAX_POST_CHARS);
        assert!(cut.ends_with('…'));
    }

    #[test]
    fn error_message_falls_back_to_reason() {
        assert_eq!(error_message(StatusCode::BAD_GATEWAY, "<html>"), "Bad Gateway");
    }
}
