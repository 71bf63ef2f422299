use httpmock::prelude::*;
use serde_json::json;

use market_sentinel::config::ServerConfig;
use market_sentinel::{Error, GatewayConfig, RelayClient};

use super::start_relay;

fn gateway(relay_base: &str) -> GatewayConfig {
    GatewayConfig {
        bot_token: "tok".into(),
        channel_id: "42".into(),
        relay_url: format!("{}/api/discord", relay_base),
        ..Default::default()
    }
}

#[tokio::test]
async fn fetch_through_relay_returns_chronological_messages() {
    let upstream = MockServer::start_async().await;
    let mock = upstream.mock(|when, then| {
        when.method(GET)
            .path("/channels/42/messages")
            .query_param("limit", "50")
            .header("authorization", "Bot tok");
        then.status(200).json_body(json!([
            { "id": "3", "author": { "username": "carol" }, "content": "c", "timestamp": "2025-01-01T10:03:00Z" },
            { "id": "2", "author": { "username": "bob", "bot": true }, "content": "b", "timestamp": "2025-01-01T10:02:00Z" },
            { "id": "1", "author": { "username": "alice" }, "content": "a", "timestamp": "2025-01-01T10:01:00Z" }
        ]));
    });

    let relay = start_relay(ServerConfig {
        upstream: upstream.base_url(),
        ..Default::default()
    })
    .await;

    let client = RelayClient::with_defaults().unwrap();
    let messages = client.fetch_messages(&gateway(&relay)).await.unwrap();
    let ids: Vec<_> = messages.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, ["1", "2", "3"]);
    assert!(messages[1].is_bot);
    mock.assert_calls(1);
}

#[tokio::test]
async fn upstream_forbidden_maps_to_forbidden_error() {
    let upstream = MockServer::start_async().await;
    upstream.mock(|when, then| {
        when.method(GET).path("/channels/42/messages");
        then.status(403).json_body(json!({ "message": "Missing Access" }));
    });
    let relay = start_relay(ServerConfig {
        upstream: upstream.base_url(),
        ..Default::default()
    })
    .await;

    let err = RelayClient::with_defaults()
        .unwrap()
        .fetch_messages(&gateway(&relay))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden));
    assert_eq!(err.to_string(), "Forbidden: Bot lacks channel access.");
}

#[tokio::test]
async fn post_through_relay_reaches_output_channel() {
    let upstream = MockServer::start_async().await;
    let mock = upstream.mock(|when, then| {
        when.method(POST)
            .path("/channels/99/messages")
            .json_body(json!({ "content": "hello" }));
        then.status(200).json_body(json!({ "id": "555" }));
    });
    let relay = start_relay(ServerConfig {
        upstream: upstream.base_url(),
        ..Default::default()
    })
    .await;

    let mut cfg = gateway(&relay);
    cfg.output_channel_id = Some("99".into());
    let delivered = RelayClient::with_defaults()
        .unwrap()
        .post_message(&cfg, "hello")
        .await
        .unwrap();
    assert!(delivered);
    mock.assert_calls(1);
}

#[tokio::test]
async fn relay_without_upstream_yields_http_500_error() {
    let relay = start_relay(ServerConfig {
        upstream: "http://127.0.0.1:1".into(),
        ..Default::default()
    })
    .await;

    let err = RelayClient::with_defaults()
        .unwrap()
        .fetch_messages(&gateway(&relay))
        .await
        .unwrap_err();
    match err {
        Error::Http { status, message } => {
            assert_eq!(status, 500);
            assert!(message.contains("Internal Proxy Error"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
