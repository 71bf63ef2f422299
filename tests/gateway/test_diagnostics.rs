use market_sentinel::config::ServerConfig;
use market_sentinel::gateway::settings::AccessCredentials;
use market_sentinel::{DiagnosticRunner, DiagnosticStatus, DiagnosticStep, RelayClient};

use super::start_relay;

fn runner() -> DiagnosticRunner {
    DiagnosticRunner::new(RelayClient::with_defaults().unwrap())
}

fn guarded_relay() -> ServerConfig {
    ServerConfig {
        access_id: Some("client-id".into()),
        access_secret: Some("client-secret".into()),
        ..Default::default()
    }
}

#[tokio::test]
async fn open_relay_passes_every_stage() {
    let relay = start_relay(ServerConfig::default()).await;

    let results = runner()
        .run(&format!("{}/api/discord", relay), None)
        .await;

    assert_eq!(results.len(), 4);
    let steps: Vec<_> = results.iter().map(|r| r.step).collect();
    assert_eq!(steps, DiagnosticStep::ALL);
    assert!(results.iter().all(|r| r.status == DiagnosticStatus::Success));
}

#[tokio::test]
async fn guarded_relay_rejects_probe_without_credentials() {
    let relay = start_relay(guarded_relay()).await;

    let results = runner().run(&relay, None).await;

    assert_eq!(results[0].status, DiagnosticStatus::Success);
    assert_eq!(results[1].status, DiagnosticStatus::Success);
    assert!(results[1].details.contains("HTTP 403"));
    assert_eq!(results[2].status, DiagnosticStatus::Error);
    assert_eq!(results[3].status, DiagnosticStatus::Error);
}

#[tokio::test]
async fn guarded_relay_accepts_matching_credentials() {
    let relay = start_relay(guarded_relay()).await;
    let credentials = AccessCredentials {
        client_id: "client-id".into(),
        client_secret: "client-secret".into(),
    };

    let results = runner().run(&relay, Some(&credentials)).await;

    assert!(results.iter().all(|r| r.status == DiagnosticStatus::Success));
}

#[tokio::test]
async fn closed_port_fails_connectivity_only_after_validation() {
    let results = runner().run("http://127.0.0.1:1", None).await;

    assert_eq!(results[0].status, DiagnosticStatus::Success);
    assert!(results[1..]
        .iter()
        .all(|r| r.status == DiagnosticStatus::Error));
    assert!(results[1].details.contains("Host unreachable"));
}
