//! Relay client, diagnostics and relay server exercised together.

mod test_diagnostics;
mod test_relay_roundtrip;

use market_sentinel::config::ServerConfig;
use market_sentinel::relay::{serve, RelayState};
use tokio::net::TcpListener;

/// Start a relay server on an ephemeral port; returns its base URL.
pub async fn start_relay(config: ServerConfig) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = RelayState::new(&config).unwrap();
    tokio::spawn(serve(listener, state));
    format!("http://{}", addr)
}
