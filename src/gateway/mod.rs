//! Gateway access: relay client, URL handling, settings and diagnostics.
//!
//! Provides:
//! - `RelayClient` for fetching and posting channel messages through a relay
//! - `DiagnosticRunner` for the staged reachability probe
//! - `GatewayConfig` as entered by the user

pub mod client;
pub mod diagnostics;
pub mod settings;
pub mod url;

pub use client::RelayClient;
pub use diagnostics::DiagnosticRunner;
pub use settings::{AccessCredentials, GatewayConfig};
