//! Relay server that fronts the chat platform API for browser dashboards.

pub mod cors;
pub mod server;

pub use cors::CorsPolicy;
pub use server::{run, serve, RelayState};
