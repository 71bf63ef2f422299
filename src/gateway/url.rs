//! Relay URL helpers.

use reqwest::Url;

use crate::config::DEFAULT_RELAY_URL;
use crate::{Error, Result};

/// Path prefix under which the relay exposes the platform API.
pub const API_PATH: &str = "/api/discord";
pub const HEALTH_PATH: &str = "/health";

/// Normalize a user-entered relay base URL.
///
/// Trims whitespace and trailing slashes, adds a scheme when missing
/// (`http://` for loopback hosts, `https://` otherwise) and appends
/// [`API_PATH`] unless the path already ends with it.
pub fn normalize_relay_base(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return DEFAULT_RELAY_URL.to_string();
    }

    let with_scheme = if has_http_scheme(trimmed) {
        trimmed.to_string()
    } else if is_loopback(trimmed) {
        format!("http://{}", trimmed)
    } else {
        format!("https://{}", trimmed)
    };

    if with_scheme.ends_with(API_PATH) {
        with_scheme
    } else {
        format!("{}{}", with_scheme, API_PATH)
    }
}

/// `{base}/channels/{channel_id}/messages`
pub fn messages_url(relay_url: &str, channel_id: &str) -> String {
    format!(
        "{}/channels/{}/messages",
        normalize_relay_base(relay_url),
        channel_id.trim()
    )
}

/// Health endpoint on the relay's origin, ignoring any path the user typed.
pub fn health_url(relay_url: &str) -> Result<Url> {
    let mut url = Url::parse(relay_url.trim())
        .map_err(|e| Error::InvalidInput(format!("cannot parse relay url: {}", e)))?;
    if url.host_str().is_none() {
        return Err(Error::InvalidInput("relay url has no host".to_string()));
    }
    url.set_path(HEALTH_PATH);
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

pub fn has_http_scheme(url: &str) -> bool {
    let lower = url.trim().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn is_loopback(host_and_path: &str) -> bool {
    let host = host_and_path
        .split(['/', ':'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    host == "localhost" || host == "127.0.0.1" || host == "0.0.0.0"
}
