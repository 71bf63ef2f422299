//! Cross-origin policy for the relay server.
//!
//! Credentials are allowed, so an accepted origin is echoed back verbatim
//! rather than answered with `*`.

use hyper::header::{
    HeaderMap, HeaderValue, ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
    ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, VARY,
};

pub const ALLOWED_METHODS: &str = "GET, POST, OPTIONS";
pub const ALLOWED_HEADERS: &str =
    "Content-Type, Authorization, CF-Access-Client-Id, CF-Access-Client-Secret";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginDecision {
    /// No `Origin` header: not a browser cross-origin call.
    Absent,
    Allowed(String),
    Denied(String),
}

#[derive(Debug, Clone)]
pub struct CorsPolicy {
    suffixes: Vec<String>,
}

impl CorsPolicy {
    pub fn new(suffixes: Vec<String>) -> Self {
        Self { suffixes }
    }

    /// Localhost origins are always allowed, others by hostname suffix.
    pub fn is_allowed(&self, origin: &str) -> bool {
        origin.contains("localhost")
            || self
                .suffixes
                .iter()
                .any(|suffix| !suffix.is_empty() && origin.ends_with(suffix.as_str()))
    }

    pub fn evaluate(&self, origin: Option<&str>) -> OriginDecision {
        match origin {
            None => OriginDecision::Absent,
            Some(origin) if self.is_allowed(origin) => OriginDecision::Allowed(origin.to_string()),
            Some(origin) => OriginDecision::Denied(origin.to_string()),
        }
    }

    /// Headers for an allowed origin; `preflight` adds methods and headers.
    pub fn apply(&self, headers: &mut HeaderMap, decision: &OriginDecision, preflight: bool) {
        let OriginDecision::Allowed(origin) = decision else {
            return;
        };
        let Ok(origin) = HeaderValue::from_str(origin) else {
            return;
        };
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        headers.insert(
            ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
        headers.append(VARY, HeaderValue::from_static("Origin"));
        if preflight {
            headers.insert(
                ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static(ALLOWED_METHODS),
            );
            headers.insert(
                ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static(ALLOWED_HEADERS),
            );
        }
    }
}

impl Default for CorsPolicy {
    fn default() -> Self {
        Self::new(vec![crate::config::ALLOWED_ORIGIN_SUFFIX.to_string()])
    }
}
