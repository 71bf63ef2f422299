//! Error types for the market sentinel

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unauthorized: Invalid Bot Token.")]
    Unauthorized,

    #[error("Forbidden: Bot lacks channel access.")]
    Forbidden,

    #[error("Not Found: Incorrect Channel ID.")]
    NotFound,

    #[error("Connection Timeout: The gateway is taking too long to respond ({0:?}).")]
    Timeout(Duration),

    #[error("Gateway Unreachable: {0}")]
    Unreachable(String),

    #[error("Gateway error: Received invalid response format ({0}).")]
    MalformedResponse(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification used by the poller, logs and metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    Unauthorized,
    Forbidden,
    NotFound,
    Timeout,
    Unreachable,
    MalformedResponse,
    Http,
    Llm,
    Io,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Unreachable => "unreachable",
            ErrorKind::MalformedResponse => "malformed_response",
            ErrorKind::Http => "http",
            ErrorKind::Llm => "llm",
            ErrorKind::Io => "io",
        }
    }

    /// Transport-level failures: no usable response reached the client.
    pub fn is_transport(&self) -> bool {
        matches!(self, ErrorKind::Timeout | ErrorKind::Unreachable)
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::Unauthorized => ErrorKind::Unauthorized,
            Error::Forbidden => ErrorKind::Forbidden,
            Error::NotFound => ErrorKind::NotFound,
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::Unreachable(_) => ErrorKind::Unreachable,
            Error::MalformedResponse(_) | Error::SerializationError(_) => {
                ErrorKind::MalformedResponse
            }
            Error::Http { .. } => ErrorKind::Http,
            Error::Llm(_) => ErrorKind::Llm,
            Error::IoError(_) => ErrorKind::Io,
        }
    }

    /// Remediation hint shown next to transport and auth failures.
    pub fn hint(&self) -> Option<&'static str> {
        let kind = self.kind();
        if kind.is_transport() {
            return Some(
                "Check the relay URL and its CORS settings, then run `market_sentinel diagnose`.",
            );
        }
        match kind {
            ErrorKind::Unauthorized => Some("Verify the bot token in the gateway settings."),
            ErrorKind::Forbidden => Some("Grant the bot read/send access to the channel."),
            ErrorKind::NotFound => Some("Double-check the channel ID."),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}
