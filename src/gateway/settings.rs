//! Gateway configuration as entered by the user.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub const ACCESS_ID_HEADER: &str = "CF-Access-Client-Id";
pub const ACCESS_SECRET_HEADER: &str = "CF-Access-Client-Secret";

/// Relay connection settings. Persisted verbatim (camelCase JSON) in both the
/// committed and the draft slot of the settings store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    pub bot_token: String,
    pub channel_id: String,
    pub relay_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_secret: Option<String>,
    #[serde(default)]
    pub auto_post: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_channel_id: Option<String>,
}

/// Client-id/secret pair for the access policy layer in front of the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl AccessCredentials {
    /// Builds the pair only when both halves are present and non-empty.
    pub fn from_parts(id: Option<&str>, secret: Option<&str>) -> Result<Option<Self>> {
        let id = id.map(str::trim).filter(|s| !s.is_empty());
        let secret = secret.map(str::trim).filter(|s| !s.is_empty());
        match (id, secret) {
            (Some(client_id), Some(client_secret)) => Ok(Some(Self {
                client_id: client_id.to_string(),
                client_secret: client_secret.to_string(),
            })),
            (None, None) => Ok(None),
            _ => Err(Error::InvalidInput(
                "access client id and secret must be set together".to_string(),
            )),
        }
    }

    pub fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header(ACCESS_ID_HEADER, &self.client_id)
            .header(ACCESS_SECRET_HEADER, &self.client_secret)
    }
}

impl GatewayConfig {
    /// Required fields present and access headers all-or-nothing.
    pub fn validate(&self) -> Result<()> {
        if self.bot_token.trim().is_empty() {
            return Err(Error::InvalidInput("bot token is required".to_string()));
        }
        if self.channel_id.trim().is_empty() {
            return Err(Error::InvalidInput("channel id is required".to_string()));
        }
        if self.relay_url.trim().is_empty() {
            return Err(Error::InvalidInput("relay url is required".to_string()));
        }
        self.access_credentials()?;
        Ok(())
    }

    pub fn access_credentials(&self) -> Result<Option<AccessCredentials>> {
        AccessCredentials::from_parts(self.access_id.as_deref(), self.access_secret.as_deref())
    }

    /// Channel that receives auto-posted reports.
    pub fn target_channel(&self) -> &str {
        self.output_channel_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.channel_id)
    }

    pub fn authorization(&self) -> String {
        format!("Bot {}", self.bot_token.trim())
    }

    /// Token with everything but the last four characters masked.
    pub fn masked_token(&self) -> String {
        let token = self.bot_token.trim();
        let visible: String = token
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        if token.chars().count() <= 4 {
            "****".to_string()
        } else {
            format!("****{}", visible)
        }
    }
}
