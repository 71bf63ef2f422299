//! Google Gemini API Client.
//!
//! Поддерживает:
//! - Структурированный JSON-ответ по схеме (`responseSchema`)
//! - Бюджет рассуждений (`thinkingConfig`)
//! - Ссылки из `groundingMetadata`

use std::env;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::analysis::{AnalysisPrompt, LanguageModel, ModelReply};
use crate::config::{Config, DEFAULT_MODEL};
use crate::gateway::client::classify_transport;
use crate::{Error, Result};

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Generation parameters sent with every request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub thinking_budget: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: 0.4,
            max_output_tokens: 4000,
            thinking_budget: 2000,
        }
    }
}

/// Google Gemini client.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: Client,
    api_key: String,
    base_url: String,
    model: String,
    settings: GenerationSettings,
    timeout: Duration,
}

impl GeminiClient {
    /// Создать клиент из GOOGLE_API_KEY (или API_KEY).
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("GOOGLE_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| env::var("API_KEY").ok())
            .ok_or_else(|| Error::InvalidInput("GOOGLE_API_KEY is not set".to_string()))?;
        Self::new(api_key, DEFAULT_MODEL)
    }

    /// Client from the environment key with model and limits from config.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::from_env()?
            .with_model(&config.model)
            .with_settings(GenerationSettings {
                temperature: config.temperature,
                max_output_tokens: config.max_output_tokens,
                thinking_budget: config.thinking_budget,
            }))
    }

    /// Создать клиент с API ключом и моделью.
    pub fn new<S: Into<String>>(api_key: S, model: &str) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::InvalidInput("GOOGLE_API_KEY is empty".to_string()));
        }

        let timeout = Duration::from_secs(REQUEST_TIMEOUT_SECS);
        Ok(Self {
            http: build_http(timeout)?,
            api_key,
            base_url: GEMINI_API_URL.to_string(),
            model: model.to_string(),
            settings: GenerationSettings::default(),
            timeout,
        })
    }

    /// Заменить таймаут запроса (по умолчанию 120 с).
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.http = build_http(timeout)?;
        self.timeout = timeout;
        Ok(self)
    }

    /// Установить модель.
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(&self, prompt: &AnalysisPrompt) -> GeminiRequest {
        GeminiRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part {
                    text: prompt.content.clone(),
                }],
            }],
            system_instruction: SystemInstruction {
                parts: vec![Part {
                    text: prompt.system.clone(),
                }],
            },
            generation_config: GenerationConfig {
                temperature: self.settings.temperature,
                max_output_tokens: self.settings.max_output_tokens,
                response_mime_type: "application/json",
                response_schema: response_schema(),
                thinking_config: ThinkingConfig {
                    thinking_budget: self.settings.thinking_budget,
                },
            },
        }
    }

    /// Отправить промпт и получить текст ответа вместе с grounding-ссылками.
    pub async fn generate_report(&self, prompt: &AnalysisPrompt) -> Result<ModelReply> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        debug!(model = %self.model, chars = prompt.content.len(), "Sending Gemini request");

        let response = self
            .http
            .post(&url)
            .query(&[("key", &self.api_key)])
            .json(&self.build_request(prompt))
            .send()
            .await
            .map_err(|e| classify_transport(e, self.timeout))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| classify_transport(e, self.timeout))?;

        if !status.is_success() {
            return Err(Error::Llm(format!("Gemini error {}: {}", status, text)));
        }

        let gemini_response: GeminiResponse = serde_json::from_str(&text)
            .map_err(|e| Error::MalformedResponse(format!("Gemini envelope: {}", e)))?;
        Ok(gemini_response.into_reply())
    }
}

impl LanguageModel for GeminiClient {
    async fn generate(&self, prompt: &AnalysisPrompt) -> Result<ModelReply> {
        self.generate_report(prompt).await
    }
}

fn build_http(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent("market_sentinel/0.1.0")
        .timeout(timeout)
        .build()
        .map_err(|e| Error::InvalidInput(format!("HTTP client error: {}", e)))
}

/// Схема структурированного ответа аналитика.
fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "overallSentiment": {
                "type": "NUMBER",
                "description": "Sentiment score from -1.0 (bearish) to 1.0 (bullish)"
            },
            "summaryMarkdown": {
                "type": "STRING",
                "description": "Detailed analysis summary in Markdown format"
            },
            "keyThemes": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "List of 3-5 key market themes"
            }
        },
        "required": ["overallSentiment", "summaryMarkdown", "keyThemes"]
    })
}

// === Структуры запроса ===

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    system_instruction: SystemInstruction,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    response_mime_type: &'static str,
    response_schema: Value,
    thinking_config: ThinkingConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_budget: u32,
}

// === Структуры ответа ===

#[derive(Debug, Default, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: CandidateContent,
    #[serde(default)]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Default, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    /// Thought summaries are not part of the answer.
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Default, Deserialize)]
struct GroundingChunk {
    #[serde(default)]
    web: Option<WebSource>,
}

#[derive(Debug, Default, Deserialize)]
struct WebSource {
    #[serde(default)]
    uri: Option<String>,
}

impl GeminiResponse {
    /// Text of the first candidate (answer parts concatenated) plus grounding URIs.
    fn into_reply(self) -> ModelReply {
        let Some(candidate) = self.candidates.into_iter().next() else {
            return ModelReply::default();
        };

        let text = candidate
            .content
            .parts
            .into_iter()
            .filter(|p| !p.thought)
            .filter_map(|p| p.text)
            .collect::<String>();

        let grounding_urls = candidate
            .grounding_metadata
            .map(|m| {
                m.grounding_chunks
                    .into_iter()
                    .filter_map(|c| c.web.and_then(|w| w.uri))
                    .collect()
            })
            .unwrap_or_default();

        ModelReply {
            text,
            grounding_urls,
        }
    }
}
