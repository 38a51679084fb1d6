//! Claude API client backing the reasoning model used by recommendations.

use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, warn};

use super::reasoning::{ModelError, ModelTool, ReasoningModel, StructuredRequest};

const CLAUDE_API_URL: &str = "https://api.anthropic.com/v1/messages";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const WEB_FETCH_BETA: &str = "web-fetch-2025-09-10";

#[derive(Debug, Clone, Error)]
pub enum ClaudeApiError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("timeout")]
    Timeout,
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("rate limited")]
    RateLimited,
    #[error("invalid api key")]
    InvalidApiKey,
    #[error("json error: {0}")]
    Serde(String),
    #[error("missing api key")]
    MissingApiKey,
}

impl ClaudeApiError {
    /// Returns true if the error is transient and should be retried.
    pub fn should_retry(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout | Self::RateLimited => true,
            Self::Http { status, .. } => (500..=599).contains(status),
            _ => false,
        }
    }
}

/// A message in the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Request body for Claude API
#[derive(Debug, Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
}

/// Content block in response. Server tool traffic (searches, fetches and
/// their results) is not needed and collapses into `Other`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

/// Response from Claude API
#[derive(Debug, Deserialize)]
pub struct ClaudeResponse {
    pub id: String,
    pub content: Vec<ContentBlock>,
    pub model: String,
    pub stop_reason: Option<String>,
    pub usage: Usage,
}

impl ClaudeResponse {
    /// All text blocks concatenated. Cited answers arrive split across blocks.
    pub fn text(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::Other => None,
            })
            .collect();
        (!parts.is_empty()).then(|| parts.concat())
    }
}

/// Token usage information
#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Claude API client
#[derive(Debug, Clone)]
pub struct ClaudeApiClient {
    http: Client,
    api_key: String,
    model: String,
}

impl ClaudeApiClient {
    // Web search and page fetches run server-side and can take a while.
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

    /// Create a new client with the given API key
    pub fn new(api_key: String, model: Option<String>) -> Result<Self, ClaudeApiError> {
        if api_key.trim().is_empty() {
            return Err(ClaudeApiError::MissingApiKey);
        }

        let http = Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .user_agent(concat!("wardrobe/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClaudeApiError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }

    /// Send a completion request to Claude
    async fn complete(&self, request: &ClaudeRequest) -> Result<ClaudeResponse, ClaudeApiError> {
        let needs_fetch_beta = request
            .tools
            .iter()
            .any(|t| t.get("name").and_then(Value::as_str) == Some("web_fetch"));

        (|| async { self.send_request(request, needs_fetch_beta).await })
            .retry(
                ExponentialBuilder::default()
                    .with_min_delay(Duration::from_secs(1))
                    .with_max_delay(Duration::from_secs(30))
                    .with_max_times(3)
                    .with_jitter(),
            )
            .when(|e: &ClaudeApiError| e.should_retry())
            .notify(|e, dur| {
                warn!(
                    "Claude API call failed, retrying after {:.2}s: {}",
                    dur.as_secs_f64(),
                    e
                )
            })
            .await
    }

    async fn send_request(
        &self,
        request: &ClaudeRequest,
        needs_fetch_beta: bool,
    ) -> Result<ClaudeResponse, ClaudeApiError> {
        let mut builder = self
            .http
            .post(CLAUDE_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json");
        if needs_fetch_beta {
            builder = builder.header("anthropic-beta", WEB_FETCH_BETA);
        }

        let res = builder.json(request).send().await.map_err(map_reqwest_error)?;

        match res.status() {
            s if s.is_success() => res
                .json::<ClaudeResponse>()
                .await
                .map_err(|e| ClaudeApiError::Serde(e.to_string())),
            StatusCode::UNAUTHORIZED => Err(ClaudeApiError::InvalidApiKey),
            StatusCode::TOO_MANY_REQUESTS => Err(ClaudeApiError::RateLimited),
            s => {
                let status = s.as_u16();
                let body = res.text().await.unwrap_or_default();
                Err(ClaudeApiError::Http { status, body })
            }
        }
    }

    /// Send a prompt expecting JSON in the response
    pub async fn ask_json(&self, request: &StructuredRequest) -> Result<Value, ClaudeApiError> {
        let claude_request = ClaudeRequest {
            model: self.model.clone(),
            max_tokens: request.max_tokens,
            messages: vec![Message::user(prompt_with_schema(request))],
            system: Some(request.system.clone()),
            temperature: Some(request.temperature),
            tools: request.tools.iter().map(|t| tool_definition(*t)).collect(),
        };

        let response = self.complete(&claude_request).await?;
        debug!(
            response_id = %response.id,
            model = %response.model,
            stop_reason = ?response.stop_reason,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "Claude structured response received"
        );

        let text = response
            .text()
            .ok_or_else(|| ClaudeApiError::Serde("No text content in response".to_string()))?;

        if text.trim().is_empty() {
            tracing::error!("Claude returned an empty response");
            return Err(ClaudeApiError::Serde("Empty response from Claude".to_string()));
        }

        let json_str = extract_json(&text);

        serde_json::from_str(json_str).map_err(|e| {
            tracing::error!(
                json_error = %e,
                response_length = text.len(),
                extracted_json_preview = %json_str.chars().take(500).collect::<String>(),
                "Failed to parse JSON response from Claude"
            );
            ClaudeApiError::Serde(format!(
                "{} (response preview: {})",
                e,
                json_str.chars().take(500).collect::<String>()
            ))
        })
    }
}

#[async_trait]
impl ReasoningModel for ClaudeApiClient {
    async fn generate(&self, request: StructuredRequest) -> Result<Value, ModelError> {
        Ok(self.ask_json(&request).await?)
    }
}

fn prompt_with_schema(request: &StructuredRequest) -> String {
    if request.schema.is_null() {
        return request.prompt.clone();
    }
    let schema = serde_json::to_string_pretty(&request.schema).unwrap_or_default();
    format!(
        "{}\n\n## Output Format\nReturn ONLY valid JSON, in a ```json code block, that conforms to this JSON Schema:\n```json\n{}\n```",
        request.prompt, schema
    )
}

fn tool_definition(tool: ModelTool) -> Value {
    match tool {
        ModelTool::WebSearch => json!({
            "type": "web_search_20250305",
            "name": "web_search",
            "max_uses": 8,
        }),
        ModelTool::PageFetch => json!({
            "type": "web_fetch_20250910",
            "name": "web_fetch",
            "max_uses": 20,
        }),
    }
}

fn map_reqwest_error(e: reqwest::Error) -> ClaudeApiError {
    if e.is_timeout() {
        ClaudeApiError::Timeout
    } else {
        ClaudeApiError::Transport(e.to_string())
    }
}

/// Extract JSON from a string that might contain markdown code blocks
fn extract_json(text: &str) -> &str {
    let text = text.trim();

    // Try to find JSON in code blocks
    if let Some(start) = text.find("```json") {
        let content_start = start + 7;
        if let Some(end) = text[content_start..].find("```") {
            return text[content_start..content_start + end].trim();
        }
    }

    // Try generic code block
    if let Some(start) = text.find("```") {
        let content_start = start + 3;
        // Skip past any language identifier on the same line
        let content_start = text[content_start..]
            .find('\n')
            .map(|i| content_start + i + 1)
            .unwrap_or(content_start);
        if let Some(end) = text[content_start..].find("```") {
            return text[content_start..content_start + end].trim();
        }
    }

    // Bare JSON surrounded by prose
    let open = text.find(['[', '{']);
    let close = text.rfind([']', '}']);
    if let (Some(open), Some(close)) = (open, close) {
        if open < close {
            return &text[open..=close];
        }
    }

    text
}
