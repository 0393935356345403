//! Field suggestion services
//!
//! [`ClaudeSuggestionService`] asks the Anthropic messages API which of the
//! known field names a content type needs. [`StaticSuggestionService`]
//! answers from the schema registry and needs no network.
//!
//! Failures are surfaced to the caller once. Nothing here retries.

use std::time::Duration;

use async_trait::async_trait;
use curate_core::{ContentType, SuggestionError, SuggestionService};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use crate::schema::{FIELD_CATALOG, SchemaRegistry};

pub const CLAUDE_API_URL: &str = "https://api.anthropic.com/v1/messages";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 512;

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ClaudeRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    content: Vec<ContentBlock>,
}

impl ClaudeResponse {
    fn text(&self) -> Option<&str> {
        self.content.iter().find_map(|block| match block {
            ContentBlock::Text { text } => Some(text.as_str()),
            ContentBlock::Other => None,
        })
    }
}

/// Accepted answer shapes: `{"fields": [...]}` or a bare array
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FieldsAnswer {
    Object { fields: Vec<String> },
    List(Vec<String>),
}

impl FieldsAnswer {
    fn into_fields(self) -> Vec<String> {
        match self {
            FieldsAnswer::Object { fields } | FieldsAnswer::List(fields) => fields,
        }
    }
}

/// Suggestion service backed by Claude
#[derive(Debug, Clone)]
pub struct ClaudeSuggestionService {
    http: Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl ClaudeSuggestionService {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

    /// Client using the `ANTHROPIC_API_KEY` environment variable
    pub fn from_env() -> Result<Self, SuggestionError> {
        let api_key =
            std::env::var("ANTHROPIC_API_KEY").map_err(|_| SuggestionError::MissingApiKey)?;
        Self::new(api_key, None)
    }

    pub fn new(api_key: impl Into<String>, model: Option<String>) -> Result<Self, SuggestionError> {
        let http = Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .user_agent(concat!("curate/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SuggestionError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            api_key: api_key.into(),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            endpoint: CLAUDE_API_URL.to_string(),
        })
    }

    /// Send requests somewhere other than the public API
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn send(&self, prompt: String) -> Result<String, SuggestionError> {
        let request = ClaudeRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let res = self
            .http
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        match res.status() {
            s if s.is_success() => {
                let body = res
                    .json::<ClaudeResponse>()
                    .await
                    .map_err(|e| SuggestionError::Malformed(e.to_string()))?;
                body.text()
                    .map(str::to_string)
                    .ok_or_else(|| SuggestionError::Malformed("No text content in response".into()))
            }
            StatusCode::UNAUTHORIZED => Err(SuggestionError::InvalidApiKey),
            StatusCode::TOO_MANY_REQUESTS => Err(SuggestionError::RateLimited),
            s => {
                let status = s.as_u16();
                let body = res.text().await.unwrap_or_default();
                Err(SuggestionError::Http { status, body })
            }
        }
    }
}

#[async_trait]
impl SuggestionService for ClaudeSuggestionService {
    #[instrument(skip(self), fields(model = %self.model))]
    async fn suggest_fields(&self, content_type: ContentType) -> Result<Vec<String>, SuggestionError> {
        let response = self.send(build_prompt(content_type)).await?;
        let fields = parse_fields(&response)?;
        debug!(fields = ?fields, "Received field suggestions");
        Ok(fields)
    }
}

/// Prompt asking for the field names one content type needs
pub fn build_prompt(content_type: ContentType) -> String {
    let vocabulary: Vec<&str> = FIELD_CATALOG.iter().map(|entry| entry.name).collect();
    format!(
        "You are a form generation expert. You determine the fields necessary to collect the given content type.\n\n\
         Given the content type: {content_type}, return a JSON object of the form {{\"fields\": [...]}} \
         containing only the names of the necessary input fields.\n\n\
         Possible fields include: {}.\n\n\
         Do not include any fields that are not relevant to the content type.\n\n\
         For example, if the content type is \"Reels\", the output should be \
         {{\"fields\": [\"name\", \"reelsUrl\", \"thumbnail\"]}}.",
        vocabulary.join(", ")
    )
}

/// Field names from a model answer, which may be wrapped in a code fence
pub fn parse_fields(response: &str) -> Result<Vec<String>, SuggestionError> {
    let json = extract_json(response);
    if json.is_empty() {
        error!("Empty suggestion response");
        return Err(SuggestionError::Malformed("Empty response".into()));
    }

    serde_json::from_str::<FieldsAnswer>(json)
        .map(FieldsAnswer::into_fields)
        .map_err(|e| {
            error!(
                json_error = %e,
                preview = %json.chars().take(200).collect::<String>(),
                "Failed to parse suggestion response"
            );
            SuggestionError::Malformed(e.to_string())
        })
}

fn map_reqwest_error(e: reqwest::Error) -> SuggestionError {
    if e.is_timeout() {
        SuggestionError::Timeout
    } else {
        SuggestionError::Transport(e.to_string())
    }
}

/// JSON body of a response that might use markdown code fences
pub fn extract_json(text: &str) -> &str {
    let text = text.trim();

    if let Some(start) = text.find("```json") {
        let content_start = start + 7;
        if let Some(end) = text[content_start..].find("```") {
            return text[content_start..content_start + end].trim();
        }
    }

    if let Some(start) = text.find("```") {
        let content_start = start + 3;
        // skip a language tag on the fence line
        let content_start = text[content_start..]
            .find('\n')
            .map(|i| content_start + i + 1)
            .unwrap_or(content_start);
        if let Some(end) = text[content_start..].find("```") {
            return text[content_start..content_start + end].trim();
        }
    }

    text
}

/// Suggestions straight from the registry's declared fields
#[derive(Debug, Clone)]
pub struct StaticSuggestionService {
    registry: SchemaRegistry,
}

impl StaticSuggestionService {
    pub fn new(registry: SchemaRegistry) -> Self {
        Self { registry }
    }
}

impl Default for StaticSuggestionService {
    fn default() -> Self {
        Self::new(SchemaRegistry::builtin())
    }
}

#[async_trait]
impl SuggestionService for StaticSuggestionService {
    async fn suggest_fields(&self, content_type: ContentType) -> Result<Vec<String>, SuggestionError> {
        self.registry
            .declared(content_type)
            .map(|fields| fields.iter().map(|f| f.name.clone()).collect())
            .ok_or_else(|| SuggestionError::Unsupported(content_type.to_string()))
    }
}
