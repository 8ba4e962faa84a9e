//! Google Gemini client.
//!
//! Calls the `generateContent` endpoint with low-temperature sampling and a
//! bounded output length, and returns the first candidate's text.
//!
//! # API Reference
//!
//! See: <https://ai.google.dev/api/generate-content>
//!
//! # Privacy
//!
//! The API key travels in the `x-goog-api-key` header, never in the URL, so it
//! cannot surface in transport errors. Only message counts are recorded in
//! traces.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{ClassificationRequest, Classifier, build_prompt};
use crate::error::ClassifierError;

/// Base URL for the Gemini API.
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default model used for classification.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Header carrying the API key.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Sampling parameters sent with every request.
const TEMPERATURE: f32 = 0.1;
const MAX_OUTPUT_TOKENS: u32 = 800;
const TOP_P: f32 = 0.8;
const TOP_K: u32 = 10;

/// Client for the Gemini text generation API.
#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    timeout: Option<Duration>,
}

impl Default for GeminiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl GeminiClient {
    /// Create a new Gemini client with default settings.
    pub fn new() -> Self {
        Self::with_base_url(GEMINI_API_BASE)
    }

    /// Create a new Gemini client with a custom base URL (for testing).
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: None,
        }
    }

    /// Use a different model.
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    /// Bound each request by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn generate_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn build_request(prompt: String) -> GenerateRequest {
        GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: Some(prompt) }],
            }],
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
                max_output_tokens: MAX_OUTPUT_TOKENS,
                top_p: TOP_P,
                top_k: TOP_K,
            },
        }
    }
}

#[async_trait]
impl Classifier for GeminiClient {
    async fn classify(&self, request: &ClassificationRequest) -> Result<String, ClassifierError> {
        let prompt = build_prompt(&request.messages, request.sensitivity);
        let body = Self::build_request(prompt);

        let mut builder = self
            .client
            .post(self.generate_url())
            .header(API_KEY_HEADER, &request.api_key)
            .json(&body);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        debug!(
            model = %self.model,
            message_count = request.messages.len(),
            "Sending classification request"
        );

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<GenerateResponse>(&text)
                .ok()
                .and_then(|r| r.error)
                .map(|e| e.message)
                .unwrap_or_else(|| text.chars().take(200).collect());
            warn!(status = status.as_u16(), "Classification request rejected");
            return Err(ClassifierError::Status {
                status: status.as_u16(),
                message,
            });
        }

        extract_text(&text)
    }
}

/// Pull the generated text out of a successful response body.
pub fn extract_text(body: &str) -> Result<String, ClassifierError> {
    let response: GenerateResponse = serde_json::from_str(body)?;

    if let Some(error) = response.error {
        return Err(ClassifierError::Api(error.message));
    }

    response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|content| content.parts.into_iter().next())
        .and_then(|part| part.text)
        .ok_or(ClassifierError::MissingText)
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    top_p: f32,
    top_k: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
}
