//! Gemini `generateContent` backend.
//!
//! Sends the activity instruction plus the captured media as an inline-data
//! part and asks for JSON output constrained by [`response_schema`].

use log::{debug, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::analysis::{AnalysisRequest, AnalysisResult};
use crate::gateway::{
    InferenceError, PostureAnalyzer, instruction_for, parse_reply, response_schema,
};
use crate::media::DataUri;

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub api_base: String,
    /// Transport timeout; `None` keeps the HTTP client's default (no timeout).
    pub timeout: Option<Duration>,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            timeout: None,
        }
    }
}

/// Stateless client for one Gemini model.
#[derive(Debug, Clone)]
pub struct GeminiGateway {
    http: Client,
    endpoint: String,
    api_key: String,
}

impl GeminiGateway {
    pub fn new(config: GeminiConfig) -> Result<Self, InferenceError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;

        let endpoint = format!(
            "{}/v1beta/models/{}:generateContent",
            config.api_base.trim_end_matches('/'),
            config.model
        );

        Ok(Self {
            http,
            endpoint,
            api_key: config.api_key,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl PostureAnalyzer for GeminiGateway {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, InferenceError> {
        let media = DataUri::parse(request.media())?;
        let instruction = instruction_for(request.activity());

        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![
                    Part::Text(&instruction),
                    Part::InlineData {
                        mime_type: media.essence(),
                        data: media.payload,
                    },
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: response_schema(),
            },
        };

        debug!(
            target: "gateway",
            "Requesting {} analysis ({}, {} base64 bytes)",
            request.activity(),
            media.essence(),
            media.payload.len()
        );

        let response = self
            .http
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(target: "gateway", "Provider returned {}", status);
            return Err(InferenceError::UnexpectedStatus { status, body });
        }

        let reply: GenerateContentResponse = response.json().await?;
        let text = reply.into_text()?;
        parse_reply(&text)
    }
}

// Wire types for generateContent

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
enum Part<'a> {
    #[serde(rename = "text")]
    Text(&'a str),
    #[serde(rename = "inlineData")]
    InlineData {
        #[serde(rename = "mimeType")]
        mime_type: &'a str,
        data: &'a str,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate.
    fn into_text(self) -> Result<String, InferenceError> {
        let Some(candidate) = self.candidates.into_iter().next() else {
            let reason = self
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .map(|r| format!("blocked: {r}"))
                .unwrap_or_else(|| "no candidates".to_string());
            return Err(InferenceError::EmptyReply(reason));
        };

        let text: String = candidate
            .content
            .map(|c| c.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|p| p.text)
            .collect();

        if text.trim().is_empty() {
            let reason = candidate
                .finish_reason
                .map(|r| format!("finish reason {r}"))
                .unwrap_or_else(|| "empty candidate".to_string());
            return Err(InferenceError::EmptyReply(reason));
        }

        Ok(text)
    }
}
