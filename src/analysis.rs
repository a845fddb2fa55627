//! Client for the generative-text service.
//!
//! Every call goes out once with fixed sampling policy; failures are returned immediately and
//! never retried.

use crate::config::Config;
use crate::prompts::InstructionPair;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

/// Output ceiling applied to every completion.
pub const MAX_OUTPUT_TOKENS: u32 = 1500;
/// Sampling temperature applied to every completion.
pub const TEMPERATURE: f32 = 0.2;

/// Errors surfaced while requesting a completion.
#[derive(Debug, Error)]
pub enum AnalysisServiceError {
    /// The service could not be reached.
    #[error("Analysis service unavailable: {0}")]
    Unavailable(String),
    /// The service answered with an error status.
    #[error("Analysis request failed: {0}")]
    RequestFailed(String),
    /// The service response could not be interpreted.
    #[error("Malformed analysis response: {0}")]
    InvalidResponse(String),
}

/// Immutable completion request.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    /// System and user instructions.
    pub instructions: InstructionPair,
    /// Maximum number of tokens the model may produce.
    pub max_output_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

impl AnalysisRequest {
    /// Wrap instructions with the service-wide output ceiling and temperature.
    pub fn with_policy(instructions: InstructionPair) -> Self {
        Self {
            instructions,
            max_output_tokens: MAX_OUTPUT_TOKENS,
            temperature: TEMPERATURE,
        }
    }
}

/// Interface implemented by generative-text backends.
#[async_trait]
pub trait AnalysisClient: Send + Sync {
    /// Send the request and return the raw completion text.
    async fn complete(&self, request: AnalysisRequest) -> Result<String, AnalysisServiceError>;
}

/// Client for OpenAI-compatible chat completion endpoints.
pub struct OpenAiClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    /// Build a client from the loaded configuration.
    pub fn new(config: &Config) -> Result<Self, AnalysisServiceError> {
        let http = Client::builder()
            .user_agent("contractlens/analysis")
            .build()
            .map_err(|error| AnalysisServiceError::Unavailable(error.to_string()))?;
        Ok(Self {
            http,
            base_url: config.openai_base_url.clone(),
            api_key: config.openai_api_key.clone(),
            model: config.openai_model.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl AnalysisClient for OpenAiClient {
    async fn complete(&self, request: AnalysisRequest) -> Result<String, AnalysisServiceError> {
        let AnalysisRequest {
            instructions,
            max_output_tokens,
            temperature,
        } = request;
        let payload = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": instructions.system },
                { "role": "user", "content": instructions.user },
            ],
            "max_tokens": max_output_tokens,
            "temperature": temperature,
        });

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                AnalysisServiceError::Unavailable(format!(
                    "failed to reach {}: {error}",
                    self.base_url
                ))
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(AnalysisServiceError::RequestFailed(
                "service rejected the API key (401)".into(),
            ));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisServiceError::RequestFailed(format!(
                "service returned {status}: {body}"
            )));
        }

        let body: ChatCompletionResponse = response.json().await.map_err(|error| {
            AnalysisServiceError::InvalidResponse(format!("failed to decode completion: {error}"))
        })?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .unwrap_or_default();
        if content.is_empty() {
            return Err(AnalysisServiceError::InvalidResponse(
                "completion contained no text".into(),
            ));
        }

        tracing::debug!(model = %self.model, chars = content.chars().count(), "Completion received");
        Ok(content)
    }
}
