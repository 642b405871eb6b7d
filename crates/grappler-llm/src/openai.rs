//! OpenAI backend for GPT models.
//!
//! Requires the `api` feature and an OpenAI API key.

use crate::backend::{LlmBackend, LlmConfig, LlmError, LlmResult};
use crate::types::GenerationRequest;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI API request.
#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct OpenAiMessage {
    role: &'static str,
    content: String,
}

/// OpenAI API response.
#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    error: OpenAiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorDetail {
    message: String,
}

/// OpenAI backend for GPT models.
///
/// # Example
///
/// ```rust,ignore
/// use grappler_llm::{GenerationRequest, LlmBackend, OpenAiBackend};
///
/// let backend = OpenAiBackend::new("sk-...")?;
/// let answer = backend.generate(&GenerationRequest::new("How do I escape mount?")).await?;
/// ```
pub struct OpenAiBackend {
    api_key: String,
    config: LlmConfig,
    client: reqwest::Client,
    endpoint: String,
}

impl OpenAiBackend {
    /// Create a new OpenAI backend.
    pub fn new(api_key: &str) -> LlmResult<Self> {
        Self::with_config(api_key, LlmConfig::openai())
    }

    /// Create with custom config.
    pub fn with_config(api_key: &str, config: LlmConfig) -> LlmResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::ApiError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key: api_key.to_string(),
            config,
            client,
            endpoint: OPENAI_API_URL.to_string(),
        })
    }

    /// Create from environment variable.
    pub fn from_env(config: LlmConfig) -> LlmResult<Self> {
        let api_key =
            std::env::var("OPENAI_API_KEY").map_err(|_| LlmError::AuthenticationFailed)?;
        Self::with_config(&api_key, config)
    }

    /// Set the model.
    pub fn with_model(mut self, model: &str) -> Self {
        self.config.model = model.to_string();
        self
    }

    /// Use a custom endpoint (for Azure OpenAI or compatible APIs).
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }

    fn build_request(&self, request: &GenerationRequest) -> OpenAiRequest {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(OpenAiMessage {
                role: "system",
                content: system.clone(),
            });
        }
        messages.push(OpenAiMessage {
            role: "user",
            content: request.prompt.clone(),
        });

        OpenAiRequest {
            model: self.config.model.clone(),
            messages,
            max_tokens: request.params.max_tokens,
            temperature: request.params.temperature,
        }
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    fn name(&self) -> &str {
        "openai"
    }

    fn config(&self) -> &LlmConfig {
        &self.config
    }

    async fn generate(&self, request: &GenerationRequest) -> LlmResult<String> {
        let body = self.build_request(request);

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    LlmError::ConnectionFailed("Cannot connect to OpenAI API".to_string())
                } else if e.is_timeout() {
                    LlmError::Timeout(self.config.timeout_secs)
                } else {
                    LlmError::ApiError(e.to_string())
                }
            })?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();

            match status.as_u16() {
                401 => return Err(LlmError::AuthenticationFailed),
                429 => return Err(LlmError::RateLimited(60)),
                404 => return Err(LlmError::ModelNotFound(self.config.model.clone())),
                400 => {
                    if let Ok(error) = serde_json::from_str::<OpenAiError>(&body) {
                        if error.error.message.contains("maximum context length") {
                            return Err(LlmError::ContextTooLong);
                        }
                    }
                }
                _ => {}
            }

            return Err(LlmError::ApiError(format!(
                "OpenAI API error {}: {}",
                status, body
            )));
        }

        let resp: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        if let Some(usage) = &resp.usage {
            tracing::debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                model = %self.config.model,
                "openai usage"
            );
        }

        resp.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("No choices in response".to_string()))
    }
}
