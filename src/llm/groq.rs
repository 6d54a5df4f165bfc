//! Groq chat-completions client (OpenAI-compatible wire format).

use serde::{Deserialize, Serialize};

use crate::config;

use super::{ChatCompletion, ChatMessage, CompletionRequest, LlmError};

/// Async HTTP client for the Groq chat completions API.
pub struct GroqClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl GroqClient {
    /// Create a client with an explicit key and endpoint.
    pub fn new(api_key: impl Into<String>, base_url: &str, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            api_key: api_key.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs,
        }
    }

    /// Client configured from `GROQ_API_KEY`, pointing at the public API.
    pub fn from_env() -> Result<Self, LlmError> {
        let key = std::env::var(config::ENV_API_KEY)
            .map_err(|_| LlmError::MissingApiKey(config::ENV_API_KEY))?;
        Ok(Self::new(
            key,
            config::GROQ_API_URL,
            config::REQUEST_TIMEOUT_SECS,
        ))
    }
}

/// Request body for the chat completions endpoint.
#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<WireResponseFormat>,
}

#[derive(Serialize)]
struct WireResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

/// Response body (only the fields we read).
#[derive(Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireMessage,
}

#[derive(Deserialize)]
struct WireMessage {
    content: Option<String>,
}

/// Serialize a request to the wire shape. Split out for testability.
fn wire_body(request: &CompletionRequest) -> WireRequest<'_> {
    WireRequest {
        model: &request.model,
        messages: &request.messages,
        temperature: request.temperature,
        max_tokens: request.max_tokens,
        response_format: request.json_mode.then_some(WireResponseFormat {
            format_type: "json_object",
        }),
    }
}

#[async_trait::async_trait]
impl ChatCompletion for GroqClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(&wire_body(request))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(self.timeout_secs)
                } else {
                    LlmError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: WireResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let reply = parsed
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .map(str::trim)
            .unwrap_or_default();

        if reply.is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        Ok(reply.to_string())
    }
}
