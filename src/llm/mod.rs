//! Remote text-completion seam.
//!
//! Everything that talks to the Groq API goes through the `ChatCompletion`
//! trait so the pipeline can be tested against mocks. The error taxonomy
//! carries the HTTP-ish status used to decide retryability in the model
//! fallback loop (`router`).

pub mod groq;
pub mod router;

pub use groq::GroqClient;
pub use router::ModelRouter;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Role tag on a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One role-tagged message in a completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// A single completion request.
///
/// `json_mode` asks the backend for strict JSON output
/// (`response_format: {"type": "json_object"}` on the wire).
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub json_mode: bool,
}

impl CompletionRequest {
    /// Request with a model to be filled in by the fallback router.
    pub fn for_router(
        messages: Vec<ChatMessage>,
        temperature: f32,
        max_tokens: u32,
    ) -> Self {
        Self {
            model: String::new(),
            messages,
            temperature,
            max_tokens,
            json_mode: false,
        }
    }
}

/// Errors from the completion backend.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("API key not configured (set {0})")]
    MissingApiKey(&'static str),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("API error {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Empty completion response")]
    EmptyResponse,

    #[error("Unparseable completion response: {0}")]
    InvalidResponse(String),
}

impl LlmError {
    /// Whether the fallback loop should try the next model.
    ///
    /// Conflates two signals on purpose, matching production behavior:
    /// the HTTP status (429 rate limit, 503 unavailable) and free-text
    /// wording in the error body.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Http { status, body } => {
                if *status == 429 || *status == 503 {
                    return true;
                }
                let lower = body.to_lowercase();
                lower.contains("over capacity")
                    || lower.contains("temporarily unavailable")
                    || lower.contains("model")
                    || lower.contains("try again")
            }
            LlmError::Timeout(_) | LlmError::Network(_) => false,
            _ => false,
        }
    }
}

/// The seam every remote completion call goes through.
#[async_trait::async_trait]
pub trait ChatCompletion: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_is_retryable() {
        let err = LlmError::Http {
            status: 429,
            body: "rate limit exceeded".into(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn service_unavailable_is_retryable() {
        let err = LlmError::Http {
            status: 503,
            body: String::new(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn capacity_wording_is_retryable_regardless_of_status() {
        let err = LlmError::Http {
            status: 400,
            body: "The system is over capacity, try later".into(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn model_wording_is_retryable() {
        let err = LlmError::Http {
            status: 404,
            body: "The model `llama-x` does not exist".into(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn auth_failure_is_not_retryable() {
        let err = LlmError::Http {
            status: 401,
            body: "invalid api key".into(),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn timeout_is_not_retryable() {
        assert!(!LlmError::Timeout(12).is_retryable());
    }

    #[test]
    fn message_constructors_tag_roles() {
        assert_eq!(ChatMessage::system("a").role, ChatRole::System);
        assert_eq!(ChatMessage::user("b").role, ChatRole::User);
        assert_eq!(ChatMessage::assistant("c").role, ChatRole::Assistant);
    }

    #[test]
    fn roles_serialize_lowercase() {
        let json = serde_json::to_string(&ChatMessage::user("hi")).unwrap();
        assert!(json.contains(r#""role":"user""#));
    }
}
