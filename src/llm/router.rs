//! Model fallback routing for the final completion call.
//!
//! Models are tried in a fixed priority order. The loop advances on
//! retryable signals (rate limit, capacity, unknown-model wording) and
//! aborts on the first non-retryable error, surfacing the last error
//! when every candidate is exhausted.

use crate::config;

use super::{ChatCompletion, CompletionRequest, LlmError};

/// Fixed-priority model lineup.
#[derive(Debug, Clone)]
pub struct ModelRouter {
    models: Vec<String>,
}

impl ModelRouter {
    pub fn new(models: Vec<String>) -> Self {
        Self { models }
    }

    /// Default lineup, with `GROQ_MODEL` (if set) tried first.
    pub fn default_lineup() -> Self {
        let mut models = Vec::new();
        if let Ok(preferred) = std::env::var(config::ENV_MODEL_OVERRIDE) {
            if !preferred.trim().is_empty() {
                models.push(preferred);
            }
        }
        models.extend(config::DEFAULT_MODELS.iter().map(|m| m.to_string()));
        Self { models }
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    /// Try each model in order until one yields a non-empty reply.
    pub async fn complete_with_fallback(
        &self,
        client: &dyn ChatCompletion,
        base: &CompletionRequest,
    ) -> Result<String, LlmError> {
        let mut last_error = LlmError::EmptyResponse;

        for model in &self.models {
            let mut request = base.clone();
            request.model = model.clone();

            match client.complete(&request).await {
                Ok(reply) => return Ok(reply),
                Err(LlmError::EmptyResponse) => {
                    tracing::warn!(model = %model, "empty completion, trying next model");
                    last_error = LlmError::EmptyResponse;
                }
                Err(e) if e.is_retryable() => {
                    tracing::warn!(model = %model, error = %e, "retryable completion error");
                    last_error = e;
                }
                Err(e) => {
                    tracing::error!(model = %model, error = %e, "completion failed");
                    return Err(e);
                }
            }
        }

        Err(last_error)
    }
}
