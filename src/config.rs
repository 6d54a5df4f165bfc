/// Application-level constants
pub const APP_NAME: &str = "CareVibe";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Groq OpenAI-compatible chat completions endpoint.
pub const GROQ_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

/// Environment variable holding the Groq API key.
pub const ENV_API_KEY: &str = "GROQ_API_KEY";

/// Environment variable that, when set, prepends a preferred model
/// to the default lineup.
pub const ENV_MODEL_OVERRIDE: &str = "GROQ_MODEL";

/// Model priority lineup for the completion fallback loop.
/// Tried in order; the loop advances on rate-limit/capacity signals.
pub const DEFAULT_MODELS: &[&str] = &[
    "llama-3.1-8b-instant",
    "llama-3.1-70b-versatile",
    "mixtral-8x7b-32768",
];

/// Bounded timeout for every remote completion request.
pub const REQUEST_TIMEOUT_SECS: u64 = 12;

/// Sampling temperature for the final chat completion.
pub const CHAT_TEMPERATURE: f32 = 0.2;

/// Token budget for the final chat completion (short wellness replies).
pub const CHAT_MAX_TOKENS: u32 = 180;

/// Token budget for the date-extraction fallback call.
pub const DATE_FALLBACK_MAX_TOKENS: u32 = 150;

/// Token budget for the message-classification fallback call.
pub const CLASSIFY_FALLBACK_MAX_TOKENS: u32 = 50;

/// Default tracing filter when RUST_LOG is unset.
pub fn default_log_filter() -> &'static str {
    "carevibe=info"
}
