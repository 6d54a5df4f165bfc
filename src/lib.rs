//! CareVibe chat core.
//!
//! The natural-language pipeline behind the CareVibe wellness assistant:
//! - `pipeline::intents` — classify a user message into one tagged intent
//! - `pipeline::dates` — resolve free-text date phrases, model fallback last
//! - `pipeline::policy` — derive reply tone/length/format constraints
//! - `pipeline::template` — deterministic ground-truth sentences from data
//! - `pipeline::orchestrator` — wire it all together per chat message
//!
//! Collaborator seams (`llm::ChatCompletion`, `metrics::MetricStore`) are
//! traits so tests run against mocks and an in-memory store.

pub mod config;
pub mod llm;
pub mod metrics;
pub mod pipeline;

use tracing_subscriber::EnvFilter;

/// Initialize tracing for binaries embedding this crate.
/// `RUST_LOG` wins; otherwise falls back to the crate default.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("CareVibe chat core v{}", config::APP_VERSION);
}
