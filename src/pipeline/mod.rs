pub mod dates;
pub mod intents;
pub mod orchestrator;
pub mod policy;
pub mod prompt;
pub mod sanitize;
pub mod session;
pub mod template;
