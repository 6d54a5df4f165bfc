//! Chat orchestration: one entry point wiring the whole pipeline.
//!
//! `handle_message` classifies the message, pulls the backing data,
//! renders the ground-truth template, derives the reply policy, and only
//! then talks to the model through the fallback router. Remote failures
//! never surface as errors; the caller always gets a reply, degraded to a
//! fixed fallback sentence with a warning attached.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config;
use crate::llm::{ChatCompletion, ChatMessage, CompletionRequest, ModelRouter};
use crate::metrics::MetricStore;

use super::dates::DateResolver;
use super::intents::{Intent, IntentClassifier, IntentKind};
use super::policy::{self, ResponsePolicyEngine, Verbosity};
use super::prompt;
use super::sanitize;
use super::session::SessionStore;
use super::template;

/// Served whenever every model in the lineup failed.
pub const FALLBACK_REPLY: &str = "I am experiencing a slow connection right now. \
Please try again in a moment or consult a healthcare professional for urgent concerns.";

/// Conversation memory depth per user (12 turns).
const MAX_MEMORY_MESSAGES: usize = 24;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("message is required")]
    EmptyMessage,
}

/// What the host hands back to its client.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub reply: String,
    /// Set when the reply is the degraded fallback; carries the last
    /// remote error for the host to log or display.
    pub warning: Option<String>,
    pub intent: Option<IntentKind>,
}

/// Owns the session store and conversation memory; everything else it
/// holds is shared or stateless.
pub struct ChatOrchestrator {
    client: Arc<dyn ChatCompletion>,
    router: ModelRouter,
    classifier: IntentClassifier,
    policy_engine: ResponsePolicyEngine,
    store: Arc<dyn MetricStore>,
    sessions: Mutex<SessionStore>,
    conversations: Mutex<HashMap<String, Vec<ChatMessage>>>,
}

impl ChatOrchestrator {
    pub fn new(
        client: Arc<dyn ChatCompletion>,
        store: Arc<dyn MetricStore>,
        router: ModelRouter,
    ) -> Self {
        Self {
            classifier: IntentClassifier::new(DateResolver::new(client.clone())),
            policy_engine: ResponsePolicyEngine::new(client.clone()),
            client,
            router,
            store,
            sessions: Mutex::new(SessionStore::new()),
            conversations: Mutex::new(HashMap::new()),
        }
    }

    /// Handle one chat message for `user_id` ("anonymous" for guests).
    ///
    /// An empty message is the only hard error. Everything downstream
    /// degrades to `FALLBACK_REPLY` with a warning.
    pub async fn handle_message(
        &self,
        user_id: &str,
        message: &str,
        verbosity: Verbosity,
        now: DateTime<Utc>,
    ) -> Result<ChatReply, ChatError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        // Snapshot the context outside the await below.
        let context = {
            let mut sessions = self.sessions.lock().await;
            sessions.get(user_id, now).cloned()
        };

        let intent = self.classifier.detect(message, context.as_ref(), now).await;

        if let Some(ref intent) = intent {
            self.sessions.lock().await.record(user_id, intent, now);
        }

        let ground_truth = self.build_ground_truth(user_id, intent.as_ref(), now);

        let policy = self
            .policy_engine
            .derive(message, ground_truth.is_some(), verbosity)
            .await;
        let instructions = policy::format_prompt_instructions(&policy);
        let system = prompt::build_system_prompt(&instructions, ground_truth.as_deref(), None);

        let history = {
            let conversations = self.conversations.lock().await;
            conversations.get(user_id).cloned().unwrap_or_default()
        };

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(system));
        messages.extend(history);
        messages.push(ChatMessage::user(message));

        let request = CompletionRequest::for_router(
            messages,
            config::CHAT_TEMPERATURE,
            config::CHAT_MAX_TOKENS,
        );

        match self
            .router
            .complete_with_fallback(self.client.as_ref(), &request)
            .await
        {
            Ok(reply) => {
                let mut formatted = sanitize::sanitize_phrases(&reply);
                if verbosity == Verbosity::Brief {
                    formatted = sanitize::enforce_brief_style(&formatted);
                }
                let formatted = policy::enforce_constraints(&formatted, &policy);

                self.remember_exchange(user_id, message, &formatted).await;

                Ok(ChatReply {
                    reply: formatted,
                    warning: None,
                    intent: intent.map(|i| i.kind()),
                })
            }
            Err(err) => {
                tracing::warn!(user = %user_id, error = %err, "all models failed, serving fallback");
                Ok(ChatReply {
                    reply: FALLBACK_REPLY.to_string(),
                    warning: Some(err.to_string()),
                    intent: intent.map(|i| i.kind()),
                })
            }
        }
    }

    /// Render the deterministic template for a data-backed intent.
    /// Greetings and unclassified messages carry no ground truth.
    fn build_ground_truth(
        &self,
        user_id: &str,
        intent: Option<&Intent>,
        now: DateTime<Utc>,
    ) -> Option<String> {
        let today = now.date_naive();

        match intent? {
            Intent::Greeting { .. } => None,
            Intent::SymptomReport {
                symptom, urgency, ..
            } => Some(template::symptom(symptom, *urgency)),
            Intent::LifestyleGoal { goal, .. } => {
                let has_recent = goal
                    .relevant_metrics()
                    .iter()
                    .any(|m| self.store.latest(user_id, *m).is_some());
                Some(template::goal(*goal, has_recent))
            }
            Intent::LatestMetric { metric, .. } => {
                let record = self.store.latest(user_id, *metric);
                template::latest_metric(*metric, record.as_ref())
            }
            Intent::MetricOnDate { metric, date, .. } => {
                let record = self.store.on_date(user_id, *metric, *date);
                Some(template::metric_on_date(*metric, *date, record.as_ref()))
            }
            Intent::MetricInRange {
                metric,
                start_date,
                end_date,
                ..
            } => {
                let records = self.store.in_range(user_id, *metric, *start_date, *end_date);
                Some(template::metric_in_range(
                    *metric,
                    *start_date,
                    *end_date,
                    &records,
                ))
            }
            Intent::MetricAverage { metric, days, .. } => {
                let result = self.store.average(user_id, *metric, *days, today);
                template::metric_average(*metric, result.as_ref())
            }
            Intent::MetricTrend { metric, days, .. } => {
                let result = self.store.trend(user_id, *metric, *days, today);
                template::metric_trend(*metric, result.as_ref())
            }
        }
    }

    /// Append the exchange to conversation memory, pruning oldest-first.
    /// Skipped on fallback replies so degraded text never pollutes later
    /// prompts.
    async fn remember_exchange(&self, user_id: &str, message: &str, reply: &str) {
        let mut conversations = self.conversations.lock().await;
        let history = conversations.entry(user_id.to_string()).or_default();
        history.push(ChatMessage::user(message));
        history.push(ChatMessage::assistant(reply));
        if history.len() > MAX_MEMORY_MESSAGES {
            let excess = history.len() - MAX_MEMORY_MESSAGES;
            history.drain(..excess);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use crate::metrics::{MemoryMetricStore, MetricField, MetricValue};
    use chrono::NaiveDate;
    use std::sync::Mutex as StdMutex;

    /// Replies with a fixed string on every call, recording the requests.
    struct EchoClient {
        reply: Result<String, &'static str>,
        requests: StdMutex<Vec<CompletionRequest>>,
    }

    impl EchoClient {
        fn ok(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                requests: StdMutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                reply: Err("invalid api key"),
                requests: StdMutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl ChatCompletion for EchoClient {
        async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
            self.requests.lock().unwrap().push(request.clone());
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(body) => Err(LlmError::Http {
                    status: 401,
                    body: body.to_string(),
                }),
            }
        }
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-11-03T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn seeded_store() -> Arc<MemoryMetricStore> {
        let store = MemoryMetricStore::new();
        store.insert("u1", MetricField::Bmi, date(2025, 10, 3), MetricValue::Float(22.8));
        store.insert("u1", MetricField::Bmi, date(2025, 10, 5), MetricValue::Float(22.6));
        Arc::new(store)
    }

    fn orchestrator_with(client: Arc<EchoClient>) -> ChatOrchestrator {
        ChatOrchestrator::new(
            client,
            seeded_store(),
            ModelRouter::new(vec!["model-a".into()]),
        )
    }

    #[tokio::test]
    async fn empty_message_is_the_only_hard_error() {
        let orchestrator = orchestrator_with(Arc::new(EchoClient::ok("hi")));
        let err = orchestrator
            .handle_message("u1", "   ", Verbosity::Standard, now())
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::EmptyMessage));
    }

    #[tokio::test]
    async fn data_question_injects_ground_truth() {
        let client = Arc::new(EchoClient::ok("Your bmi was 22.8 that day."));
        let orchestrator = orchestrator_with(client.clone());

        let reply = orchestrator
            .handle_message("u1", "what was my bmi on 2025-10-03", Verbosity::Standard, now())
            .await
            .unwrap();

        assert_eq!(reply.intent, Some(IntentKind::MetricOnDate));
        assert!(reply.warning.is_none());

        // The final completion request carries the template verbatim.
        let requests = client.requests.lock().unwrap();
        let system = &requests.last().unwrap().messages[0].content;
        assert!(system.contains("On October 3, 2025, your bmi was 22.8."));
    }

    #[tokio::test]
    async fn remote_failure_degrades_to_fallback_reply() {
        let orchestrator = orchestrator_with(Arc::new(EchoClient::failing()));

        let reply = orchestrator
            .handle_message("u1", "what is my latest bmi", Verbosity::Standard, now())
            .await
            .unwrap();

        assert_eq!(reply.reply, FALLBACK_REPLY);
        assert!(reply.warning.unwrap().contains("invalid api key"));
        assert_eq!(reply.intent, Some(IntentKind::LatestMetric));
    }

    #[tokio::test]
    async fn replies_are_sanitized() {
        let client = Arc::new(EchoClient::ok(
            "As an AI, I think your bmi looks steady.",
        ));
        let orchestrator = orchestrator_with(client);

        let reply = orchestrator
            .handle_message("u1", "what is my latest bmi", Verbosity::Standard, now())
            .await
            .unwrap();
        assert!(!reply.reply.to_lowercase().contains("as an ai"));
        assert!(reply.reply.contains("your bmi looks steady"));
    }

    #[tokio::test]
    async fn conversation_memory_feeds_later_prompts() {
        let client = Arc::new(EchoClient::ok("Noted."));
        let orchestrator = orchestrator_with(client.clone());

        orchestrator
            .handle_message("u1", "what is my latest bmi", Verbosity::Standard, now())
            .await
            .unwrap();
        orchestrator
            .handle_message("u1", "what is my latest weight", Verbosity::Standard, now())
            .await
            .unwrap();

        let requests = client.requests.lock().unwrap();
        let second = requests.last().unwrap();
        // system + 2 remembered messages + new user message
        assert_eq!(second.messages.len(), 4);
        assert_eq!(second.messages[1].content, "what is my latest bmi");
        assert_eq!(second.messages[2].content, "Noted.");
    }

    #[tokio::test]
    async fn fallback_replies_are_not_remembered() {
        let orchestrator = orchestrator_with(Arc::new(EchoClient::failing()));
        orchestrator
            .handle_message("u1", "what is my latest bmi", Verbosity::Standard, now())
            .await
            .unwrap();

        let conversations = orchestrator.conversations.lock().await;
        assert!(conversations.get("u1").is_none());
    }

    #[tokio::test]
    async fn memory_is_pruned_to_twelve_turns() {
        let client = Arc::new(EchoClient::ok("ok"));
        let orchestrator = orchestrator_with(client);

        for i in 0..20 {
            orchestrator
                .handle_message("u1", &format!("what is my latest bmi {i}"), Verbosity::Standard, now())
                .await
                .unwrap();
        }

        let conversations = orchestrator.conversations.lock().await;
        let history = conversations.get("u1").unwrap();
        assert_eq!(history.len(), MAX_MEMORY_MESSAGES);
        // Oldest messages dropped first.
        assert!(history[0].content.contains("bmi 8"));
    }

    #[tokio::test]
    async fn follow_up_uses_recorded_session_context() {
        let client = Arc::new(EchoClient::ok("ok"));
        let orchestrator = orchestrator_with(client);

        orchestrator
            .handle_message("u1", "what was my bmi on 2025-10-03", Verbosity::Standard, now())
            .await
            .unwrap();
        let reply = orchestrator
            .handle_message("u1", "what about my weight that day", Verbosity::Standard, now())
            .await
            .unwrap();

        assert_eq!(reply.intent, Some(IntentKind::MetricOnDate));
    }

    #[tokio::test]
    async fn month_ago_phrase_resolves_without_extra_calls() {
        let client = Arc::new(EchoClient::ok("Your bmi was 22.8 a month back."));
        let orchestrator = orchestrator_with(client.clone());

        let reply = orchestrator
            .handle_message("u1", "what was my bmi a month ago", Verbosity::Standard, now())
            .await
            .unwrap();
        assert_eq!(reply.intent, Some(IntentKind::MetricOnDate));

        // Deterministic date parse plus a heuristic policy hit: the only
        // remote call is the final completion.
        let requests = client.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let system = &requests[0].messages[0].content;
        assert!(system.contains("On October 3, 2025, your bmi was 22.8."));
    }

    #[tokio::test]
    async fn brief_verbosity_tightens_the_reply() {
        let wordy = (0..10)
            .map(|i| format!("Line number {i} with some filler text."))
            .collect::<Vec<_>>()
            .join("\n");
        let client = Arc::new(EchoClient::ok(&wordy));
        let orchestrator = orchestrator_with(client);

        let reply = orchestrator
            .handle_message("u1", "what is my latest bmi", Verbosity::Brief, now())
            .await
            .unwrap();
        // Brief policy for simple_info: floor(300 * 0.7) chars.
        assert!(reply.reply.chars().count() <= 210);
        assert!(reply.reply.lines().count() <= 4);
    }

    #[tokio::test]
    async fn greeting_has_no_ground_truth() {
        let client = Arc::new(EchoClient::ok("Hello! How can I help?"));
        let orchestrator = orchestrator_with(client.clone());

        let reply = orchestrator
            .handle_message("u1", "hello", Verbosity::Standard, now())
            .await
            .unwrap();
        assert_eq!(reply.intent, Some(IntentKind::Greeting));

        let requests = client.requests.lock().unwrap();
        let system = &requests.last().unwrap().messages[0].content;
        assert!(!system.contains("Ground truth"));
    }
}
