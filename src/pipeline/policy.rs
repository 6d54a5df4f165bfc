//! Response policy: question classification and reply-style constraints.
//!
//! A cheap regex classifier buckets each message; only when it shrugs
//! ("general") and the message is non-trivial does a single model call get
//! a second opinion. The resulting policy caps reply length, sets tone,
//! and is enforced again after generation.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config;
use crate::llm::{ChatCompletion, ChatMessage, CompletionRequest};

// ──────────────────────────────────────────────
// Classification
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    SimpleInfo,
    Guidance,
    DataQuestion,
    General,
}

impl Classification {
    fn from_label(label: &str) -> Option<Self> {
        match label {
            "simple_info" => Some(Classification::SimpleInfo),
            "guidance" => Some(Classification::Guidance),
            "data_question" => Some(Classification::DataQuestion),
            "general" => Some(Classification::General),
            _ => None,
        }
    }
}

static SIMPLE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^what (is|was|are)",
        r"^how (much|many)",
        r"^when (did|was|is)",
        r"^where",
        r"^who",
        r"\b(latest|current|today|yesterday)\b",
        r"^(bmi|weight|sleep|steps|heart rate|stress)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

/// Numbers, offsets, or aggregate words upgrade a simple question to a
/// data question.
static DATA_UPGRADE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{1,4}|ago|last|past|average|trend").expect("valid regex"));

static GUIDANCE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"how (can|do|should|to)",
        r"help me",
        r"improve|better|increase|decrease|reduce",
        r"advice|recommend|suggest",
        r"should i|can i",
        r"tips|ways|steps",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

// Repetition counts are bounded so hostile input cannot blow up matching.
static DATA_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"average|mean|median",
        r"trend|pattern|change",
        r"increasing|decreasing|rising|falling",
        r"compare|comparison",
        r"[1-9][0-9]{0,2}\s*(day|week|month|year)",
        r"last\s+[1-9][0-9]{0,2}",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

/// Regex-only classification. First table hit wins; simple questions
/// that mention numbers or aggregates are upgraded to data questions.
pub fn classify_heuristics(message: &str) -> Classification {
    if message.trim().is_empty() {
        return Classification::General;
    }

    let lower = message.to_lowercase();

    if SIMPLE_PATTERNS.iter().any(|p| p.is_match(&lower)) {
        if DATA_UPGRADE.is_match(&lower) {
            return Classification::DataQuestion;
        }
        return Classification::SimpleInfo;
    }

    if GUIDANCE_PATTERNS.iter().any(|p| p.is_match(&lower)) {
        return Classification::Guidance;
    }

    if DATA_PATTERNS.iter().any(|p| p.is_match(&lower)) {
        return Classification::DataQuestion;
    }

    Classification::General
}

// ──────────────────────────────────────────────
// Policy
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Direct,
    Supportive,
    Coach,
    Analytical,
}

impl Tone {
    fn instruction(&self) -> &'static str {
        match self {
            Tone::Direct => "Be direct and factual",
            Tone::Supportive => "Be friendly and supportive",
            Tone::Coach => "Be encouraging and motivational",
            Tone::Analytical => "Be clear and analytical",
        }
    }
}

/// Guardrail tier attached to every policy. Only one tier exists today;
/// every classification carries it unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SafetyLevel {
    #[default]
    Standard,
}

/// Caller-supplied verbosity preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    Brief,
    #[default]
    Standard,
    Detailed,
}

/// Style constraints for one reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponsePolicy {
    pub classification: Classification,
    pub tone: Tone,
    pub max_chars: usize,
    pub max_sentences: usize,
    pub allow_bullets: bool,
    pub include_key_takeaway: bool,
    pub format_blocks: bool,
    pub safety_level: SafetyLevel,
}

impl ResponsePolicy {
    /// Base policy for a classification, before verbosity adjustments.
    fn base(classification: Classification) -> Self {
        let mut policy = Self {
            classification,
            tone: Tone::Supportive,
            max_chars: 450,
            max_sentences: 6,
            allow_bullets: true,
            include_key_takeaway: true,
            format_blocks: true,
            safety_level: SafetyLevel::Standard,
        };

        match classification {
            Classification::SimpleInfo => {
                policy.max_chars = 300;
                policy.max_sentences = 4;
                policy.allow_bullets = false;
                policy.include_key_takeaway = false;
                policy.tone = Tone::Direct;
            }
            Classification::Guidance => {
                policy.max_chars = 600;
                policy.max_sentences = 8;
                policy.tone = Tone::Coach;
            }
            Classification::DataQuestion => {
                policy.max_chars = 400;
                policy.max_sentences = 5;
                policy.allow_bullets = false;
                policy.tone = Tone::Analytical;
            }
            Classification::General => {}
        }

        policy
    }

    fn apply_verbosity(&mut self, verbosity: Verbosity) {
        match verbosity {
            Verbosity::Brief => {
                self.max_chars = (self.max_chars as f64 * 0.7).floor() as usize;
                self.max_sentences = (self.max_sentences as f64 * 0.7).floor() as usize;
                self.include_key_takeaway = false;
            }
            Verbosity::Standard => {}
            Verbosity::Detailed => {
                self.max_chars = (self.max_chars as f64 * 1.5).floor() as usize;
                self.max_sentences = (self.max_sentences as f64 * 1.5).floor() as usize;
            }
        }
    }
}

// ──────────────────────────────────────────────
// Engine
// ──────────────────────────────────────────────

const CLASSIFIER_SYSTEM_PROMPT: &str = r#"You are a message classifier. Classify user health questions into one of these types:
- "simple_info": Short factual questions (What is X? When was Y?)
- "guidance": Advice/recommendation requests (How do I improve? Help me with...)
- "data_question": Metric/trend analysis requests (What's my average? Is X increasing?)
- "general": Conversational or unclear intent

Return JSON: {"type": "simple_info|guidance|data_question|general", "confidence": 0.0-1.0}"#;

#[derive(Deserialize)]
struct ClassifierVerdict {
    #[serde(rename = "type")]
    label: String,
    #[allow(dead_code)]
    #[serde(default)]
    confidence: f64,
}

/// Derives reply policies, falling back to a single model call only for
/// non-trivial messages the regex tables cannot place.
pub struct ResponsePolicyEngine {
    client: Arc<dyn ChatCompletion>,
    model: String,
}

impl ResponsePolicyEngine {
    pub fn new(client: Arc<dyn ChatCompletion>) -> Self {
        Self {
            client,
            model: config::DEFAULT_MODELS[0].to_string(),
        }
    }

    /// Classification plus style constraints for one message.
    ///
    /// `_has_resolved_data` rides along for hosts that want to tighten
    /// policies when no data backs the reply; the current tables do not
    /// consult it.
    pub async fn derive(
        &self,
        message: &str,
        _has_resolved_data: bool,
        verbosity: Verbosity,
    ) -> ResponsePolicy {
        let mut classification = classify_heuristics(message);

        if classification == Classification::General && message.len() > 5 {
            classification = self.classify_with_model(message).await;
        }

        tracing::debug!(?classification, "response policy derived");

        let mut policy = ResponsePolicy::base(classification);
        policy.apply_verbosity(verbosity);
        policy
    }

    /// One JSON-mode call; any failure quietly reads as "general".
    async fn classify_with_model(&self, message: &str) -> Classification {
        let request = CompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(CLASSIFIER_SYSTEM_PROMPT),
                ChatMessage::user(message),
            ],
            temperature: 0.0,
            max_tokens: config::CLASSIFY_FALLBACK_MAX_TOKENS,
            json_mode: true,
        };

        match self.client.complete(&request).await {
            Ok(body) => serde_json::from_str::<ClassifierVerdict>(&body)
                .ok()
                .and_then(|v| Classification::from_label(&v.label))
                .unwrap_or(Classification::General),
            Err(err) => {
                tracing::debug!(error = %err, "classifier fallback failed");
                Classification::General
            }
        }
    }
}

// ──────────────────────────────────────────────
// Prompt instructions and enforcement
// ──────────────────────────────────────────────

/// Render the policy as system-prompt instructions.
pub fn format_prompt_instructions(policy: &ResponsePolicy) -> String {
    let mut instructions: Vec<String> = Vec::new();

    instructions.push(policy.tone.instruction().to_string());
    instructions.push(format!(
        "Keep your answer under {} sentences",
        policy.max_sentences
    ));

    if policy.format_blocks {
        instructions.push("Use short paragraphs (2-3 sentences max per block)".to_string());
        instructions.push("Add blank lines between sections".to_string());
    }

    if policy.allow_bullets {
        instructions.push("Use bullet points (with - prefix) for lists".to_string());
    }

    if policy.include_key_takeaway {
        instructions
            .push("End with one \"Key takeaway:\" line summarizing the main point".to_string());
    }

    instructions.push("Never diagnose or say \"you have X\"".to_string());
    instructions.push("Use phrases like \"your data suggests\" or \"looks like\"".to_string());
    instructions
        .push("Recommend seeing a doctor if anything is concerning or unclear".to_string());

    instructions.join(". ") + "."
}

/// Trim a generated reply to the policy's character cap, preferring to cut
/// at the last sentence boundary when one lands late enough.
pub fn enforce_constraints(response: &str, policy: &ResponsePolicy) -> String {
    let chars: Vec<char> = response.chars().collect();
    if chars.len() <= policy.max_chars {
        return response.to_string();
    }

    let truncated: String = chars[..policy.max_chars].iter().collect();

    let cut_point = ['.', '?', '!']
        .iter()
        .filter_map(|c| truncated.rfind(*c))
        .max();

    if let Some(cut) = cut_point {
        let char_pos = truncated[..cut].chars().count();
        if char_pos > (policy.max_chars as f64 * 0.6) as usize {
            return truncated[..=cut].trim().to_string();
        }
    }

    format!("{}...", truncated.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;

    // ── Heuristics ──

    #[test]
    fn short_factual_questions_are_simple_info() {
        assert_eq!(
            classify_heuristics("What is BMI?"),
            Classification::SimpleInfo
        );
        assert_eq!(
            classify_heuristics("when was my checkup"),
            Classification::SimpleInfo
        );
        assert_eq!(
            classify_heuristics("bmi please"),
            Classification::SimpleInfo
        );
    }

    #[test]
    fn numbers_upgrade_simple_to_data_question() {
        assert_eq!(
            classify_heuristics("what is my average sleep"),
            Classification::DataQuestion
        );
        assert_eq!(
            classify_heuristics("what was my bmi 3 days ago"),
            Classification::DataQuestion
        );
    }

    #[test]
    fn advice_requests_are_guidance() {
        assert_eq!(
            classify_heuristics("how can I improve my sleep"),
            Classification::Guidance
        );
        assert_eq!(
            classify_heuristics("help me reduce stress"),
            Classification::Guidance
        );
    }

    #[test]
    fn aggregate_words_alone_are_data_questions() {
        assert_eq!(
            classify_heuristics("show the trend please"),
            Classification::DataQuestion
        );
        assert_eq!(
            classify_heuristics("over 14 days"),
            Classification::DataQuestion
        );
    }

    #[test]
    fn unplaceable_messages_are_general() {
        assert_eq!(classify_heuristics("tell me a story"), Classification::General);
        assert_eq!(classify_heuristics(""), Classification::General);
    }

    // ── Engine ──

    struct ScriptedClassifier {
        reply: Result<String, ()>,
    }

    #[async_trait::async_trait]
    impl ChatCompletion for ScriptedClassifier {
        async fn complete(&self, _request: &CompletionRequest) -> Result<String, LlmError> {
            self.reply.clone().map_err(|_| LlmError::EmptyResponse)
        }
    }

    fn engine_with(reply: Result<String, ()>) -> ResponsePolicyEngine {
        ResponsePolicyEngine::new(Arc::new(ScriptedClassifier { reply }))
    }

    #[tokio::test]
    async fn heuristic_hit_skips_model() {
        // A failing client proves the fallback was never consulted.
        let engine = engine_with(Err(()));
        let policy = engine
            .derive("what is my latest bmi", true, Verbosity::Standard)
            .await;
        assert_eq!(policy.classification, Classification::SimpleInfo);
        assert_eq!(policy.tone, Tone::Direct);
        assert_eq!(policy.max_chars, 300);
        assert_eq!(policy.max_sentences, 4);
        assert!(!policy.allow_bullets);
        assert!(!policy.include_key_takeaway);
    }

    #[tokio::test]
    async fn model_fallback_resolves_general() {
        let engine = engine_with(Ok(
            r#"{"type":"guidance","confidence":0.9}"#.to_string()
        ));
        let policy = engine
            .derive("thinking about my routine", false, Verbosity::Standard)
            .await;
        assert_eq!(policy.classification, Classification::Guidance);
        assert_eq!(policy.max_chars, 600);
        assert_eq!(policy.max_sentences, 8);
        assert_eq!(policy.tone, Tone::Coach);
    }

    #[tokio::test]
    async fn model_failure_reads_as_general() {
        let engine = engine_with(Err(()));
        let policy = engine
            .derive("thinking about my routine", false, Verbosity::Standard)
            .await;
        assert_eq!(policy.classification, Classification::General);
        assert_eq!(policy.max_chars, 450);
        assert_eq!(policy.max_sentences, 6);
    }

    #[tokio::test]
    async fn malformed_verdict_reads_as_general() {
        let engine = engine_with(Ok(r#"{"type":"sonnet"}"#.to_string()));
        let policy = engine
            .derive("thinking about my routine", false, Verbosity::Standard)
            .await;
        assert_eq!(policy.classification, Classification::General);
    }

    #[tokio::test]
    async fn tiny_general_message_skips_model() {
        let engine = engine_with(Ok(
            r#"{"type":"guidance","confidence":0.9}"#.to_string()
        ));
        let policy = engine.derive("ok", false, Verbosity::Standard).await;
        assert_eq!(policy.classification, Classification::General);
    }

    // ── Verbosity ──

    #[tokio::test]
    async fn brief_shrinks_and_drops_takeaway() {
        let engine = engine_with(Err(()));
        let policy = engine
            .derive("how can I improve my sleep", true, Verbosity::Brief)
            .await;
        assert_eq!(policy.max_chars, 420); // floor(600 * 0.7)
        assert_eq!(policy.max_sentences, 5); // floor(8 * 0.7)
        assert!(!policy.include_key_takeaway);
    }

    #[tokio::test]
    async fn detailed_expands_budgets() {
        let engine = engine_with(Err(()));
        let policy = engine
            .derive("how can I improve my sleep", true, Verbosity::Detailed)
            .await;
        assert_eq!(policy.max_chars, 900);
        assert_eq!(policy.max_sentences, 12);
    }

    #[test]
    fn every_classification_carries_standard_safety_level() {
        for classification in [
            Classification::SimpleInfo,
            Classification::Guidance,
            Classification::DataQuestion,
            Classification::General,
        ] {
            let mut policy = ResponsePolicy::base(classification);
            assert_eq!(policy.safety_level, SafetyLevel::Standard);
            // Verbosity adjustments never touch the tier either.
            policy.apply_verbosity(Verbosity::Brief);
            assert_eq!(policy.safety_level, SafetyLevel::Standard);
        }
    }

    #[tokio::test]
    async fn brief_never_exceeds_standard() {
        let engine = engine_with(Err(()));
        for msg in [
            "what is my latest bmi",
            "how can I improve my sleep",
            "show the trend please",
        ] {
            let brief = engine.derive(msg, true, Verbosity::Brief).await;
            let standard = engine.derive(msg, true, Verbosity::Standard).await;
            let detailed = engine.derive(msg, true, Verbosity::Detailed).await;
            assert!(brief.max_chars <= standard.max_chars, "message: {msg}");
            assert!(standard.max_chars <= detailed.max_chars, "message: {msg}");
        }
    }

    // ── Instructions ──

    #[test]
    fn instructions_reflect_policy_switches() {
        let policy = ResponsePolicy::base(Classification::Guidance);
        let text = format_prompt_instructions(&policy);
        assert!(text.contains("Be encouraging and motivational"));
        assert!(text.contains("under 8 sentences"));
        assert!(text.contains("bullet points"));
        assert!(text.contains("Key takeaway:"));
        assert!(text.contains("Never diagnose"));
        assert!(text.ends_with('.'));
    }

    #[test]
    fn simple_info_instructions_omit_bullets_and_takeaway() {
        let policy = ResponsePolicy::base(Classification::SimpleInfo);
        let text = format_prompt_instructions(&policy);
        assert!(!text.contains("bullet points"));
        assert!(!text.contains("Key takeaway:"));
        assert!(text.contains("Be direct and factual"));
    }

    // ── Enforcement ──

    fn tight_policy(max_chars: usize) -> ResponsePolicy {
        let mut policy = ResponsePolicy::base(Classification::General);
        policy.max_chars = max_chars;
        policy
    }

    #[test]
    fn within_budget_passes_through() {
        let policy = tight_policy(100);
        assert_eq!(enforce_constraints("Short reply.", &policy), "Short reply.");
    }

    #[test]
    fn truncates_at_late_sentence_boundary() {
        let policy = tight_policy(50);
        let long = "This is the first sentence which runs long enough. And this trails on far past the cap.";
        let out = enforce_constraints(long, &policy);
        assert_eq!(out, "This is the first sentence which runs long enough.");
    }

    #[test]
    fn early_boundary_falls_back_to_ellipsis() {
        let policy = tight_policy(50);
        let long = "Hm. Then an extremely long unbroken run of words that never pauses for punctuation at all here";
        let out = enforce_constraints(long, &policy);
        assert!(out.ends_with("..."));
        assert!(out.chars().count() <= 53);
    }

    #[test]
    fn enforcement_is_char_boundary_safe() {
        let policy = tight_policy(10);
        let reply = "héllo wörld, this réply is fàr too long to survive";
        let out = enforce_constraints(reply, &policy);
        assert!(out.ends_with("..."));
    }
}
