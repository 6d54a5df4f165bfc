//! Intent detection for health metric queries, symptom reports, lifestyle
//! goals, greetings, and follow-ups.
//!
//! Every check is a keyword/pattern heuristic over the lowercased message,
//! evaluated in a fixed order with first-match-wins semantics. The only
//! asynchronous step is date resolution, which may fall back to a remote
//! model call. The tables are English-only substring heuristics; overlap
//! false positives ("I ache to see you" → symptom) are a known limitation.

use std::sync::LazyLock;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::metrics::MetricField;

use super::dates::{DateResolver, DateSpanKind};
use super::session::SessionContext;

// ──────────────────────────────────────────────
// Vocabulary
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymptomCategory {
    Pain,
    Gastrointestinal,
    Cardiac,
    Neurological,
    Infection,
    Respiratory,
    General,
    Dermatological,
    MentalHealth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Urgent,
    Moderate,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalKind {
    WeightLoss,
    WeightGain,
    ImproveSleep,
    IncreaseActivity,
    LowerStress,
}

impl GoalKind {
    /// Human wording for templates ("weight_loss" → "weight loss").
    pub fn label(&self) -> &'static str {
        match self {
            GoalKind::WeightLoss => "weight loss",
            GoalKind::WeightGain => "weight gain",
            GoalKind::ImproveSleep => "improve sleep",
            GoalKind::IncreaseActivity => "increase activity",
            GoalKind::LowerStress => "lower stress",
        }
    }

    /// Metrics worth pulling when advising on this goal, in priority order.
    pub fn relevant_metrics(&self) -> &'static [MetricField] {
        match self {
            GoalKind::WeightLoss | GoalKind::WeightGain => &[
                MetricField::Weight,
                MetricField::Bmi,
                MetricField::CaloriesBurned,
            ],
            GoalKind::ImproveSleep => &[
                MetricField::SleepDuration,
                MetricField::RemSleep,
                MetricField::SleepInterruptions,
            ],
            GoalKind::IncreaseActivity => &[
                MetricField::Steps,
                MetricField::ExerciseDuration,
                MetricField::CaloriesBurned,
            ],
            GoalKind::LowerStress => &[MetricField::StressLevel, MetricField::SleepDuration],
        }
    }
}

/// Symptom keywords with category and urgency. Scanned longest-first so
/// multi-word phrases beat their single-word substrings.
pub const SYMPTOM_KEYWORDS: &[(&str, SymptomCategory, Urgency)] = &[
    ("pain", SymptomCategory::Pain, Urgency::Moderate),
    ("ache", SymptomCategory::Pain, Urgency::Low),
    ("stomach pain", SymptomCategory::Gastrointestinal, Urgency::Moderate),
    ("chest pain", SymptomCategory::Cardiac, Urgency::Urgent),
    ("headache", SymptomCategory::Neurological, Urgency::Low),
    ("migraine", SymptomCategory::Neurological, Urgency::Moderate),
    ("dizzy", SymptomCategory::Neurological, Urgency::Moderate),
    ("dizziness", SymptomCategory::Neurological, Urgency::Moderate),
    ("nausea", SymptomCategory::Gastrointestinal, Urgency::Moderate),
    ("vomiting", SymptomCategory::Gastrointestinal, Urgency::Moderate),
    ("fever", SymptomCategory::Infection, Urgency::Moderate),
    ("cough", SymptomCategory::Respiratory, Urgency::Low),
    ("shortness of breath", SymptomCategory::Respiratory, Urgency::Urgent),
    ("fatigue", SymptomCategory::General, Urgency::Low),
    ("tired", SymptomCategory::General, Urgency::Low),
    ("exhausted", SymptomCategory::General, Urgency::Moderate),
    ("difficulty breathing", SymptomCategory::Respiratory, Urgency::Urgent),
    ("rash", SymptomCategory::Dermatological, Urgency::Low),
    ("itching", SymptomCategory::Dermatological, Urgency::Low),
    ("swelling", SymptomCategory::General, Urgency::Moderate),
    ("anxiety", SymptomCategory::MentalHealth, Urgency::Moderate),
    ("depression", SymptomCategory::MentalHealth, Urgency::Moderate),
    ("panic attack", SymptomCategory::MentalHealth, Urgency::Urgent),
];

/// Lifestyle-goal phrases in scan order; first substring hit wins.
pub const GOAL_KEYWORDS: &[(&str, GoalKind)] = &[
    ("lose weight", GoalKind::WeightLoss),
    ("weight loss", GoalKind::WeightLoss),
    ("gain weight", GoalKind::WeightGain),
    ("better sleep", GoalKind::ImproveSleep),
    ("sleep better", GoalKind::ImproveSleep),
    ("improve sleep", GoalKind::ImproveSleep),
    ("more active", GoalKind::IncreaseActivity),
    ("be active", GoalKind::IncreaseActivity),
    ("get fit", GoalKind::IncreaseActivity),
    ("reduce stress", GoalKind::LowerStress),
    ("manage stress", GoalKind::LowerStress),
    ("lower stress", GoalKind::LowerStress),
];

/// Phrases that reference the previous exchange.
pub const FOLLOWUP_PHRASES: &[&str] = &[
    "then",
    "that day",
    "that date",
    "same day",
    "same time",
    "what about",
    "how about",
    "also",
];

pub const GREETING_KEYWORDS: &[&str] = &[
    "hi",
    "hello",
    "hey",
    "good morning",
    "good afternoon",
    "good evening",
    "greetings",
    "howdy",
    "what's up",
    "whats up",
];

// ──────────────────────────────────────────────
// Intent
// ──────────────────────────────────────────────

/// The classified purpose of one chat message. Exactly one per message;
/// immutable once constructed. Each carries the raw text for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    Greeting {
        raw: String,
    },
    SymptomReport {
        symptom: String,
        category: SymptomCategory,
        urgency: Urgency,
        raw: String,
    },
    LifestyleGoal {
        goal: GoalKind,
        relevant_metrics: Vec<MetricField>,
        raw: String,
    },
    LatestMetric {
        metric: MetricField,
        raw: String,
    },
    MetricOnDate {
        metric: MetricField,
        date: NaiveDate,
        raw: String,
    },
    MetricInRange {
        metric: MetricField,
        start_date: NaiveDate,
        end_date: NaiveDate,
        raw: String,
    },
    MetricAverage {
        metric: MetricField,
        days: u32,
        raw: String,
    },
    MetricTrend {
        metric: MetricField,
        days: u32,
        raw: String,
    },
}

/// Discriminant of `Intent`, kept in the session context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    Greeting,
    SymptomReport,
    LifestyleGoal,
    LatestMetric,
    MetricOnDate,
    MetricInRange,
    MetricAverage,
    MetricTrend,
}

impl Intent {
    pub fn kind(&self) -> IntentKind {
        match self {
            Intent::Greeting { .. } => IntentKind::Greeting,
            Intent::SymptomReport { .. } => IntentKind::SymptomReport,
            Intent::LifestyleGoal { .. } => IntentKind::LifestyleGoal,
            Intent::LatestMetric { .. } => IntentKind::LatestMetric,
            Intent::MetricOnDate { .. } => IntentKind::MetricOnDate,
            Intent::MetricInRange { .. } => IntentKind::MetricInRange,
            Intent::MetricAverage { .. } => IntentKind::MetricAverage,
            Intent::MetricTrend { .. } => IntentKind::MetricTrend,
        }
    }

    pub fn raw(&self) -> &str {
        match self {
            Intent::Greeting { raw }
            | Intent::SymptomReport { raw, .. }
            | Intent::LifestyleGoal { raw, .. }
            | Intent::LatestMetric { raw, .. }
            | Intent::MetricOnDate { raw, .. }
            | Intent::MetricInRange { raw, .. }
            | Intent::MetricAverage { raw, .. }
            | Intent::MetricTrend { raw, .. } => raw,
        }
    }
}

// ──────────────────────────────────────────────
// Extraction helpers
// ──────────────────────────────────────────────

static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b").expect("valid regex"));

static DAYS_AGO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*days?\s*ago").expect("valid regex"));

static LAST_N_DAYS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"last\s+(\d+)\s+days?").expect("valid regex"));

static PAST_N_DAYS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"past\s+(\d+)\s+days?").expect("valid regex"));

static N_DAY_AVERAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*day\s*average").expect("valid regex"));

/// Map free text onto a metric field via the alias table.
pub fn extract_metric(text: &str) -> Option<MetricField> {
    MetricField::from_text(text)
}

/// Cheap literal date patterns — no resolver, no remote call.
/// ISO dates, yesterday/today, "N days ago", "last week" (≈ 7 days back).
pub fn extract_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    if let Some(caps) = ISO_DATE.captures(text) {
        let parsed = NaiveDate::from_ymd_opt(
            caps[1].parse().ok()?,
            caps[2].parse().ok()?,
            caps[3].parse().ok()?,
        );
        if parsed.is_some() {
            return parsed;
        }
    }

    let lower = text.to_lowercase();

    if lower.contains("yesterday") {
        return Some(today - Duration::days(1));
    }

    if lower.contains("today") {
        return Some(today);
    }

    if let Some(caps) = DAYS_AGO.captures(&lower) {
        let n: i64 = caps[1].parse().ok()?;
        return Some(today - Duration::days(n));
    }

    if lower.contains("last week") {
        return Some(today - Duration::days(7));
    }

    None
}

/// Day-count extraction for averages and trends. Idempotent: the same
/// text always yields the same count.
pub fn extract_days(text: &str) -> Option<u32> {
    let lower = text.to_lowercase();

    if let Some(caps) = LAST_N_DAYS.captures(&lower) {
        return caps[1].parse().ok();
    }

    if let Some(caps) = PAST_N_DAYS.captures(&lower) {
        return caps[1].parse().ok();
    }

    if let Some(caps) = N_DAY_AVERAGE.captures(&lower) {
        return caps[1].parse().ok();
    }

    if lower.contains("last week") || lower.contains("past week") {
        return Some(7);
    }
    if lower.contains("last month") || lower.contains("past month") {
        return Some(30);
    }
    if lower.contains("last 2 weeks") {
        return Some(14);
    }

    None
}

/// Whole-message greeting, or a short message starting with one.
pub fn is_greeting(message: &str) -> bool {
    let lower = message.to_lowercase();
    let lower = lower.trim();
    let clean: String = lower.chars().filter(|c| !matches!(c, '!' | '?' | '.')).collect();
    let clean = clean.trim();

    if GREETING_KEYWORDS.contains(&clean) {
        return true;
    }

    if clean.len() < 20 {
        return GREETING_KEYWORDS.iter().any(|g| lower.starts_with(g));
    }

    false
}

/// Scan the symptom table, longest keyword first.
pub fn detect_symptom(message: &str) -> Option<(&'static str, SymptomCategory, Urgency)> {
    let lower = message.to_lowercase();

    let mut sorted: Vec<_> = SYMPTOM_KEYWORDS.iter().collect();
    sorted.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    sorted
        .into_iter()
        .find(|(keyword, _, _)| lower.contains(keyword))
        .copied()
}

/// Scan the goal table in declaration order.
pub fn detect_goal(message: &str) -> Option<GoalKind> {
    let lower = message.to_lowercase();
    GOAL_KEYWORDS
        .iter()
        .find(|(phrase, _)| lower.contains(phrase))
        .map(|(_, goal)| *goal)
}

/// Whether the message references the previous exchange.
pub fn is_follow_up(message: &str) -> bool {
    let lower = message.to_lowercase();
    FOLLOWUP_PHRASES.iter().any(|p| lower.contains(p))
}

// ──────────────────────────────────────────────
// Classifier
// ──────────────────────────────────────────────

const RECENCY_WORDS: &[&str] = &["latest", "current", "today", "most recent", "today's"];

const TREND_WORDS: &[&str] = &[
    "trend",
    "trending",
    "increasing",
    "decreasing",
    "rising",
    "falling",
    "going up",
    "going down",
    "change",
];

const AVERAGE_WORDS: &[&str] = &["average", "avg", "mean"];

/// Default trailing window when a trend question names no day count.
pub const DEFAULT_TREND_DAYS: u32 = 30;

/// Classifies one message into at most one intent.
///
/// Checks run in a fixed order and the first hit short-circuits:
/// greeting, symptom, goal, follow-up (context only), latest, literal
/// date, resolved date, average, trend.
pub struct IntentClassifier {
    resolver: DateResolver,
}

impl IntentClassifier {
    pub fn new(resolver: DateResolver) -> Self {
        Self { resolver }
    }

    /// Detect the intent of `message`. `context` is the caller's
    /// non-expired session context, if any. Async only because date
    /// resolution may need one remote call.
    pub async fn detect(
        &self,
        message: &str,
        context: Option<&SessionContext>,
        now: DateTime<Utc>,
    ) -> Option<Intent> {
        if message.trim().is_empty() {
            return None;
        }

        let today = now.date_naive();
        let lower = message.to_lowercase();
        let raw = message.to_string();

        if is_greeting(message) {
            return Some(Intent::Greeting { raw });
        }

        if let Some((symptom, category, urgency)) = detect_symptom(message) {
            return Some(Intent::SymptomReport {
                symptom: symptom.to_string(),
                category,
                urgency,
                raw,
            });
        }

        if let Some(goal) = detect_goal(message) {
            return Some(Intent::LifestyleGoal {
                goal,
                relevant_metrics: goal.relevant_metrics().to_vec(),
                raw,
            });
        }

        // Follow-ups inherit the previous metric/date when the message
        // itself doesn't supply fresher ones.
        if let Some(ctx) = context {
            if is_follow_up(message) {
                let metric = extract_metric(message).or(ctx.last_metric);
                let date = extract_date(message, today).or(ctx.last_date);

                match (metric, date) {
                    (Some(metric), Some(date)) => {
                        return Some(Intent::MetricOnDate { metric, date, raw })
                    }
                    (Some(metric), None) => return Some(Intent::LatestMetric { metric, raw }),
                    _ => {}
                }
            }
        }

        let metric = extract_metric(message);

        if let Some(metric) = metric {
            if RECENCY_WORDS.iter().any(|w| lower.contains(w)) {
                return Some(Intent::LatestMetric { metric, raw });
            }
        }

        if let Some(metric) = metric {
            if let Some(date) = extract_date(message, today) {
                return Some(Intent::MetricOnDate { metric, date, raw });
            }
        }

        if let Some(metric) = metric {
            if let Some(resolved) = self.resolver.resolve(message, today).await {
                return Some(match resolved.kind {
                    DateSpanKind::Point => Intent::MetricOnDate {
                        metric,
                        date: resolved.start,
                        raw,
                    },
                    DateSpanKind::Range => Intent::MetricInRange {
                        metric,
                        start_date: resolved.start,
                        end_date: resolved.end,
                        raw,
                    },
                });
            }
        }

        let days = extract_days(message);

        if let Some(metric) = metric {
            if let Some(days) = days {
                if AVERAGE_WORDS.iter().any(|w| lower.contains(w)) {
                    return Some(Intent::MetricAverage { metric, days, raw });
                }
            }
        }

        if let Some(metric) = metric {
            if TREND_WORDS.iter().any(|w| lower.contains(w)) {
                return Some(Intent::MetricTrend {
                    metric,
                    days: days.unwrap_or(DEFAULT_TREND_DAYS),
                    raw,
                });
            }
        }

        None
    }
}
