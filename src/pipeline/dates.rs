//! Free-text date resolution.
//!
//! Two stages: a deterministic parser (typo normalization + fixed regex
//! patterns, anchored at a reference date with a prefer-past bias), then a
//! single JSON-mode model call for phrasings the patterns miss. Network and
//! parse failures on the fallback collapse to "no date found" — this module
//! never errors to its caller.

use std::sync::{Arc, LazyLock};

use chrono::{Datelike, Duration, Months, NaiveDate};
use regex::Regex;
use serde::Deserialize;

use crate::config;
use crate::llm::{ChatCompletion, ChatMessage, CompletionRequest};

/// A deterministic hit must score at least this to skip the model fallback.
pub const DETERMINISTIC_CONFIDENCE_FLOOR: f32 = 0.8;

/// Point in time or span of days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSpanKind {
    Point,
    Range,
}

/// How a resolution was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveStrategy {
    Deterministic,
    ModelAssisted,
}

/// A resolved date or date range. `start <= end` always; a point has
/// `start == end`.
#[derive(Debug, Clone, PartialEq)]
pub struct DateResolution {
    pub kind: DateSpanKind,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub strategy: ResolveStrategy,
    pub confidence: f32,
}

impl DateResolution {
    fn point(date: NaiveDate, strategy: ResolveStrategy, confidence: f32) -> Self {
        Self {
            kind: DateSpanKind::Point,
            start: date,
            end: date,
            strategy,
            confidence,
        }
    }

    fn range(start: NaiveDate, end: NaiveDate, strategy: ResolveStrategy, confidence: f32) -> Self {
        let (start, end) = if start <= end { (start, end) } else { (end, start) };
        Self {
            kind: DateSpanKind::Range,
            start,
            end,
            strategy,
            confidence,
        }
    }
}

// ──────────────────────────────────────────────
// Normalization
// ──────────────────────────────────────────────

/// Ordered typo/abbreviation substitutions. Whole-word, case-insensitive;
/// later rules see the output of earlier ones.
static SUBSTITUTIONS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    let rule = |pattern: &str| Regex::new(pattern).expect("valid substitution regex");
    vec![
        (rule(r"(?i)\b(mouth|mnth|mont)\b"), "month"),
        (rule(r"(?i)\b(yday|ystrday|yestrday)\b"), "yesterday"),
        (rule(r"(?i)\b(tmrw|tomrw|tomorow)\b"), "tomorrow"),
        (rule(r"(?i)\bwk\b"), "week"),
        (rule(r"(?i)\b(dy|dai)\b"), "day"),
        (rule(r"(?i)\b(hr|hrs)\b"), "hour"),
        (rule(r"(?i)\bback\b"), "ago"),
    ]
});

/// Normalize common date typos and informal terms.
pub fn normalize_message(message: &str) -> String {
    let mut normalized = message.to_lowercase();
    for (pattern, replacement) in SUBSTITUTIONS.iter() {
        normalized = pattern.replace_all(&normalized, *replacement).into_owned();
    }
    normalized
}

// ──────────────────────────────────────────────
// Deterministic parsing
// ──────────────────────────────────────────────

static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b").expect("valid regex"));

static UNITS_AGO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,3})\s*(day|week|month|year)s?\s+ago\b").expect("valid regex")
});

static ONE_UNIT_AGO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:a|an|one)\s+(day|week|month|year)\s+ago\b").expect("valid regex")
});

static MONTH_DAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(january|february|march|april|may|june|july|august|september|october|november|december)\s+(\d{1,2})(?:st|nd|rd|th)?(?:,?\s+(\d{4}))?\b",
    )
    .expect("valid regex")
});

fn month_number(name: &str) -> u32 {
    match name {
        "january" => 1,
        "february" => 2,
        "march" => 3,
        "april" => 4,
        "may" => 5,
        "june" => 6,
        "july" => 7,
        "august" => 8,
        "september" => 9,
        "october" => 10,
        "november" => 11,
        _ => 12,
    }
}

fn subtract_units(reference: NaiveDate, count: u32, unit: &str) -> Option<NaiveDate> {
    match unit {
        "day" => Some(reference - Duration::days(count as i64)),
        "week" => Some(reference - Duration::days(7 * count as i64)),
        "month" => reference.checked_sub_months(Months::new(count)),
        "year" => reference.checked_sub_months(Months::new(12 * count)),
        _ => None,
    }
}

/// Monday of the week containing `date`.
fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Parse a normalized message against the fixed pattern list.
/// First matching pattern wins; ambiguity resolves toward the past.
pub fn parse_deterministic(message: &str, reference: NaiveDate) -> Option<DateResolution> {
    let text = normalize_message(message);
    let det = ResolveStrategy::Deterministic;

    if let Some(caps) = ISO_DATE.captures(&text) {
        let (y, m, d) = (
            caps[1].parse().ok()?,
            caps[2].parse().ok()?,
            caps[3].parse().ok()?,
        );
        if let Some(date) = NaiveDate::from_ymd_opt(y, m, d) {
            return Some(DateResolution::point(date, det, 0.95));
        }
    }

    if let Some(caps) = UNITS_AGO.captures(&text) {
        let count: u32 = caps[1].parse().ok()?;
        let date = subtract_units(reference, count, &caps[2])?;
        return Some(DateResolution::point(date, det, 0.9));
    }

    if let Some(caps) = ONE_UNIT_AGO.captures(&text) {
        let date = subtract_units(reference, 1, &caps[1])?;
        return Some(DateResolution::point(date, det, 0.9));
    }

    if text.contains("yesterday") {
        return Some(DateResolution::point(reference - Duration::days(1), det, 0.9));
    }

    if text.contains("today") || text.contains("tonight") {
        return Some(DateResolution::point(reference, det, 0.9));
    }

    if text.contains("tomorrow") {
        return Some(DateResolution::point(reference + Duration::days(1), det, 0.85));
    }

    if text.contains("last week") {
        let start = week_start(reference) - Duration::days(7);
        return Some(DateResolution::range(start, start + Duration::days(6), det, 0.85));
    }

    if text.contains("this week") {
        return Some(DateResolution::range(week_start(reference), reference, det, 0.85));
    }

    if text.contains("last month") {
        let first_of_current = reference.with_day(1)?;
        let end = first_of_current - Duration::days(1);
        let start = end.with_day(1)?;
        return Some(DateResolution::range(start, end, det, 0.85));
    }

    if let Some(caps) = MONTH_DAY.captures(&text) {
        let month = month_number(&caps[1]);
        let day: u32 = caps[2].parse().ok()?;
        if let Some(year_str) = caps.get(3) {
            let year: i32 = year_str.as_str().parse().ok()?;
            let date = NaiveDate::from_ymd_opt(year, month, day)?;
            return Some(DateResolution::point(date, det, 0.9));
        }
        // No year given: a date after the reference means last year.
        let mut date = NaiveDate::from_ymd_opt(reference.year(), month, day)?;
        if date > reference {
            date = NaiveDate::from_ymd_opt(reference.year() - 1, month, day)?;
        }
        return Some(DateResolution::point(date, det, 0.85));
    }

    None
}

// ──────────────────────────────────────────────
// Model fallback
// ──────────────────────────────────────────────

/// Strict JSON contract for the extraction fallback. Validated on
/// receipt; anything malformed collapses to "not found".
#[derive(Debug, Deserialize)]
struct ModelDateExtraction {
    kind: Option<String>,
    #[serde(rename = "startISO")]
    start_iso: Option<String>,
    #[serde(rename = "endISO")]
    end_iso: Option<String>,
    #[allow(dead_code)]
    granularity: Option<String>,
    confidence: Option<f32>,
}

fn extraction_system_prompt(reference: NaiveDate) -> String {
    format!(
        r#"You are a date extraction assistant. Extract date/time references from user messages and return structured JSON.

Current reference date: {reference}

Return JSON with this exact structure:
{{"kind": "point" or "range", "startISO": "YYYY-MM-DD", "endISO": "YYYY-MM-DD", "granularity": "day|week|month|year", "confidence": 0.0 to 1.0}}

If no date is found, return {{"kind": "none", "confidence": 0.0}}"#
    )
}

fn parse_model_extraction(raw: &str) -> Option<DateResolution> {
    let extraction: ModelDateExtraction = match serde_json::from_str(raw) {
        Ok(e) => e,
        Err(e) => {
            tracing::debug!(error = %e, "malformed date extraction JSON");
            return None;
        }
    };

    let kind = extraction.kind.as_deref()?;
    if kind == "none" {
        return None;
    }

    let start = NaiveDate::parse_from_str(extraction.start_iso.as_deref()?, "%Y-%m-%d").ok()?;
    let end = extraction
        .end_iso
        .as_deref()
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
        .unwrap_or(start);
    let confidence = extraction.confidence.unwrap_or(0.7);

    Some(if kind == "range" && end != start {
        DateResolution::range(start, end, ResolveStrategy::ModelAssisted, confidence)
    } else {
        DateResolution::point(start, ResolveStrategy::ModelAssisted, confidence)
    })
}

// ──────────────────────────────────────────────
// Resolver
// ──────────────────────────────────────────────

/// Resolves free-text date phrases: deterministic parse first, at most one
/// model call after.
pub struct DateResolver {
    client: Arc<dyn ChatCompletion>,
    model: String,
}

impl DateResolver {
    pub fn new(client: Arc<dyn ChatCompletion>) -> Self {
        Self {
            client,
            model: config::DEFAULT_MODELS[0].to_string(),
        }
    }

    pub fn with_model(client: Arc<dyn ChatCompletion>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    /// Resolve a date reference in `message`, anchored at `reference`.
    /// Returns `None` when neither stage finds one; never errors.
    pub async fn resolve(&self, message: &str, reference: NaiveDate) -> Option<DateResolution> {
        if message.trim().is_empty() {
            return None;
        }

        if let Some(resolution) = parse_deterministic(message, reference) {
            if resolution.confidence >= DETERMINISTIC_CONFIDENCE_FLOOR {
                tracing::debug!(?resolution, "date resolved deterministically");
                return Some(resolution);
            }
        }

        let request = CompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(extraction_system_prompt(reference)),
                ChatMessage::user(message),
            ],
            temperature: 0.0,
            max_tokens: config::DATE_FALLBACK_MAX_TOKENS,
            json_mode: true,
        };

        match self.client.complete(&request).await {
            Ok(raw) => {
                let resolution = parse_model_extraction(&raw);
                tracing::debug!(?resolution, "date fallback completed");
                resolution
            }
            Err(e) => {
                tracing::debug!(error = %e, "date fallback failed");
                None
            }
        }
    }
}
