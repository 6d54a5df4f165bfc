//! Deterministic ground-truth templates.
//!
//! Every data-backed reply starts from one of these plain-text sentences,
//! built from store results before any model sees the conversation. The
//! model is told to restate, never contradict, this text, so the numbers
//! in the final reply always come from here.

use chrono::NaiveDate;

use crate::metrics::{MetricAverage, MetricField, MetricRecord, MetricTrend, TrendDirection};

use super::intents::{GoalKind, Urgency};

/// "October 3, 2025" style, no zero-padded day.
pub fn format_long_date(date: NaiveDate) -> String {
    date.format("%B %-d, %Y").to_string()
}

fn friendly_lower(metric: MetricField) -> String {
    metric.friendly_name().to_lowercase()
}

/// Latest reading sentence. `None` when the store had nothing.
pub fn latest_metric(metric: MetricField, record: Option<&MetricRecord>) -> Option<String> {
    let record = record?;
    Some(format!(
        "Your latest {} reading is {}, recorded on {}.",
        friendly_lower(metric),
        record.value.render(),
        format_long_date(record.date),
    ))
}

/// Reading on a specific date; a miss still yields text so the reply can
/// say so instead of inventing a number.
pub fn metric_on_date(
    metric: MetricField,
    requested: NaiveDate,
    record: Option<&MetricRecord>,
) -> String {
    match record {
        Some(record) => format!(
            "On {}, your {} was {}.",
            format_long_date(record.date),
            friendly_lower(metric),
            record.value.render(),
        ),
        None => format!(
            "I could not find data for {} on {}. That date may be outside the available data range.",
            metric.field_name(),
            format_long_date(requested),
        ),
    }
}

/// Average over an explicit date range.
pub fn metric_in_range(
    metric: MetricField,
    start: NaiveDate,
    end: NaiveDate,
    records: &[MetricRecord],
) -> String {
    let values: Vec<f64> = records.iter().filter_map(|r| r.value.as_f64()).collect();

    if values.is_empty() {
        return format!(
            "I could not find any {} data between {} and {}.",
            friendly_lower(metric),
            format_long_date(start),
            format_long_date(end),
        );
    }

    let average = values.iter().sum::<f64>() / values.len() as f64;
    format!(
        "Between {} and {}, your average {} was {:.1} (based on {} data points).",
        format_long_date(start),
        format_long_date(end),
        friendly_lower(metric),
        average,
        values.len(),
    )
}

/// Trailing-window average sentence.
pub fn metric_average(metric: MetricField, result: Option<&MetricAverage>) -> Option<String> {
    let result = result?;
    Some(format!(
        "Over the past {} days, your average {} was {:.1} (based on {} data points).",
        result.days,
        friendly_lower(metric),
        result.average,
        result.count,
    ))
}

/// Trend sentence with endpoints and sample count.
pub fn metric_trend(metric: MetricField, result: Option<&MetricTrend>) -> Option<String> {
    let result = result?;
    let trend_word = match result.direction {
        TrendDirection::Increasing => "trending upward",
        TrendDirection::Decreasing => "trending downward",
        TrendDirection::Stable => "remaining stable",
    };
    Some(format!(
        "Your {} is {} over the past {} days. It was {:.1} at the start of the period and is now {:.1} (analyzed {} data points).",
        friendly_lower(metric),
        trend_word,
        result.days,
        result.oldest,
        result.latest,
        result.count,
    ))
}

/// Symptom acknowledgement scaled to urgency.
pub fn symptom(symptom: &str, urgency: Urgency) -> String {
    let urgency_text = match urgency {
        Urgency::Urgent => {
            "This could be serious. If your symptoms are severe or worsening, please seek immediate medical attention or call emergency services."
        }
        Urgency::Moderate => {
            "I understand you are experiencing discomfort. If symptoms persist or worsen, please consult a healthcare professional."
        }
        Urgency::Low => {
            "I hear that you are not feeling well. Here are some general wellness suggestions, but if symptoms continue, consider seeing a doctor."
        }
    };

    format!("You mentioned experiencing {symptom}. {urgency_text}")
}

/// Goal acknowledgement plus canned starting advice. `has_recent_data`
/// flags that store observations exist to personalize against.
pub fn goal(goal: GoalKind, has_recent_data: bool) -> String {
    let advice = match goal {
        GoalKind::WeightLoss => {
            "Weight loss requires a combination of balanced nutrition and regular physical activity."
        }
        GoalKind::WeightGain => {
            "Healthy weight gain involves eating nutrient-dense foods and strength training."
        }
        GoalKind::ImproveSleep => {
            "Improving sleep quality often involves maintaining a consistent schedule and creating a calming bedtime routine."
        }
        GoalKind::IncreaseActivity => {
            "Increasing your activity level can start with small steps, like adding short walks throughout the day."
        }
        GoalKind::LowerStress => {
            "Managing stress effectively involves relaxation techniques, regular exercise, and adequate sleep."
        }
    };

    let mut template = format!("You want to work on {}. {}", goal.label(), advice);
    if has_recent_data {
        template.push_str(" Based on your recent data, I can provide personalized recommendations.");
    }
    template
}
