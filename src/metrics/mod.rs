//! Biometric metric fields and the metrics-store seam.
//!
//! `MetricField` is a closed enumeration of the fields the assistant can
//! answer about. Free-text aliases map many-to-one onto fields; the alias
//! table is scanned in declaration order and the first substring hit wins
//! (no longest-match guarantee — longer aliases must be listed earlier if
//! they should shadow shorter ones).

pub mod memory;

pub use memory::MemoryMetricStore;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Closed set of biometric fields known to the assistant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricField {
    Weight,
    Bmi,
    SleepDuration,
    RemSleep,
    SleepInterruptions,
    Steps,
    ExerciseDuration,
    StressLevel,
    RestingHeartRate,
    BloodPressure,
    Spo2,
    BodyTemperature,
    CaloriesBurned,
    ActivityLevel,
    SmokingStatus,
    AlcoholConsumption,
}

/// Free-text aliases in scan order. Many-to-one, first match wins.
pub const METRIC_ALIASES: &[(&str, MetricField)] = &[
    ("weight", MetricField::Weight),
    ("body weight", MetricField::Weight),
    ("weight kg", MetricField::Weight),
    ("bmi", MetricField::Bmi),
    ("body mass index", MetricField::Bmi),
    ("sleep", MetricField::SleepDuration),
    ("sleep duration", MetricField::SleepDuration),
    ("sleep hours", MetricField::SleepDuration),
    ("hours of sleep", MetricField::SleepDuration),
    ("rem sleep", MetricField::RemSleep),
    ("rem", MetricField::RemSleep),
    ("sleep interruptions", MetricField::SleepInterruptions),
    ("interruptions", MetricField::SleepInterruptions),
    ("steps", MetricField::Steps),
    ("step count", MetricField::Steps),
    ("daily steps", MetricField::Steps),
    ("steps count", MetricField::Steps),
    ("exercise", MetricField::ExerciseDuration),
    ("exercise duration", MetricField::ExerciseDuration),
    ("exercise time", MetricField::ExerciseDuration),
    ("workout duration", MetricField::ExerciseDuration),
    ("stress", MetricField::StressLevel),
    ("stress level", MetricField::StressLevel),
    ("heart rate", MetricField::RestingHeartRate),
    ("resting heart rate", MetricField::RestingHeartRate),
    ("hr", MetricField::RestingHeartRate),
    ("bpm", MetricField::RestingHeartRate),
    ("blood pressure", MetricField::BloodPressure),
    ("bp", MetricField::BloodPressure),
    ("spo2", MetricField::Spo2),
    ("oxygen saturation", MetricField::Spo2),
    ("blood oxygen", MetricField::Spo2),
    ("temperature", MetricField::BodyTemperature),
    ("body temperature", MetricField::BodyTemperature),
    ("body temp", MetricField::BodyTemperature),
    ("calories", MetricField::CaloriesBurned),
    ("calories burned", MetricField::CaloriesBurned),
    ("activity level", MetricField::ActivityLevel),
    ("smoking", MetricField::SmokingStatus),
    ("alcohol", MetricField::AlcoholConsumption),
];

impl MetricField {
    /// Storage field name (camelCase key in the metrics collection).
    pub fn field_name(&self) -> &'static str {
        match self {
            MetricField::Weight => "weightKg",
            MetricField::Bmi => "bmi",
            MetricField::SleepDuration => "sleepDurationHr",
            MetricField::RemSleep => "remSleepHr",
            MetricField::SleepInterruptions => "sleepInterruptions",
            MetricField::Steps => "stepCount",
            MetricField::ExerciseDuration => "exerciseDurationMin",
            MetricField::StressLevel => "stressLevel",
            MetricField::RestingHeartRate => "restingHeartRateBpm",
            MetricField::BloodPressure => "bloodPressureMmHg",
            MetricField::Spo2 => "spo2Percent",
            MetricField::BodyTemperature => "bodyTemperatureC",
            MetricField::CaloriesBurned => "caloriesBurned",
            MetricField::ActivityLevel => "physicalActivityLevel",
            MetricField::SmokingStatus => "smokingStatus",
            MetricField::AlcoholConsumption => "alcoholConsumption",
        }
    }

    /// Human-readable form: a space before each internal capital, first
    /// letter capitalized ("sleepDurationHr" → "Sleep Duration Hr").
    pub fn friendly_name(&self) -> String {
        let mut out = String::new();
        for (i, c) in self.field_name().chars().enumerate() {
            if i == 0 {
                out.extend(c.to_uppercase());
            } else {
                if c.is_ascii_uppercase() {
                    out.push(' ');
                }
                out.push(c);
            }
        }
        out
    }

    /// Map free text onto a field via the alias table.
    /// Case-insensitive substring scan in table order.
    pub fn from_text(text: &str) -> Option<MetricField> {
        let lower = text.to_lowercase();
        METRIC_ALIASES
            .iter()
            .find(|(alias, _)| lower.contains(alias))
            .map(|(_, field)| *field)
    }
}

/// A recorded metric value. Blood pressure and lifestyle fields are
/// stored as text; everything else is numeric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl MetricValue {
    /// Render for templating: floats to one decimal place, integers and
    /// text as-is.
    pub fn render(&self) -> String {
        match self {
            MetricValue::Float(v) => format!("{v:.1}"),
            MetricValue::Int(v) => v.to_string(),
            MetricValue::Text(s) => s.clone(),
        }
    }

    /// Numeric view, if any (used by averaging and trend analysis).
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Float(v) => Some(*v),
            MetricValue::Int(v) => Some(*v as f64),
            MetricValue::Text(_) => None,
        }
    }
}

/// One observation of a metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub value: MetricValue,
    pub date: NaiveDate,
}

/// Average over the trailing window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricAverage {
    pub average: f64,
    pub count: usize,
    pub days: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

/// Trend over the trailing window: boundary values plus direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricTrend {
    pub direction: TrendDirection,
    pub slope: f64,
    pub latest: f64,
    pub oldest: f64,
    pub count: usize,
    pub days: u32,
}

/// Metrics store lookup seam. `today` is passed in so callers (and tests)
/// control the clock; windows are computed relative to it.
pub trait MetricStore: Send + Sync {
    /// Most recent observation of a metric, if any.
    fn latest(&self, user: &str, metric: MetricField) -> Option<MetricRecord>;

    /// Observation on an exact calendar date.
    fn on_date(&self, user: &str, metric: MetricField, date: NaiveDate) -> Option<MetricRecord>;

    /// Observations within `[start, end]` inclusive, newest first.
    fn in_range(
        &self,
        user: &str,
        metric: MetricField,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Vec<MetricRecord>;

    /// Average over the past `days` days, or `None` without numeric data.
    fn average(
        &self,
        user: &str,
        metric: MetricField,
        days: u32,
        today: NaiveDate,
    ) -> Option<MetricAverage>;

    /// Trend over the past `days` days, or `None` with fewer than two
    /// numeric samples.
    fn trend(
        &self,
        user: &str,
        metric: MetricField,
        days: u32,
        today: NaiveDate,
    ) -> Option<MetricTrend>;
}
