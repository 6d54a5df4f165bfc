//! In-memory metrics store.
//!
//! Backs the demo deployment and the test suites. Real deployments put a
//! database behind the `MetricStore` trait; the trend/average math here
//! matches what the production queries compute.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{Duration, NaiveDate};

use super::{
    MetricAverage, MetricField, MetricRecord, MetricStore, MetricTrend, MetricValue,
    TrendDirection,
};

#[derive(Debug, Clone)]
struct Observation {
    metric: MetricField,
    date: NaiveDate,
    value: MetricValue,
}

/// Metrics kept in a per-user vector, interior-mutable so the store can be
/// shared behind an `Arc`.
#[derive(Default)]
pub struct MemoryMetricStore {
    data: RwLock<HashMap<String, Vec<Observation>>>,
}

impl MemoryMetricStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one observation.
    pub fn insert(&self, user: &str, metric: MetricField, date: NaiveDate, value: MetricValue) {
        let mut data = self.data.write().expect("metric store lock");
        data.entry(user.to_string())
            .or_default()
            .push(Observation { metric, date, value });
    }

    /// Whether a user has any observations at all (used to flag that
    /// personalized advice is possible).
    pub fn has_any_data(&self, user: &str) -> bool {
        let data = self.data.read().expect("metric store lock");
        data.get(user).is_some_and(|obs| !obs.is_empty())
    }

    fn collect(
        &self,
        user: &str,
        metric: MetricField,
        mut keep: impl FnMut(NaiveDate) -> bool,
    ) -> Vec<MetricRecord> {
        let data = self.data.read().expect("metric store lock");
        let mut records: Vec<MetricRecord> = data
            .get(user)
            .into_iter()
            .flatten()
            .filter(|o| o.metric == metric && keep(o.date))
            .map(|o| MetricRecord {
                value: o.value.clone(),
                date: o.date,
            })
            .collect();
        // Newest first, matching the date-descending production queries.
        records.sort_by(|a, b| b.date.cmp(&a.date));
        records
    }

    /// Stability threshold below which a slope reads as "stable".
    /// Scaled to the typical magnitude of each metric family.
    fn stability_threshold(metric: MetricField) -> f64 {
        match metric {
            MetricField::Steps | MetricField::CaloriesBurned => 100.0,
            MetricField::Weight | MetricField::Bmi => 0.3,
            MetricField::SleepDuration | MetricField::RemSleep => 0.2,
            MetricField::RestingHeartRate | MetricField::StressLevel => 2.0,
            _ => 0.1,
        }
    }
}

impl MetricStore for MemoryMetricStore {
    fn latest(&self, user: &str, metric: MetricField) -> Option<MetricRecord> {
        self.collect(user, metric, |_| true).into_iter().next()
    }

    fn on_date(&self, user: &str, metric: MetricField, date: NaiveDate) -> Option<MetricRecord> {
        self.collect(user, metric, |d| d == date).into_iter().next()
    }

    fn in_range(
        &self,
        user: &str,
        metric: MetricField,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Vec<MetricRecord> {
        self.collect(user, metric, |d| d >= start && d <= end)
    }

    fn average(
        &self,
        user: &str,
        metric: MetricField,
        days: u32,
        today: NaiveDate,
    ) -> Option<MetricAverage> {
        let cutoff = today - Duration::days(days as i64);
        let values: Vec<f64> = self
            .collect(user, metric, |d| d >= cutoff)
            .iter()
            .filter_map(|r| r.value.as_f64())
            .collect();

        if values.is_empty() {
            return None;
        }

        let average = values.iter().sum::<f64>() / values.len() as f64;
        Some(MetricAverage {
            average,
            count: values.len(),
            days,
        })
    }

    fn trend(
        &self,
        user: &str,
        metric: MetricField,
        days: u32,
        today: NaiveDate,
    ) -> Option<MetricTrend> {
        let cutoff = today - Duration::days(days as i64);
        // Newest first: values[0] is the latest sample.
        let values: Vec<f64> = self
            .collect(user, metric, |d| d >= cutoff)
            .iter()
            .filter_map(|r| r.value.as_f64())
            .collect();

        if values.len() < 2 {
            return None;
        }

        let latest = values[0];
        let oldest = values[values.len() - 1];
        let delta = latest - oldest;
        let slope = delta / values.len() as f64;

        let direction = if slope.abs() > Self::stability_threshold(metric) {
            if delta > 0.0 {
                TrendDirection::Increasing
            } else {
                TrendDirection::Decreasing
            }
        } else {
            TrendDirection::Stable
        };

        Some(MetricTrend {
            direction,
            slope,
            latest,
            oldest,
            count: values.len(),
            days,
        })
    }
}
