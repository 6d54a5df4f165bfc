//! Short-lived per-user conversation context.
//!
//! Remembers the last resolved intent so follow-up questions ("what about
//! yesterday?") can inherit the metric or date. Entries expire 10 minutes
//! after the last write, checked lazily on read — there is no background
//! sweep, so cold entries persist until read again or process restart.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};

use crate::metrics::MetricField;

use super::intents::{GoalKind, Intent, IntentKind, SymptomCategory, Urgency};

/// Inactivity window after which a context is treated as absent.
pub const SESSION_TTL_SECS: i64 = 600;

/// What the classifier remembered from the previous message.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionContext {
    pub last_intent: IntentKind,
    pub last_metric: Option<MetricField>,
    pub last_date: Option<NaiveDate>,
    pub last_goal: Option<GoalKind>,
    pub last_symptom: Option<String>,
    pub last_symptom_category: Option<SymptomCategory>,
    pub last_urgency: Option<Urgency>,
    pub timestamp: DateTime<Utc>,
}

impl SessionContext {
    /// Build a context snapshot from a freshly detected intent.
    pub fn from_intent(intent: &Intent, now: DateTime<Utc>) -> Self {
        let mut ctx = Self {
            last_intent: intent.kind(),
            last_metric: None,
            last_date: None,
            last_goal: None,
            last_symptom: None,
            last_symptom_category: None,
            last_urgency: None,
            timestamp: now,
        };

        match intent {
            Intent::Greeting { .. } => {}
            Intent::SymptomReport {
                symptom,
                category,
                urgency,
                ..
            } => {
                ctx.last_symptom = Some(symptom.clone());
                ctx.last_symptom_category = Some(*category);
                ctx.last_urgency = Some(*urgency);
            }
            Intent::LifestyleGoal { goal, .. } => {
                ctx.last_goal = Some(*goal);
            }
            Intent::LatestMetric { metric, .. }
            | Intent::MetricAverage { metric, .. }
            | Intent::MetricTrend { metric, .. } => {
                ctx.last_metric = Some(*metric);
            }
            Intent::MetricOnDate { metric, date, .. } => {
                ctx.last_metric = Some(*metric);
                ctx.last_date = Some(*date);
            }
            Intent::MetricInRange {
                metric, end_date, ..
            } => {
                ctx.last_metric = Some(*metric);
                ctx.last_date = Some(*end_date);
            }
        }

        ctx
    }

    fn expired_at(&self, now: DateTime<Utc>) -> bool {
        (now - self.timestamp).num_seconds() > SESSION_TTL_SECS
    }
}

/// Per-user context map with lazy expiry. Owned by the orchestrator;
/// the classifier only ever sees `Option<&SessionContext>`.
#[derive(Default)]
pub struct SessionStore {
    entries: HashMap<String, SessionContext>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a user's context. A stale entry is deleted here and reported
    /// as absent.
    pub fn get(&mut self, user: &str, now: DateTime<Utc>) -> Option<&SessionContext> {
        if self.entries.get(user).is_some_and(|c| c.expired_at(now)) {
            self.entries.remove(user);
            return None;
        }
        self.entries.get(user)
    }

    /// Overwrite a user's context from a fresh intent, refreshing its
    /// timestamp.
    pub fn record(&mut self, user: &str, intent: &Intent, now: DateTime<Utc>) {
        self.entries
            .insert(user.to_string(), SessionContext::from_intent(intent, now));
    }

    /// Drop every expired entry. Not called by the orchestrator (expiry is
    /// lazy by design); available to hosts that want a periodic sweep.
    pub fn purge_expired(&mut self, now: DateTime<Utc>) {
        self.entries.retain(|_, c| !c.expired_at(now));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
