//! Per-cycle health snapshot
//!
//! The snapshot is what status queries see. Every entry mirrors exactly what
//! the engine decided and what it handed to the dispatcher for that key.

use super::severity::{MetricKind, Severity};
use super::AlertKey;
use crate::alerts::DispatchReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of one key in one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    /// Under threshold
    Healthy,
    /// Breach observed, not yet confirmed by enough consecutive cycles
    Transient,
    /// Confirmed breach, delivered this cycle or suppressed by the dedup window
    Escalated,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Transient => write!(f, "transient"),
            Self::Escalated => write!(f, "escalated"),
        }
    }
}

/// One observed metric or service in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthEntry {
    /// Alert key
    pub key: AlertKey,
    /// Metric kind
    pub kind: MetricKind,
    /// Observed value; `None` when the collector failed
    pub value: Option<f64>,
    /// Threshold the value was compared against
    pub threshold: f64,
    /// Severity tier
    pub severity: Severity,
    /// Healthy / transient / escalated
    pub classification: Classification,
    /// Consecutive breaching cycles after this cycle's decision
    pub failure_count: u32,
    /// Service name, for service probes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    /// Escalated but held back by the dedup window
    #[serde(default)]
    pub suppressed: bool,
    /// Collector fault or cycle timeout reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fault: Option<String>,
    /// A recovery notice was sent this cycle
    #[serde(default)]
    pub recovered: bool,
    /// Dispatch outcome, present when something was sent for this key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery: Option<DispatchReport>,
}

impl HealthEntry {
    /// Whether an alert was handed to the dispatcher this cycle
    pub fn was_dispatched(&self) -> bool {
        self.classification == Classification::Escalated && self.delivery.is_some()
    }
}

/// Result of one evaluation cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    /// Monotonic cycle number, starting at 1
    pub cycle: u64,
    /// When the cycle started evaluating
    pub started_at: DateTime<Utc>,
    /// When the cycle finished (or was cut off)
    pub finished_at: DateTime<Utc>,
    /// Whether `max_runtime_seconds` cut the cycle short
    pub timed_out: bool,
    /// Entries in evaluation order
    pub entries: Vec<HealthEntry>,
}

impl HealthSnapshot {
    /// Look up an entry by key
    pub fn entry(&self, key: &str) -> Option<&HealthEntry> {
        self.entries.iter().find(|e| e.key == key)
    }

    /// Entries with the given classification
    pub fn with_classification(&self, class: Classification) -> Vec<&HealthEntry> {
        self.entries
            .iter()
            .filter(|e| e.classification == class)
            .collect()
    }

    /// Number of alerts actually dispatched this cycle
    pub fn dispatched_count(&self) -> usize {
        self.entries.iter().filter(|e| e.was_dispatched()).count()
    }

    /// True when every entry is healthy
    pub fn is_healthy(&self) -> bool {
        self.entries
            .iter()
            .all(|e| e.classification == Classification::Healthy)
    }

    /// Highest severity among non-healthy entries
    pub fn worst_severity(&self) -> Option<Severity> {
        self.entries
            .iter()
            .filter(|e| e.classification != Classification::Healthy)
            .map(|e| e.severity)
            .max()
    }
}
