//! Severity classification
//!
//! Maps a reading and its threshold to a severity tier. The classifier is a
//! pure, total function: every input, including NaN, yields a tier.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Overshoot below which a breach is only a warning
pub const MEDIUM_OVERSHOOT: f64 = 0.05;

/// Overshoot at which a breach becomes high severity
pub const HIGH_OVERSHOOT: f64 = 0.15;

/// Absolute percentage of capacity that is always high severity
pub const CAPACITY_CEILING: f64 = 95.0;

/// Severity tiers, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Just over threshold
    Warning,
    /// Degraded but functioning
    Medium,
    /// Far over threshold, near capacity, or not responding
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => write!(f, "WARNING"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
        }
    }
}

/// Routing priority of an escalated alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    /// All priorities, most urgent first
    pub const ALL: [Priority; 4] = [
        Priority::Critical,
        Priority::High,
        Priority::Medium,
        Priority::Low,
    ];

    /// Priority implied by a severity tier alone
    pub fn from_severity(severity: Severity) -> Self {
        match severity {
            Severity::High => Self::High,
            Severity::Medium => Self::Medium,
            Severity::Warning => Self::Low,
        }
    }

    /// Lowercase name as used in configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "critical" => Ok(Self::Critical),
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            _ => Err(format!("Unknown priority: {}", s)),
        }
    }
}

/// Kind of monitored quantity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// CPU usage percentage
    Cpu,
    /// Memory usage percentage
    Memory,
    /// Disk usage percentage
    Disk,
    /// Arbitrary numeric gauge with a ratio threshold
    Gauge,
    /// Service response time against a "slow" threshold
    ResponseTime,
    /// Service reachability (1.0 = answering, 0.0 = down)
    Availability,
}

impl MetricKind {
    /// Whether values are percentages of a fixed capacity
    pub fn is_percent(&self) -> bool {
        matches!(self, Self::Cpu | Self::Memory | Self::Disk)
    }

    /// Default routing priority for an escalated alert of this kind
    pub fn default_priority(&self, severity: Severity) -> Priority {
        match self {
            Self::Availability => Priority::Critical,
            Self::Cpu | Self::Memory | Self::Disk => Priority::High,
            Self::ResponseTime => Priority::Medium,
            Self::Gauge => Priority::from_severity(severity),
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Memory => write!(f, "memory"),
            Self::Disk => write!(f, "disk"),
            Self::Gauge => write!(f, "gauge"),
            Self::ResponseTime => write!(f, "response_time"),
            Self::Availability => write!(f, "availability"),
        }
    }
}

/// Whether a reading is at or above its threshold
///
/// Availability readings breach when the service is not answering.
pub fn is_breach(kind: MetricKind, value: f64, threshold: f64) -> bool {
    if value.is_nan() {
        return true;
    }
    match kind {
        MetricKind::Availability => value < 1.0,
        _ => value >= threshold,
    }
}

/// Classify a reading into a severity tier
pub fn classify(kind: MetricKind, value: f64, threshold: f64) -> Severity {
    if value.is_nan() {
        return Severity::High;
    }

    match kind {
        MetricKind::Availability => {
            if value < 1.0 {
                Severity::High
            } else {
                Severity::Warning
            }
        }
        // Slow but answering; "down" is reported through the availability key
        MetricKind::ResponseTime => {
            if value.is_infinite() {
                Severity::High
            } else if value >= threshold {
                Severity::Medium
            } else {
                Severity::Warning
            }
        }
        MetricKind::Cpu | MetricKind::Memory | MetricKind::Disk | MetricKind::Gauge => {
            if kind.is_percent() && value >= CAPACITY_CEILING {
                return Severity::High;
            }
            if threshold.is_nan() || threshold <= 0.0 || threshold.is_infinite() {
                return if value > threshold {
                    Severity::High
                } else {
                    Severity::Warning
                };
            }
            let overshoot = (value - threshold) / threshold;
            if overshoot >= HIGH_OVERSHOOT {
                Severity::High
            } else if overshoot >= MEDIUM_OVERSHOOT {
                Severity::Medium
            } else {
                Severity::Warning
            }
        }
    }
}
