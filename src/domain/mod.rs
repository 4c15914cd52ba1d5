//! Domain models for vigil
//!
//! Severity tiers, routing priorities, metric kinds and the per-cycle
//! health snapshot.

pub mod severity;
pub mod snapshot;

pub use severity::{classify, is_breach, MetricKind, Priority, Severity};
pub use snapshot::{Classification, HealthEntry, HealthSnapshot};

/// Stable identifier for one monitored condition
pub type AlertKey = String;

/// Key used for whole-cycle failures (timeouts)
pub const MONITORING_FAILURE: &str = "monitoring_failure";

/// Key used when the collector for `probe_key` fails
pub fn monitoring_failure_key(probe_key: &str) -> AlertKey {
    format!("{}_{}", MONITORING_FAILURE, probe_key)
}

/// Key of the "answering slowly" condition for a service probe
pub fn slow_key(service_key: &str) -> AlertKey {
    format!("{}_slow", service_key)
}
