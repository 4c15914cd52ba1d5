//! Escalation state tracking
//!
//! One [`EscalationRecord`] per alert key decides whether a breach is still
//! transient, confirmed but deduplicated, or should be delivered now.
//!
//! Recovery policy: [`EscalationTracker::reset`] clears the failure count but
//! keeps `last_alert_at`, so a condition that flaps back inside the dedup
//! window stays quiet. Once a key has been healthy for the configured
//! recovery period, [`EscalationTracker::take_recovery`] clears
//! `last_alert_at` and reports the recovery exactly once.

use crate::domain::{AlertKey, Classification};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Per-key escalation state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationRecord {
    /// Consecutive breaching cycles since the last reset
    pub failure_count: u32,
    /// When this key last produced a delivered alert
    pub last_alert_at: Option<DateTime<Utc>>,
    /// First healthy cycle after a breach
    pub healthy_since: Option<DateTime<Utc>>,
}

/// Decision for one breaching key in one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// Below the consecutive-failure threshold
    Transient,
    /// Confirmed, but an alert was delivered inside the dedup window
    Suppressed,
    /// Confirmed and due: deliver an alert now
    Deliver,
}

impl Decision {
    /// Whether an alert must be dispatched
    pub fn should_escalate(&self) -> bool {
        matches!(self, Self::Deliver)
    }

    /// Snapshot classification for this decision
    pub fn classification(&self) -> Classification {
        match self {
            Self::Transient => Classification::Transient,
            Self::Suppressed | Self::Deliver => Classification::Escalated,
        }
    }
}

/// Escalation tracker
///
/// Owned by the engine and only touched from inside a running cycle.
#[derive(Debug, Default)]
pub struct EscalationTracker {
    records: BTreeMap<AlertKey, EscalationRecord>,
}

impl EscalationTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a breach for `key` and decide what to do with it
    pub fn observe_breach(
        &mut self,
        key: &str,
        consecutive_threshold: u32,
        dedup_window: Duration,
        now: DateTime<Utc>,
    ) -> Decision {
        let record = self.records.entry(key.to_string()).or_default();
        record.failure_count = record.failure_count.saturating_add(1);
        record.healthy_since = None;

        if record.failure_count < consecutive_threshold.max(1) {
            return Decision::Transient;
        }

        if let Some(last) = record.last_alert_at {
            // A negative elapsed time means the clock stepped back; stay quiet
            let within_window = match (now - last).to_std() {
                Ok(elapsed) => elapsed < dedup_window,
                Err(_) => true,
            };
            if within_window {
                return Decision::Suppressed;
            }
        }

        record.last_alert_at = Some(now);
        Decision::Deliver
    }

    /// Record a breach and return whether an alert should be delivered
    pub fn should_escalate(
        &mut self,
        key: &str,
        consecutive_threshold: u32,
        dedup_window: Duration,
        now: DateTime<Utc>,
    ) -> bool {
        self.observe_breach(key, consecutive_threshold, dedup_window, now)
            .should_escalate()
    }

    /// Record a healthy cycle for `key`
    pub fn reset(&mut self, key: &str, now: DateTime<Utc>) {
        if let Some(record) = self.records.get_mut(key) {
            record.failure_count = 0;
            if record.healthy_since.is_none() {
                record.healthy_since = Some(now);
            }
        }
    }

    /// Report a completed recovery once
    ///
    /// Returns true when `key` had alerted and has now been healthy for at
    /// least `recovery`. Clears `last_alert_at` in that case.
    pub fn take_recovery(&mut self, key: &str, recovery: Duration, now: DateTime<Utc>) -> bool {
        let Some(record) = self.records.get_mut(key) else {
            return false;
        };
        if record.failure_count > 0 || record.last_alert_at.is_none() {
            return false;
        }
        let Some(since) = record.healthy_since else {
            return false;
        };
        match (now - since).to_std() {
            Ok(healthy_for) if healthy_for >= recovery => {
                record.last_alert_at = None;
                record.healthy_since = None;
                true
            }
            _ => false,
        }
    }

    /// Record for a key, if one was ever created
    pub fn record(&self, key: &str) -> Option<&EscalationRecord> {
        self.records.get(key)
    }

    /// Current failure count for a key
    pub fn failure_count(&self, key: &str) -> u32 {
        self.records.get(key).map(|r| r.failure_count).unwrap_or(0)
    }

    /// All records, ordered by key
    pub fn records(&self) -> &BTreeMap<AlertKey, EscalationRecord> {
        &self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const WINDOW: Duration = Duration::from_secs(600);

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_no_alert_before_threshold() {
        let mut tracker = EscalationTracker::new();
        assert_eq!(
            tracker.observe_breach("high_cpu", 3, WINDOW, at(0)),
            Decision::Transient
        );
        assert_eq!(
            tracker.observe_breach("high_cpu", 3, WINDOW, at(60)),
            Decision::Transient
        );
        tracker.reset("high_cpu", at(120));

        assert_eq!(tracker.failure_count("high_cpu"), 0);
        assert!(tracker.record("high_cpu").unwrap().last_alert_at.is_none());
    }

    #[test]
    fn test_escalates_exactly_at_threshold() {
        let mut tracker = EscalationTracker::new();
        let decisions: Vec<_> = (0..3)
            .map(|i| tracker.observe_breach("high_cpu", 3, WINDOW, at(i * 60)))
            .collect();

        assert_eq!(
            decisions,
            vec![Decision::Transient, Decision::Transient, Decision::Deliver]
        );
        assert_eq!(
            tracker.record("high_cpu").unwrap().last_alert_at,
            Some(at(120))
        );
    }

    #[test]
    fn test_dedup_window_suppresses_but_stays_escalated() {
        let mut tracker = EscalationTracker::new();
        assert!(tracker.should_escalate("high_cpu", 1, WINDOW, at(0)));

        let decision = tracker.observe_breach("high_cpu", 1, WINDOW, at(300));
        assert_eq!(decision, Decision::Suppressed);
        assert_eq!(decision.classification(), Classification::Escalated);
        assert_eq!(tracker.failure_count("high_cpu"), 2);

        // Window elapsed: deliver again
        assert!(tracker.should_escalate("high_cpu", 1, WINDOW, at(600)));
    }

    #[test]
    fn test_flapping_never_escalates() {
        let mut tracker = EscalationTracker::new();
        for cycle in 0..4 {
            let now = at(cycle * 60);
            if cycle % 2 == 0 {
                assert!(!tracker.should_escalate("high_cpu", 3, WINDOW, now));
            } else {
                tracker.reset("high_cpu", now);
            }
        }
        assert!(tracker.record("high_cpu").unwrap().last_alert_at.is_none());
    }

    #[test]
    fn test_keys_are_independent() {
        let mut tracker = EscalationTracker::new();
        tracker.observe_breach("high_cpu", 2, WINDOW, at(0));
        assert!(tracker.should_escalate("high_cpu", 2, WINDOW, at(60)));

        assert_eq!(tracker.failure_count("service_database"), 0);
        assert_eq!(
            tracker.observe_breach("service_database", 2, WINDOW, at(60)),
            Decision::Transient
        );
        tracker.reset("service_database", at(120));
        assert_eq!(tracker.failure_count("high_cpu"), 2);
    }

    #[test]
    fn test_reset_keeps_last_alert_for_flap_protection() {
        let mut tracker = EscalationTracker::new();
        assert!(tracker.should_escalate("high_cpu", 1, WINDOW, at(0)));
        tracker.reset("high_cpu", at(60));

        // Comes back quickly: confirmed again but still inside the window
        assert_eq!(
            tracker.observe_breach("high_cpu", 1, WINDOW, at(120)),
            Decision::Suppressed
        );
    }

    #[test]
    fn test_recovery_reported_once_after_sustained_health() {
        let mut tracker = EscalationTracker::new();
        let recovery = Duration::from_secs(300);
        assert!(tracker.should_escalate("high_cpu", 1, WINDOW, at(0)));

        tracker.reset("high_cpu", at(60));
        assert!(!tracker.take_recovery("high_cpu", recovery, at(60)));
        tracker.reset("high_cpu", at(360));
        assert!(tracker.take_recovery("high_cpu", recovery, at(360)));
        assert!(!tracker.take_recovery("high_cpu", recovery, at(420)));

        // Dedup state cleared: the next confirmed breach alerts immediately
        assert!(tracker.should_escalate("high_cpu", 1, WINDOW, at(480)));
    }

    #[test]
    fn test_reset_unknown_key_creates_nothing() {
        let mut tracker = EscalationTracker::new();
        tracker.reset("never_breached", at(0));
        assert!(tracker.records().is_empty());
    }
}
