//! Metric providers
//!
//! A [`Probe`] pairs a registered key with a [`MetricProvider`]. The engine
//! only sees [`Observation`]s: one per alert key, each with a value and the
//! threshold it is judged against.

mod file;
mod http;

pub use file::FileGauge;
pub use http::HttpProbe;

use crate::config::{ProbeConfig, Thresholds};
use crate::domain::{slow_key, AlertKey, MetricKind, Priority};
use crate::error::CollectorError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// One raw reading from a provider
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Reading {
    /// Sampled value; `None` when a service did not answer
    pub value: Option<f64>,
    /// Threshold suggested by the provider
    pub threshold: Option<f64>,
}

impl Reading {
    /// A plain value
    pub fn value(value: f64) -> Self {
        Self {
            value: Some(value),
            threshold: None,
        }
    }

    /// A value with a provider-supplied threshold
    pub fn with_threshold(value: f64, threshold: f64) -> Self {
        Self {
            value: Some(value),
            threshold: Some(threshold),
        }
    }

    /// A service that produced no response
    pub fn no_response() -> Self {
        Self::default()
    }
}

/// Source of readings for one probe
#[async_trait]
pub trait MetricProvider: Send + Sync {
    /// Take one reading
    async fn sample(&self) -> Result<Reading, CollectorError>;
}

/// Kind of registered probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeKind {
    Cpu,
    Memory,
    Disk,
    Gauge,
    /// HTTP service; value is the response time in milliseconds
    Service,
}

impl ProbeKind {
    /// Metric kind of the probe's primary alert key
    pub fn metric_kind(&self) -> MetricKind {
        match self {
            Self::Cpu => MetricKind::Cpu,
            Self::Memory => MetricKind::Memory,
            Self::Disk => MetricKind::Disk,
            Self::Gauge => MetricKind::Gauge,
            Self::Service => MetricKind::Availability,
        }
    }
}

impl fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Memory => write!(f, "memory"),
            Self::Disk => write!(f, "disk"),
            Self::Gauge => write!(f, "gauge"),
            Self::Service => write!(f, "service"),
        }
    }
}

/// Static description of a probe
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeSpec {
    pub key: AlertKey,
    pub kind: ProbeKind,
    pub title: Option<String>,
    pub priority: Option<Priority>,
    pub service: Option<String>,
}

impl ProbeSpec {
    pub fn new(key: impl Into<AlertKey>, kind: ProbeKind) -> Self {
        Self {
            key: key.into(),
            kind,
            title: None,
            priority: None,
            service: None,
        }
    }

    pub fn from_config(config: &ProbeConfig) -> Self {
        Self {
            key: config.key.clone(),
            kind: config.kind,
            title: config.title.clone(),
            priority: config.priority,
            service: config.service.clone(),
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Turn a reading into per-key observations
    ///
    /// Threshold precedence: per-key override, provider threshold, kind
    /// default. A service yields the availability key and, while it answers,
    /// the slow-response key.
    pub fn observations(
        &self,
        reading: &Reading,
        thresholds: &Thresholds,
    ) -> Result<Vec<Observation>, CollectorError> {
        if self.kind == ProbeKind::Service {
            return Ok(self.service_observations(reading, thresholds));
        }

        let value = reading
            .value
            .ok_or_else(|| CollectorError::Failed("provider returned no value".to_string()))?;
        let threshold = thresholds
            .override_for(&self.key)
            .or(reading.threshold)
            .or_else(|| thresholds.for_kind(self.kind))
            .ok_or_else(|| CollectorError::Failed(format!("no threshold for '{}'", self.key)))?;

        Ok(vec![Observation {
            key: self.key.clone(),
            kind: self.kind.metric_kind(),
            value,
            threshold,
            service: self.service.clone(),
            priority: self.priority,
            title: self.title.clone(),
        }])
    }

    fn service_observations(&self, reading: &Reading, thresholds: &Thresholds) -> Vec<Observation> {
        let slow = thresholds
            .override_for(&slow_key(&self.key))
            .or(reading.threshold)
            .unwrap_or(thresholds.slow_response_ms);
        let down = thresholds.down_response_ms;
        let service = self.service.clone().or_else(|| {
            self.key
                .strip_prefix("service_")
                .map(str::to_string)
        });

        let availability = |value: f64| Observation {
            key: self.key.clone(),
            kind: MetricKind::Availability,
            value,
            threshold: 1.0,
            service: service.clone(),
            priority: self.priority,
            title: self.title.clone(),
        };

        match reading.value {
            Some(ms) if ms < down => vec![
                availability(1.0),
                Observation {
                    key: slow_key(&self.key),
                    kind: MetricKind::ResponseTime,
                    value: ms,
                    threshold: slow,
                    service: service.clone(),
                    priority: None,
                    title: None,
                },
            ],
            _ => vec![availability(0.0)],
        }
    }
}

/// A registered probe
#[derive(Clone)]
pub struct Probe {
    pub spec: ProbeSpec,
    provider: Arc<dyn MetricProvider>,
}

impl Probe {
    pub fn new(spec: ProbeSpec, provider: Arc<dyn MetricProvider>) -> Self {
        Self { spec, provider }
    }

    /// Build a probe from its configuration entry
    pub fn from_config(config: &ProbeConfig, timeout: Duration) -> Result<Self, CollectorError> {
        let spec = ProbeSpec::from_config(config);
        let provider: Arc<dyn MetricProvider> = match (config.kind, &config.url, &config.file) {
            (ProbeKind::Service, Some(url), _) => Arc::new(HttpProbe::new(url.clone(), timeout)?),
            (_, _, Some(path)) => Arc::new(FileGauge::new(path.clone())),
            _ => {
                return Err(CollectorError::Failed(format!(
                    "probe '{}' has no source",
                    config.key
                )))
            }
        };

        Ok(Self::new(spec, provider))
    }

    /// Sample the provider within `timeout`
    pub async fn collect(&self, timeout: Duration) -> Result<Reading, CollectorError> {
        let reading = tokio::time::timeout(timeout, self.provider.sample())
            .await
            .map_err(|_| CollectorError::Timeout(timeout))??;

        for v in [reading.value, reading.threshold].into_iter().flatten() {
            if !v.is_finite() {
                return Err(CollectorError::NonFinite(v));
            }
        }
        Ok(reading)
    }
}

impl fmt::Debug for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Probe").field("spec", &self.spec).finish()
    }
}

/// Provider for a probe that could not be built; every sample fails
#[derive(Debug, Clone)]
pub struct Unavailable {
    reason: String,
}

impl Unavailable {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl MetricProvider for Unavailable {
    async fn sample(&self) -> Result<Reading, CollectorError> {
        Err(CollectorError::Failed(self.reason.clone()))
    }
}

/// One alert key's value for this cycle
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub key: AlertKey,
    pub kind: MetricKind,
    pub value: f64,
    pub threshold: f64,
    pub service: Option<String>,
    /// Explicit routing priority from the probe
    pub priority: Option<Priority>,
    pub title: Option<String>,
}

impl Observation {
    /// Alert title
    pub fn title(&self) -> String {
        if let Some(title) = &self.title {
            return title.clone();
        }
        let subject = self.service.as_deref().unwrap_or(&self.key);
        match self.kind {
            MetricKind::Cpu => "High CPU usage".to_string(),
            MetricKind::Memory => "High memory usage".to_string(),
            MetricKind::Disk => "High disk usage".to_string(),
            MetricKind::Gauge => format!("{} above threshold", self.key),
            MetricKind::ResponseTime => format!("{} responding slowly", subject),
            MetricKind::Availability => format!("{} is down", subject),
        }
    }

    /// Alert body
    pub fn describe(&self) -> String {
        match self.kind {
            MetricKind::Cpu | MetricKind::Memory | MetricKind::Disk => format!(
                "{} usage is {:.1}% (threshold {:.1}%)",
                self.kind, self.value, self.threshold
            ),
            MetricKind::Gauge => format!(
                "{} is {:.2} (threshold {:.2})",
                self.key, self.value, self.threshold
            ),
            MetricKind::ResponseTime => format!(
                "Response time {:.0} ms (slow threshold {:.0} ms)",
                self.value, self.threshold
            ),
            MetricKind::Availability => "No response from service".to_string(),
        }
    }

    /// Routing priority for an escalated alert
    pub fn priority(&self, severity: crate::domain::Severity) -> Priority {
        self.priority
            .unwrap_or_else(|| self.kind.default_priority(severity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Severity;

    struct Fixed(Result<Reading, CollectorError>);

    #[async_trait]
    impl MetricProvider for Fixed {
        async fn sample(&self) -> Result<Reading, CollectorError> {
            self.0.clone()
        }
    }

    struct Stalled;

    #[async_trait]
    impl MetricProvider for Stalled {
        async fn sample(&self) -> Result<Reading, CollectorError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Reading::value(1.0))
        }
    }

    #[test]
    fn test_resource_threshold_precedence() {
        let spec = ProbeSpec::new("high_cpu", ProbeKind::Cpu);
        let mut thresholds = Thresholds::default();

        let obs = spec.observations(&Reading::value(85.0), &thresholds).unwrap();
        assert_eq!(obs.len(), 1);
        assert_eq!(obs[0].threshold, 80.0);
        assert_eq!(obs[0].kind, MetricKind::Cpu);

        let obs = spec
            .observations(&Reading::with_threshold(85.0, 70.0), &thresholds)
            .unwrap();
        assert_eq!(obs[0].threshold, 70.0);

        thresholds.overrides.insert("high_cpu".to_string(), 60.0);
        let obs = spec
            .observations(&Reading::with_threshold(85.0, 70.0), &thresholds)
            .unwrap();
        assert_eq!(obs[0].threshold, 60.0);
    }

    #[test]
    fn test_gauge_needs_threshold() {
        let spec = ProbeSpec::new("queue_depth", ProbeKind::Gauge);
        let result = spec.observations(&Reading::value(10.0), &Thresholds::default());
        assert!(matches!(result, Err(CollectorError::Failed(_))));
    }

    #[test]
    fn test_service_up_yields_two_keys() {
        let spec = ProbeSpec::new("service_web", ProbeKind::Service);
        let obs = spec
            .observations(&Reading::value(2500.0), &Thresholds::default())
            .unwrap();

        assert_eq!(obs.len(), 2);
        assert_eq!(obs[0].key, "service_web");
        assert_eq!(obs[0].kind, MetricKind::Availability);
        assert_eq!(obs[0].value, 1.0);
        assert_eq!(obs[0].service.as_deref(), Some("web"));
        assert_eq!(obs[1].key, "service_web_slow");
        assert_eq!(obs[1].threshold, 2000.0);
    }

    #[test]
    fn test_service_down_skips_slow_key() {
        let spec = ProbeSpec::new("service_web", ProbeKind::Service);
        let thresholds = Thresholds::default();

        let obs = spec.observations(&Reading::no_response(), &thresholds).unwrap();
        assert_eq!(obs.len(), 1);
        assert_eq!(obs[0].value, 0.0);

        let obs = spec.observations(&Reading::value(12_000.0), &thresholds).unwrap();
        assert_eq!(obs.len(), 1);
        assert_eq!(obs[0].kind, MetricKind::Availability);
    }

    #[test]
    fn test_observation_priority() {
        let spec = ProbeSpec::new("service_db", ProbeKind::Service).with_priority(Priority::High);
        let obs = spec
            .observations(&Reading::no_response(), &Thresholds::default())
            .unwrap();
        assert_eq!(obs[0].priority(Severity::High), Priority::High);
        assert_eq!(obs[0].title(), "db is down");

        let cpu = ProbeSpec::new("high_cpu", ProbeKind::Cpu)
            .observations(&Reading::value(90.0), &Thresholds::default())
            .unwrap();
        assert_eq!(cpu[0].priority(Severity::Medium), Priority::High);
    }

    #[tokio::test]
    async fn test_collect_rejects_non_finite() {
        let probe = Probe::new(
            ProbeSpec::new("g", ProbeKind::Gauge),
            Arc::new(Fixed(Ok(Reading::value(f64::INFINITY)))),
        );
        let result = probe.collect(Duration::from_secs(1)).await;
        assert!(matches!(result, Err(CollectorError::NonFinite(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_collect_times_out() {
        let probe = Probe::new(ProbeSpec::new("g", ProbeKind::Gauge), Arc::new(Stalled));
        let result = probe.collect(Duration::from_secs(2)).await;
        assert_eq!(result, Err(CollectorError::Timeout(Duration::from_secs(2))));
    }
}
