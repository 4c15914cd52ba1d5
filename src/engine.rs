//! Health-check engine
//!
//! [`Engine`] owns every piece of mutable state: escalation records, the
//! single-flight flag, the last snapshot and diagnostics. One cycle:
//!
//! 1. take the single-flight flag (or reject), wait out the cooldown
//! 2. sample all probes concurrently, each bounded by the probe timeout
//! 3. classify every observation and run it through the escalation tracker
//! 4. route and dispatch escalated alerts, recording undelivered ones locally
//! 5. publish the snapshot
//!
//! Steps 2 to 4 are bounded by `max_runtime_seconds` when set. A cut-off
//! cycle keeps the entries it already produced, records alerts whose
//! delivery was interrupted in the fallback sink and raises the
//! `monitoring_failure` key.

use crate::alerts::{
    senders_from_config, AlertMessage, DispatchReport, Dispatcher, JsonlFallback, RoutingTable,
};
use crate::clock::{Clock, SystemClock};
use crate::config::{ConfigHandle, EngineConfig, EngineSettings, LiveConfig, Thresholds};
use crate::diagnostics::{CycleSummary, DeliveryRecord, Diagnostics, FaultKind};
use crate::domain::{
    classify, is_breach, monitoring_failure_key, AlertKey, Classification, HealthEntry,
    HealthSnapshot, MetricKind, Priority, Severity, MONITORING_FAILURE,
};
use crate::error::{AppError, CollectorError, EngineError};
use crate::escalation::{Decision, EscalationRecord, EscalationTracker};
use crate::probes::{Observation, Probe, ProbeSpec, Reading, Unavailable};
use crate::scheduler::{SchedulerState, SingleFlight};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;

/// Everything a status query can see
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineStatus {
    pub generated_at: DateTime<Utc>,
    /// Last completed cycle
    pub snapshot: Option<HealthSnapshot>,
    pub scheduler: SchedulerState,
    pub routing: RoutingTable,
    pub thresholds: Thresholds,
    pub settings: EngineSettings,
    pub config_generation: u64,
    pub escalation: BTreeMap<AlertKey, EscalationRecord>,
    pub diagnostics: Diagnostics,
}

impl EngineStatus {
    /// Read a status document written by a running engine
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| AppError::StatusUnavailable(path.display().to_string()))?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Probes and dispatcher for one configuration generation
struct Wiring {
    generation: u64,
    probes: Vec<Probe>,
    dispatcher: Arc<Dispatcher>,
}

impl Wiring {
    fn from_config(config: &EngineConfig, generation: u64) -> Self {
        let timeout = config.engine.probe_timeout();
        let probes = config
            .probes
            .iter()
            .map(|p| {
                Probe::from_config(p, timeout).unwrap_or_else(|e| {
                    log::warn!("Probe '{}' unavailable: {}", p.key, e);
                    Probe::new(ProbeSpec::from_config(p), Arc::new(Unavailable::new(e.to_string())))
                })
            })
            .collect();

        let fallback = Arc::new(JsonlFallback::new(config.fallback.resolved_path()));
        let dispatcher = Dispatcher::new(fallback).with_senders(senders_from_config(
            &config.channels,
            config.engine.dispatch_timeout(),
        ));

        Self {
            generation,
            probes,
            dispatcher: Arc::new(dispatcher),
        }
    }
}

/// Entries produced so far in a cycle
#[derive(Default)]
struct CycleLog {
    entries: Vec<HealthEntry>,
    /// Escalated alerts still being dispatched, by entry index
    in_flight: Vec<(usize, AlertMessage)>,
}

/// One condition to run through the escalation tracker
struct Finding {
    key: AlertKey,
    kind: MetricKind,
    value: Option<f64>,
    threshold: f64,
    breach: bool,
    severity: Severity,
    priority: Priority,
    service: Option<String>,
    title: String,
    body: String,
    fault: Option<String>,
}

impl Finding {
    fn observed(obs: &Observation) -> Self {
        let severity = classify(obs.kind, obs.value, obs.threshold);
        Self {
            key: obs.key.clone(),
            kind: obs.kind,
            value: Some(obs.value),
            threshold: obs.threshold,
            breach: is_breach(obs.kind, obs.value, obs.threshold),
            severity,
            priority: obs.priority(severity),
            service: obs.service.clone(),
            title: obs.title(),
            body: obs.describe(),
            fault: None,
        }
    }

    fn collector_fault(spec: &ProbeSpec, threshold: f64, err: &CollectorError) -> Self {
        Self {
            key: monitoring_failure_key(&spec.key),
            kind: spec.kind.metric_kind(),
            value: None,
            threshold,
            breach: true,
            severity: Severity::High,
            priority: Priority::High,
            service: spec.service.clone(),
            title: format!("Monitoring failure: {}", spec.key),
            body: format!("Could not collect '{}': {}", spec.key, err),
            fault: Some(err.to_string()),
        }
    }

    fn cycle_timeout(limit: Duration) -> Self {
        let reason = EngineError::CycleTimeout(limit).to_string();
        Self {
            key: MONITORING_FAILURE.to_string(),
            kind: MetricKind::Availability,
            value: None,
            threshold: limit.as_secs_f64(),
            breach: true,
            severity: Severity::High,
            priority: Priority::High,
            service: None,
            title: "Health-check cycle timed out".to_string(),
            body: format!("The {}; remaining checks were skipped.", reason),
            fault: Some(reason),
        }
    }

    /// A monitoring-failure key whose condition is gone
    fn monitoring_restored(key: &str) -> Self {
        Self {
            key: key.to_string(),
            kind: MetricKind::Availability,
            value: Some(1.0),
            threshold: 1.0,
            breach: false,
            severity: Severity::Warning,
            priority: Priority::High,
            service: None,
            title: format!("Monitoring restored: {}", key),
            body: String::new(),
            fault: None,
        }
    }
}

/// Health-check and escalation engine
pub struct Engine {
    config: Arc<ConfigHandle>,
    wiring: RwLock<Arc<Wiring>>,
    /// Rebuild probes and senders when the configuration generation changes
    auto_wire: bool,
    clock: Arc<dyn Clock>,
    flight: SingleFlight,
    tracker: Mutex<EscalationTracker>,
    snapshot: RwLock<Option<HealthSnapshot>>,
    diagnostics: Mutex<Diagnostics>,
    cycles: AtomicU64,
}

impl Engine {
    /// Engine with explicit probes and dispatcher
    pub fn new(config: Arc<ConfigHandle>, probes: Vec<Probe>, dispatcher: Dispatcher) -> Self {
        let generation = config.current().generation;
        let wiring = Wiring {
            generation,
            probes,
            dispatcher: Arc::new(dispatcher),
        };
        Self::assemble(config, wiring, false)
    }

    /// Engine whose probes and channels come from the configuration
    pub fn from_config(config: Arc<ConfigHandle>) -> Self {
        let live = config.current();
        let wiring = Wiring::from_config(&live.config, live.generation);
        Self::assemble(config, wiring, true)
    }

    fn assemble(config: Arc<ConfigHandle>, wiring: Wiring, auto_wire: bool) -> Self {
        let history = config.current().config.engine.history_size;
        Self {
            config,
            wiring: RwLock::new(Arc::new(wiring)),
            auto_wire,
            clock: Arc::new(SystemClock),
            flight: SingleFlight::new(),
            tracker: Mutex::new(EscalationTracker::new()),
            snapshot: RwLock::new(None),
            diagnostics: Mutex::new(Diagnostics::new(history)),
            cycles: AtomicU64::new(0),
        }
    }

    /// Replace the wall clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &ConfigHandle {
        &self.config
    }

    pub fn flight(&self) -> &SingleFlight {
        &self.flight
    }

    pub fn is_running(&self) -> bool {
        self.flight.is_running()
    }

    /// Number of registered probes
    pub fn probe_count(&self) -> usize {
        self.current_wiring().probes.len()
    }

    /// Reload the configuration file if it changed
    ///
    /// A broken file is logged and recorded; the last-known-good
    /// configuration stays active.
    pub fn reload_config(&self) -> bool {
        match self.config.reload_if_changed() {
            Ok(changed) => changed,
            Err(e) => {
                self.lock_diagnostics()
                    .fault(FaultKind::Config, None, e.to_string(), self.clock.now());
                false
            }
        }
    }

    /// Run an out-of-band cycle unless one is already running
    pub async fn trigger(&self) -> Result<HealthSnapshot, EngineError> {
        self.run_cycle(false).await
    }

    /// Run a cycle from the scheduler
    pub async fn run_scheduled(&self) -> Result<HealthSnapshot, EngineError> {
        self.run_cycle(true).await
    }

    /// Last published snapshot
    pub fn snapshot(&self) -> Option<HealthSnapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Read-only view of the engine
    pub fn status(&self) -> EngineStatus {
        let live = self.config.current();
        EngineStatus {
            generated_at: self.clock.now(),
            snapshot: self.snapshot(),
            scheduler: self.flight.state(),
            routing: live.routing.clone(),
            thresholds: live.config.thresholds.clone(),
            settings: live.config.engine.clone(),
            config_generation: live.generation,
            escalation: self.lock_tracker().records().clone(),
            diagnostics: self.lock_diagnostics().clone(),
        }
    }

    async fn run_cycle(&self, scheduled: bool) -> Result<HealthSnapshot, EngineError> {
        let Some(guard) = self.flight.try_acquire() else {
            if scheduled {
                self.flight.note_skipped_tick();
            } else {
                log::info!("Trigger rejected: a cycle is already running");
                self.flight.note_rejected_trigger();
            }
            return Err(EngineError::CycleInProgress);
        };

        let live = self.config.current();
        let settings = &live.config.engine;
        if let Some(wait) = self.flight.cooldown_remaining(settings.cooldown()) {
            log::debug!("Cooldown: waiting {:?} before the next cycle", wait);
            tokio::time::sleep(wait).await;
        }

        let wiring = self.wiring_for(&live);
        let started_at = self.clock.now();
        let started = Instant::now();
        guard.started(started_at);
        let cycle = self.cycles.fetch_add(1, Ordering::Relaxed) + 1;
        self.lock_diagnostics().resize(settings.history_size);
        log::debug!("Cycle {} started with {} probe(s)", cycle, wiring.probes.len());

        let mut out = CycleLog::default();
        let cut_off = match settings.max_runtime() {
            Some(limit) => tokio::time::timeout(limit, self.evaluate(&live, &wiring, &mut out))
                .await
                .err()
                .map(|_| limit),
            None => {
                self.evaluate(&live, &wiring, &mut out).await;
                None
            }
        };

        match cut_off {
            Some(limit) => self.handle_timeout(limit, &live, &wiring, &mut out).await,
            None => self.settle(MONITORING_FAILURE, &live, &wiring, &mut out).await,
        }

        let snapshot = HealthSnapshot {
            cycle,
            started_at,
            finished_at: self.clock.now(),
            timed_out: cut_off.is_some(),
            entries: out.entries,
        };
        self.record_cycle(&snapshot, started.elapsed());
        *self.snapshot.write().unwrap_or_else(|e| e.into_inner()) = Some(snapshot.clone());
        guard.finished(snapshot.finished_at);
        drop(guard);

        if let Some(path) = &settings.status_file {
            self.write_status(path).await;
        }
        Ok(snapshot)
    }

    async fn evaluate(&self, live: &LiveConfig, wiring: &Wiring, out: &mut CycleLog) {
        let timeout = live.config.engine.probe_timeout();
        let mut tasks = JoinSet::new();
        for (idx, probe) in wiring.probes.iter().enumerate() {
            let probe = probe.clone();
            tasks.spawn(async move { (idx, probe.collect(timeout).await) });
        }

        let mut readings: Vec<Option<Result<Reading, CollectorError>>> =
            vec![None; wiring.probes.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, reading)) => readings[idx] = Some(reading),
                Err(e) => log::error!("Probe task failed: {}", e),
            }
        }

        let thresholds = &live.config.thresholds;
        for (probe, reading) in wiring.probes.iter().zip(readings) {
            let spec = &probe.spec;
            let observed = reading
                .unwrap_or_else(|| Err(CollectorError::Failed("probe task aborted".to_string())))
                .and_then(|r| spec.observations(&r, thresholds));

            match observed {
                Ok(observations) => {
                    self.settle(&monitoring_failure_key(&spec.key), live, wiring, out)
                        .await;
                    for obs in &observations {
                        self.process(Finding::observed(obs), live, wiring, out).await;
                    }
                }
                Err(e) => {
                    log::warn!("Collector for '{}' failed: {}", spec.key, e);
                    self.lock_diagnostics().fault(
                        FaultKind::Collector,
                        Some(&spec.key),
                        e.to_string(),
                        self.clock.now(),
                    );
                    let threshold = thresholds
                        .override_for(&spec.key)
                        .or_else(|| thresholds.for_kind(spec.kind))
                        .unwrap_or(0.0);
                    let finding = Finding::collector_fault(spec, threshold, &e);
                    self.process(finding, live, wiring, out).await;
                }
            }
        }
    }

    /// Classify, escalate and dispatch one finding, appending its entry
    async fn process(
        &self,
        finding: Finding,
        live: &LiveConfig,
        wiring: &Wiring,
        out: &mut CycleLog,
    ) {
        let settings = &live.config.engine;
        let now = self.clock.now();
        let mut entry = HealthEntry {
            key: finding.key.clone(),
            kind: finding.kind,
            value: finding.value,
            threshold: finding.threshold,
            severity: finding.severity,
            classification: Classification::Healthy,
            failure_count: 0,
            service: finding.service.clone(),
            suppressed: false,
            fault: finding.fault.clone(),
            recovered: false,
            delivery: None,
        };

        if finding.breach {
            let (decision, failures) = {
                let mut tracker = self.lock_tracker();
                let decision = tracker.observe_breach(
                    &finding.key,
                    settings.consecutive_failure_threshold,
                    settings.dedup_window(),
                    now,
                );
                (decision, tracker.failure_count(&finding.key))
            };
            entry.classification = decision.classification();
            entry.failure_count = failures;
            entry.suppressed = decision == Decision::Suppressed;

            match decision {
                Decision::Transient => log::debug!(
                    "'{}' breached ({}/{}), transient",
                    finding.key,
                    failures,
                    settings.consecutive_failure_threshold
                ),
                Decision::Suppressed => log::debug!(
                    "'{}' still breaching, suppressed by the dedup window",
                    finding.key
                ),
                Decision::Deliver => {
                    log::warn!(
                        "Escalating '{}' [{} / {}]: {}",
                        finding.key,
                        finding.severity,
                        finding.priority,
                        finding.body
                    );
                    let message = AlertMessage::alert(
                        finding.key.clone(),
                        finding.title,
                        finding.body,
                        finding.severity,
                        finding.priority,
                        settings.source_name(),
                        now,
                    )
                    .with_service(finding.service);

                    let idx = out.entries.len();
                    out.entries.push(entry);
                    out.in_flight.push((idx, message.clone()));
                    let report = wiring
                        .dispatcher
                        .deliver_alert(
                            live.routing.route(finding.priority),
                            &message,
                            settings.dispatch_timeout(),
                            now,
                        )
                        .await;
                    out.in_flight.retain(|(i, _)| *i != idx);
                    self.record_delivery(&finding.key, &report, false, now);
                    out.entries[idx].delivery = Some(report);
                    return;
                }
            }
        } else {
            let recovered = {
                let mut tracker = self.lock_tracker();
                tracker.reset(&finding.key, now);
                tracker.take_recovery(&finding.key, settings.recovery_period(), now)
            };

            if recovered {
                log::info!("'{}' recovered", finding.key);
                entry.recovered = true;
                let notice = AlertMessage::recovery(
                    finding.key.clone(),
                    settings.source_name(),
                    settings.alert_recovery_minutes,
                    now,
                )
                .with_service(finding.service);

                let idx = out.entries.len();
                out.entries.push(entry);
                let report = wiring
                    .dispatcher
                    .send_notice(
                        live.routing.route(Priority::Low),
                        &notice,
                        settings.dispatch_timeout(),
                    )
                    .await;
                self.record_delivery(&finding.key, &report, true, now);
                out.entries[idx].delivery = Some(report);
                return;
            }
        }

        out.entries.push(entry);
    }

    /// Report a monitoring-failure key as healthy while it still matters
    async fn settle(&self, key: &str, live: &LiveConfig, wiring: &Wiring, out: &mut CycleLog) {
        let pending = self
            .lock_tracker()
            .record(key)
            .map(|r| r.failure_count > 0 || r.last_alert_at.is_some())
            .unwrap_or(false);
        if pending {
            self.process(Finding::monitoring_restored(key), live, wiring, out)
                .await;
        }
    }

    async fn handle_timeout(
        &self,
        limit: Duration,
        live: &LiveConfig,
        wiring: &Wiring,
        out: &mut CycleLog,
    ) {
        const INTERRUPTED: &str = "cycle cut off before delivery finished";

        log::warn!("Cycle exceeded {:?}; remaining work aborted", limit);
        let now = self.clock.now();
        self.lock_diagnostics().fault(
            FaultKind::CycleTimeout,
            Some(MONITORING_FAILURE),
            EngineError::CycleTimeout(limit).to_string(),
            now,
        );

        for entry in out.entries.iter_mut() {
            let interrupted = (entry.classification == Classification::Escalated
                && !entry.suppressed)
                || entry.recovered;
            if interrupted && entry.delivery.is_none() {
                entry.fault = Some(INTERRUPTED.to_string());
            }
        }

        // Channel tasks may still finish in the background, but none confirmed
        // in time, so the alert goes to the fallback sink like any other
        // undelivered one.
        for (idx, message) in std::mem::take(&mut out.in_flight) {
            let channels = live.routing.route(message.priority);
            let mut report = DispatchReport {
                priority: Some(message.priority),
                results: channels.iter().map(|id| (*id, false)).collect(),
                errors: channels.iter().map(|id| (*id, INTERRUPTED.to_string())).collect(),
                ..Default::default()
            };
            wiring
                .dispatcher
                .record_undelivered(&message, &mut report, now)
                .await;
            self.record_delivery(&message.key, &report, false, now);
            out.entries[idx].delivery = Some(report);
        }

        self.process(Finding::cycle_timeout(limit), live, wiring, out)
            .await;
    }

    fn wiring_for(&self, live: &LiveConfig) -> Arc<Wiring> {
        let current = self.current_wiring();
        if !self.auto_wire || current.generation == live.generation {
            return current;
        }

        log::info!(
            "Applying configuration generation {} to probes and channels",
            live.generation
        );
        let rebuilt = Arc::new(Wiring::from_config(&live.config, live.generation));
        *self.wiring.write().unwrap_or_else(|e| e.into_inner()) = Arc::clone(&rebuilt);
        rebuilt
    }

    fn current_wiring(&self) -> Arc<Wiring> {
        Arc::clone(&self.wiring.read().unwrap_or_else(|e| e.into_inner()))
    }

    fn record_delivery(&self, key: &str, report: &DispatchReport, recovery: bool, at: DateTime<Utc>) {
        let mut diagnostics = self.lock_diagnostics();
        diagnostics.deliveries.push(DeliveryRecord {
            key: key.to_string(),
            at,
            recovery,
            results: report.results.clone(),
            fallback: report.fallback_recorded,
        });
        for (channel, error) in &report.errors {
            diagnostics.fault(
                FaultKind::Channel,
                Some(key),
                format!("{}: {}", channel, error),
                at,
            );
        }
        if let Some(error) = &report.fallback_error {
            diagnostics.fault(FaultKind::Fallback, Some(key), error.clone(), at);
        }
    }

    fn record_cycle(&self, snapshot: &HealthSnapshot, elapsed: Duration) {
        let count = |class| snapshot.with_classification(class).len();
        let summary = CycleSummary {
            cycle: snapshot.cycle,
            started_at: snapshot.started_at,
            duration_ms: elapsed.as_millis() as u64,
            healthy: count(Classification::Healthy),
            transient: count(Classification::Transient),
            escalated: count(Classification::Escalated),
            dispatched: snapshot.dispatched_count(),
            timed_out: snapshot.timed_out,
        };
        self.lock_diagnostics().cycles.push(summary);
    }

    /// Write the status document atomically (temp file + rename)
    async fn write_status(&self, path: &Path) {
        let json = match serde_json::to_string_pretty(&self.status()) {
            Ok(json) => json,
            Err(e) => {
                log::warn!("Failed to encode status: {}", e);
                return;
            }
        };
        let tmp = path.with_extension("tmp");
        let result: std::io::Result<()> = async {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
            tokio::fs::write(&tmp, json).await?;
            tokio::fs::rename(&tmp, path).await
        }
        .await;
        if let Err(e) = result {
            log::warn!("Failed to write status to {}: {}", path.display(), e);
        }
    }

    fn lock_tracker(&self) -> MutexGuard<'_, EscalationTracker> {
        self.tracker.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_diagnostics(&self) -> MutexGuard<'_, Diagnostics> {
        self.diagnostics.lock().unwrap_or_else(|e| e.into_inner())
    }
}
