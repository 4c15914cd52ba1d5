//! End-to-end escalation scenarios driven through the public engine API

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use vigil::alerts::{AlertMessage, ChannelId, ChannelSender, Dispatcher, MemoryFallback};
use vigil::clock::Clock;
use vigil::config::{ConfigHandle, EngineConfig};
use vigil::domain::{Classification, HealthSnapshot, Priority};
use vigil::error::{ChannelError, CollectorError, EngineError};
use vigil::probes::{MetricProvider, Probe, ProbeKind, ProbeSpec, Reading};
use vigil::Engine;

struct Script(Mutex<VecDeque<Reading>>);

impl Script {
    fn probe(key: &str, kind: ProbeKind, values: &[f64]) -> Probe {
        let readings = values.iter().map(|v| Reading::value(*v)).collect();
        Probe::new(ProbeSpec::new(key, kind), Arc::new(Script(Mutex::new(readings))))
    }
}

#[async_trait]
impl MetricProvider for Script {
    async fn sample(&self) -> Result<Reading, CollectorError> {
        self.0
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| CollectorError::Failed("script exhausted".to_string()))
    }
}

struct Gate {
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl MetricProvider for Gate {
    async fn sample(&self) -> Result<Reading, CollectorError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(Reading::value(10.0))
    }
}

enum Outcome {
    Ok,
    Fail,
    Hang,
}

struct Recorder {
    id: ChannelId,
    outcome: Outcome,
    sent: Mutex<Vec<AlertMessage>>,
}

impl Recorder {
    fn new(id: ChannelId, outcome: Outcome) -> Arc<Self> {
        Arc::new(Self {
            id,
            outcome,
            sent: Mutex::new(Vec::new()),
        })
    }

    fn alerts(&self) -> Vec<AlertMessage> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|m| !m.recovery)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ChannelSender for Recorder {
    fn id(&self) -> ChannelId {
        self.id
    }

    async fn send(&self, message: &AlertMessage) -> Result<(), ChannelError> {
        self.sent.lock().unwrap().push(message.clone());
        match self.outcome {
            Outcome::Ok => Ok(()),
            Outcome::Fail => Err(ChannelError::Status(500)),
            Outcome::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
        }
    }
}

struct StepClock(Mutex<DateTime<Utc>>);

impl StepClock {
    fn advance(&self, secs: i64) {
        *self.0.lock().unwrap() += chrono::Duration::seconds(secs);
    }
}

impl Clock for StepClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

struct Rig {
    engine: Arc<Engine>,
    clock: Arc<StepClock>,
    fallback: Arc<MemoryFallback>,
}

impl Rig {
    fn new(config: EngineConfig, probes: Vec<Probe>, senders: Vec<Arc<Recorder>>) -> Self {
        let clock = Arc::new(StepClock(Mutex::new(Utc::now())));
        let fallback = Arc::new(MemoryFallback::new());
        let mut dispatcher = Dispatcher::new(fallback.clone());
        for sender in senders {
            dispatcher = dispatcher.with_sender(sender);
        }
        let engine = Engine::new(Arc::new(ConfigHandle::new(config)), probes, dispatcher)
            .with_clock(clock.clone());
        Self {
            engine: Arc::new(engine),
            clock,
            fallback,
        }
    }

    async fn cycle(&self) -> HealthSnapshot {
        self.clock.advance(60);
        self.engine.trigger().await.unwrap()
    }
}

fn config(threshold: u32) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.thresholds.cpu = 80.0;
    config.engine.consecutive_failure_threshold = threshold;
    config.engine.dedup_window_seconds = 1800;
    config.engine.health_check_cooldown_seconds = 0;
    config
}

#[tokio::test]
async fn scenario_a_escalates_once_then_suppresses() {
    let console = Recorder::new(ChannelId::Console, Outcome::Ok);
    let rig = Rig::new(
        config(3),
        vec![Script::probe("high_cpu", ProbeKind::Cpu, &[85.0, 88.0, 90.0, 91.0])],
        vec![console.clone()],
    );

    let classes: Vec<_> = {
        let mut out = Vec::new();
        for _ in 0..4 {
            out.push(rig.cycle().await);
        }
        out
    };

    assert_eq!(classes[0].entries[0].classification, Classification::Transient);
    assert_eq!(classes[1].entries[0].classification, Classification::Transient);
    assert!(!classes[1].entries[0].was_dispatched());

    let third = &classes[2].entries[0];
    assert_eq!(third.classification, Classification::Escalated);
    assert!(third.was_dispatched());

    let fourth = &classes[3].entries[0];
    assert_eq!(fourth.classification, Classification::Escalated);
    assert!(fourth.suppressed);
    assert!(!fourth.was_dispatched());

    let alerts = console.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].priority, Priority::High);
    assert_eq!(alerts[0].key, "high_cpu");
}

#[tokio::test]
async fn scenario_b_alternating_breach_never_escalates() {
    let console = Recorder::new(ChannelId::Console, Outcome::Ok);
    let rig = Rig::new(
        config(3),
        vec![Script::probe("high_cpu", ProbeKind::Cpu, &[85.0, 70.0, 85.0, 70.0])],
        vec![console.clone()],
    );

    for _ in 0..4 {
        let snap = rig.cycle().await;
        assert_ne!(snap.entries[0].classification, Classification::Escalated);
        assert!(snap.entries[0].failure_count <= 1);
    }
    assert!(console.alerts().is_empty());
}

#[tokio::test(start_paused = true)]
async fn scenario_c_partial_delivery_is_not_a_fallback() {
    let mut config = config(1);
    config.engine.dispatch_timeout_seconds = 2;
    config.routing.critical = vec!["chat".to_string(), "mail".to_string()];
    config.channels.chat.enabled = true;
    config.channels.mail.enabled = true;

    let chat = Recorder::new(ChannelId::Chat, Outcome::Hang);
    let mail = Recorder::new(ChannelId::Mail, Outcome::Ok);
    let down = Probe::new(
        ProbeSpec::new("service_database", ProbeKind::Service),
        Arc::new(Script(Mutex::new(VecDeque::from([Reading::no_response()])))),
    );
    let rig = Rig::new(config, vec![down], vec![chat.clone(), mail.clone()]);

    let snap = rig.cycle().await;
    let entry = snap.entry("service_database").unwrap();
    assert!(entry.was_dispatched());

    let delivery = entry.delivery.as_ref().unwrap();
    assert_eq!(delivery.priority, Some(Priority::Critical));
    assert_eq!(delivery.results.get(&ChannelId::Chat), Some(&false));
    assert_eq!(delivery.results.get(&ChannelId::Mail), Some(&true));
    assert!(delivery.delivered());
    assert!(!delivery.fallback_recorded);
    assert!(rig.fallback.records().is_empty());
    assert_eq!(mail.alerts()[0].service.as_deref(), Some("database"));
}

#[tokio::test]
async fn p1_short_breaches_never_alert() {
    for threshold in 2..=4u32 {
        for run in 1..threshold {
            let mut values = vec![95.0; run as usize];
            values.extend([10.0, 10.0]);
            let console = Recorder::new(ChannelId::Console, Outcome::Ok);
            let rig = Rig::new(
                config(threshold),
                vec![Script::probe("high_cpu", ProbeKind::Cpu, &values)],
                vec![console.clone()],
            );

            for _ in 0..values.len() {
                rig.cycle().await;
            }
            assert!(
                console.alerts().is_empty(),
                "{} breaches alerted with threshold {}",
                run,
                threshold
            );
        }
    }
}

#[tokio::test]
async fn p2_alert_exactly_at_threshold() {
    for threshold in 1..=4u32 {
        let console = Recorder::new(ChannelId::Console, Outcome::Ok);
        let values = vec![95.0; threshold as usize];
        let rig = Rig::new(
            config(threshold),
            vec![Script::probe("high_cpu", ProbeKind::Cpu, &values)],
            vec![console.clone()],
        );

        for cycle in 1..=threshold {
            let snap = rig.cycle().await;
            let dispatched = snap.entries[0].was_dispatched();
            assert_eq!(dispatched, cycle == threshold, "cycle {} of {}", cycle, threshold);
        }
        assert_eq!(console.alerts().len(), 1);
    }
}

#[tokio::test]
async fn p3_dedup_window_suppresses_until_elapsed() {
    let mut config = config(1);
    config.engine.dedup_window_seconds = 300;
    let console = Recorder::new(ChannelId::Console, Outcome::Ok);
    let rig = Rig::new(
        config,
        vec![Script::probe("disk_root", ProbeKind::Disk, &[99.0; 6])],
        vec![console.clone()],
    );

    // Cycles at +60s .. +360s; the first delivery is at +60s
    let mut dispatched = Vec::new();
    for _ in 0..6 {
        let snap = rig.cycle().await;
        assert_eq!(snap.entries[0].classification, Classification::Escalated);
        dispatched.push(snap.entries[0].was_dispatched());
    }
    assert_eq!(dispatched, vec![true, false, false, false, false, true]);
    assert_eq!(console.alerts().len(), 2);
}

#[tokio::test]
async fn p4_keys_are_independent() {
    let console = Recorder::new(ChannelId::Console, Outcome::Ok);
    let rig = Rig::new(
        config(2),
        vec![
            Script::probe("high_cpu", ProbeKind::Cpu, &[95.0, 95.0, 95.0]),
            Script::probe("high_memory", ProbeKind::Memory, &[10.0, 99.0, 10.0]),
        ],
        vec![console.clone()],
    );

    let first = rig.cycle().await;
    assert_eq!(first.entry("high_memory").unwrap().failure_count, 0);

    let second = rig.cycle().await;
    assert!(second.entry("high_cpu").unwrap().was_dispatched());
    let memory = second.entry("high_memory").unwrap();
    assert_eq!(memory.failure_count, 1);
    assert_eq!(memory.classification, Classification::Transient);

    let third = rig.cycle().await;
    assert!(third.entry("high_cpu").unwrap().suppressed);
    assert_eq!(third.entry("high_memory").unwrap().failure_count, 0);

    let status = rig.engine.status();
    assert_eq!(status.escalation["high_cpu"].failure_count, 3);
    assert!(status.escalation["high_memory"].last_alert_at.is_none());
    assert_eq!(console.alerts().len(), 1);
}

#[tokio::test]
async fn p5_undeliverable_alert_is_recorded() {
    let mut config = config(1);
    config.routing.high = vec!["webhook".to_string(), "console".to_string()];
    config.channels.webhook.enabled = true;

    let webhook = Recorder::new(ChannelId::Webhook, Outcome::Fail);
    let console = Recorder::new(ChannelId::Console, Outcome::Fail);
    let rig = Rig::new(
        config,
        vec![Script::probe("high_cpu", ProbeKind::Cpu, &[97.0])],
        vec![webhook, console],
    );

    let snap = rig.cycle().await;
    let delivery = snap.entries[0].delivery.as_ref().unwrap();
    assert!(!delivery.delivered());
    assert!(delivery.fallback_recorded);

    let records = rig.fallback.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].message.key, "high_cpu");
    assert_eq!(records[0].results.get(&ChannelId::Webhook), Some(&false));
}

#[tokio::test]
async fn p5_empty_route_is_recorded() {
    let mut config = config(1);
    config.routing.high = Vec::new();

    let rig = Rig::new(
        config,
        vec![Script::probe("high_cpu", ProbeKind::Cpu, &[97.0])],
        Vec::new(),
    );

    let snap = rig.cycle().await;
    assert!(snap.entries[0].delivery.as_ref().unwrap().fallback_recorded);
    assert_eq!(rig.fallback.records().len(), 1);
}

#[tokio::test]
async fn p6_trigger_rejected_while_cycle_runs() {
    let gate = Arc::new(Gate {
        entered: Notify::new(),
        release: Notify::new(),
    });
    let probe = Probe::new(ProbeSpec::new("high_cpu", ProbeKind::Cpu), gate.clone());
    let rig = Rig::new(config(3), vec![probe], Vec::new());

    let engine = Arc::clone(&rig.engine);
    let first = tokio::spawn(async move { engine.trigger().await });
    gate.entered.notified().await;

    assert!(rig.engine.status().scheduler.is_running);
    assert_eq!(rig.engine.trigger().await, Err(EngineError::CycleInProgress));
    assert_eq!(rig.engine.run_scheduled().await, Err(EngineError::CycleInProgress));

    gate.release.notify_one();
    let snap = first.await.unwrap().unwrap();
    assert_eq!(snap.cycle, 1);

    let state = rig.engine.status().scheduler;
    assert!(!state.is_running);
    assert_eq!(state.cycles_completed, 1);
    assert_eq!(state.triggers_rejected, 1);
    assert_eq!(state.ticks_skipped, 1);
}
