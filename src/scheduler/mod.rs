//! Health-check scheduling
//!
//! [`SingleFlight`] guarantees at most one evaluation cycle at a time. Ticks
//! and manual triggers that arrive while a cycle runs are dropped, never
//! queued. [`Scheduler`] drives cycles on a fixed interval and reloads the
//! configuration between cycles.

use crate::engine::Engine;
use crate::error::EngineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Scheduler bookkeeping, exposed through status queries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerState {
    /// Single-flight flag
    pub is_running: bool,
    pub last_check_start: Option<DateTime<Utc>>,
    pub last_check_end: Option<DateTime<Utc>>,
    pub cycles_completed: u64,
    /// Scheduled ticks dropped because a cycle was running
    pub ticks_skipped: u64,
    /// Manual triggers rejected because a cycle was running
    pub triggers_rejected: u64,
}

/// Mutual-exclusion flag for evaluation cycles
#[derive(Debug, Default)]
pub struct SingleFlight {
    running: AtomicBool,
    state: Mutex<SchedulerState>,
    /// Monotonic end of the last cycle, for the cooldown
    last_end: Mutex<Option<Instant>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the flag, or `None` if a cycle is already running
    pub fn try_acquire(&self) -> Option<FlightGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        self.lock_state().is_running = true;
        Some(FlightGuard { flight: self })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Copy of the current state
    pub fn state(&self) -> SchedulerState {
        self.lock_state().clone()
    }

    /// Time left before another cycle may start
    pub fn cooldown_remaining(&self, cooldown: Duration) -> Option<Duration> {
        let last_end = (*self.last_end.lock().unwrap_or_else(|e| e.into_inner()))?;
        let elapsed = last_end.elapsed();
        (elapsed < cooldown).then(|| cooldown - elapsed)
    }

    pub fn note_skipped_tick(&self) {
        self.lock_state().ticks_skipped += 1;
    }

    pub fn note_rejected_trigger(&self) {
        self.lock_state().triggers_rejected += 1;
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Held for the duration of one cycle; releases the flag on drop
#[derive(Debug)]
pub struct FlightGuard<'a> {
    flight: &'a SingleFlight,
}

impl FlightGuard<'_> {
    /// Record the start of evaluation (after any cooldown wait)
    pub fn started(&self, at: DateTime<Utc>) {
        self.flight.lock_state().last_check_start = Some(at);
    }

    /// Record the end of the cycle
    pub fn finished(&self, at: DateTime<Utc>) {
        {
            let mut state = self.flight.lock_state();
            state.last_check_end = Some(at);
            state.cycles_completed += 1;
        }
        *self
            .flight
            .last_end
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(Instant::now());
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.flight.lock_state().is_running = false;
        self.flight.running.store(false, Ordering::Release);
    }
}

/// Interval loop driving an [`Engine`]
pub struct Scheduler {
    engine: Arc<Engine>,
}

impl Scheduler {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }

    /// Run until Ctrl-C
    pub async fn run(&self) {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run until `shutdown` completes
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut period = self.engine.config().current().config.engine.check_interval();
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last: Option<JoinHandle<()>> = None;

        log::info!("Scheduler started, checking every {:?}", period);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    log::info!("Shutdown requested");
                    break;
                }
                _ = ticker.tick() => {
                    if self.engine.is_running() {
                        log::info!("Previous cycle still running, skipping tick");
                        self.engine.flight().note_skipped_tick();
                        continue;
                    }

                    self.engine.reload_config();
                    last = Some(self.spawn_cycle());

                    let configured = self.engine.config().current().config.engine.check_interval();
                    if configured != period {
                        log::info!("Check interval changed from {:?} to {:?}", period, configured);
                        period = configured;
                        let start = Instant::now().checked_add(period).unwrap_or_else(Instant::now);
                        ticker = tokio::time::interval_at(start, period);
                        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    }
                }
            }
        }

        if let Some(handle) = last {
            if self.engine.is_running() {
                log::info!("Waiting for the running cycle to finish");
            }
            let _ = handle.await;
        }
    }

    fn spawn_cycle(&self) -> JoinHandle<()> {
        let engine = Arc::clone(&self.engine);
        tokio::spawn(async move {
            match engine.run_scheduled().await {
                Ok(snapshot) => log::debug!(
                    "Cycle {} finished: {} entries, {} dispatched",
                    snapshot.cycle,
                    snapshot.entries.len(),
                    snapshot.dispatched_count()
                ),
                Err(EngineError::CycleInProgress) => {
                    log::info!("Previous cycle still running, skipping tick");
                }
                Err(e) => log::warn!("Cycle failed: {}", e),
            }
        })
    }
}
