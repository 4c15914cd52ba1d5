//! Mock implementations for testing
//!
//! Scripted metric providers, channel senders with canned outcomes and a
//! manually stepped clock, so engine behavior can be tested without network
//! access or sleeping.

use crate::alerts::{AlertMessage, ChannelId, ChannelSender};
use crate::clock::Clock;
use crate::error::{ChannelError, CollectorError};
use crate::probes::{MetricProvider, Reading};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// Provider returning scripted readings in order
///
/// The last entry repeats once the script is exhausted.
#[derive(Debug)]
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<Reading, CollectorError>>>,
    last: Mutex<Option<Result<Reading, CollectorError>>>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Result<Reading, CollectorError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
        }
    }

    /// Plain values, one per sample
    pub fn values(values: &[f64]) -> Self {
        Self::new(values.iter().map(|v| Ok(Reading::value(*v))).collect())
    }
}

#[async_trait]
impl MetricProvider for ScriptedProvider {
    async fn sample(&self) -> Result<Reading, CollectorError> {
        let next = self.script.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        match next {
            Some(reading) => {
                *last = Some(reading.clone());
                reading
            }
            None => last
                .clone()
                .unwrap_or_else(|| Err(CollectorError::Failed("script is empty".to_string()))),
        }
    }
}

/// Provider that takes `delay` per sample and tracks overlapping calls
#[derive(Debug)]
pub struct SlowProvider {
    delay: Duration,
    value: f64,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl SlowProvider {
    pub fn new(delay: Duration, value: f64) -> Self {
        Self {
            delay,
            value,
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    /// Highest number of samples ever in progress at once
    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetricProvider for SlowProvider {
    async fn sample(&self) -> Result<Reading, CollectorError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(Reading::value(self.value))
    }
}

/// Provider that blocks until released, for single-flight tests
#[derive(Debug, Default)]
pub struct GatedProvider {
    entered: Notify,
    release: Notify,
}

impl GatedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until a sample is in progress
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Let the pending sample finish
    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[async_trait]
impl MetricProvider for GatedProvider {
    async fn sample(&self) -> Result<Reading, CollectorError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(Reading::value(0.0))
    }
}

#[derive(Debug, Clone)]
enum Behavior {
    Ok,
    Fail(ChannelError),
    Slow(Duration),
}

/// Channel sender with a canned outcome that records what it was given
#[derive(Debug)]
pub struct MockSender {
    id: ChannelId,
    behavior: Behavior,
    sent: Mutex<Vec<AlertMessage>>,
}

impl MockSender {
    fn with(id: ChannelId, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            id,
            behavior,
            sent: Mutex::new(Vec::new()),
        })
    }

    /// Always succeeds
    pub fn ok(id: ChannelId) -> Arc<Self> {
        Self::with(id, Behavior::Ok)
    }

    /// Always fails with `error`
    pub fn failing(id: ChannelId, error: ChannelError) -> Arc<Self> {
        Self::with(id, Behavior::Fail(error))
    }

    /// Succeeds after `delay`
    pub fn slow(id: ChannelId, delay: Duration) -> Arc<Self> {
        Self::with(id, Behavior::Slow(delay))
    }

    /// Messages handed to this sender, including failed attempts
    pub fn sent(&self) -> Vec<AlertMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChannelSender for MockSender {
    fn id(&self) -> ChannelId {
        self.id
    }

    async fn send(&self, message: &AlertMessage) -> Result<(), ChannelError> {
        self.sent.lock().unwrap().push(message.clone());
        match &self.behavior {
            Behavior::Ok => Ok(()),
            Behavior::Fail(e) => Err(e.clone()),
            Behavior::Slow(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(())
            }
        }
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let by = chrono::Duration::from_std(by).unwrap();
        *self.now.lock().unwrap() += by;
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock().unwrap() = at;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_provider_repeats_last() {
        let provider = ScriptedProvider::values(&[1.0, 2.0]);
        assert_eq!(provider.sample().await.unwrap(), Reading::value(1.0));
        assert_eq!(provider.sample().await.unwrap(), Reading::value(2.0));
        assert_eq!(provider.sample().await.unwrap(), Reading::value(2.0));
    }

    #[test]
    fn test_manual_clock() {
        let start = Utc::now();
        let clock = ManualClock::new(start);
        clock.advance(Duration::from_secs(90));
        assert_eq!(clock.now() - start, chrono::Duration::seconds(90));
    }
}
