//! Channel dispatch
//!
//! Each routed channel is sent from its own task. The dispatcher waits for
//! all of them up to one shared deadline and folds the outcomes into an
//! ordered result map. Tasks that miss the deadline count as failed and are
//! left to finish in the background.

use super::{AlertMessage, ChannelId, ChannelSender, FallbackRecord, FallbackSink};
use crate::domain::Priority;
use crate::error::ChannelError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Outcome of sending one message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchReport {
    /// Priority the message was routed at
    pub priority: Option<Priority>,
    /// Per-channel success
    pub results: BTreeMap<ChannelId, bool>,
    /// Failure reason per failed channel
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<ChannelId, String>,
    /// The alert was written to the fallback sink
    #[serde(default)]
    pub fallback_recorded: bool,
    /// Why the fallback write failed, if it did
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_error: Option<String>,
}

impl DispatchReport {
    /// At least one channel accepted the message
    pub fn delivered(&self) -> bool {
        self.results.values().any(|ok| *ok)
    }
}

/// Fans messages out to channel senders
pub struct Dispatcher {
    senders: BTreeMap<ChannelId, Arc<dyn ChannelSender>>,
    fallback: Arc<dyn FallbackSink>,
}

impl Dispatcher {
    pub fn new(fallback: Arc<dyn FallbackSink>) -> Self {
        Self {
            senders: BTreeMap::new(),
            fallback,
        }
    }

    /// Register a sender, replacing any sender for the same channel
    pub fn with_sender(mut self, sender: Arc<dyn ChannelSender>) -> Self {
        self.senders.insert(sender.id(), sender);
        self
    }

    pub fn with_senders(
        mut self,
        senders: impl IntoIterator<Item = (ChannelId, Arc<dyn ChannelSender>)>,
    ) -> Self {
        self.senders.extend(senders);
        self
    }

    /// Send to every channel and collect per-channel outcomes
    pub async fn dispatch(
        &self,
        channels: &[ChannelId],
        message: &AlertMessage,
        timeout: Duration,
    ) -> DispatchReport {
        let mut report = DispatchReport {
            priority: Some(message.priority),
            ..Default::default()
        };
        let message = Arc::new(message.clone());
        let deadline = Instant::now() + timeout;

        let mut handles = Vec::with_capacity(channels.len());
        for &id in channels {
            match self.senders.get(&id) {
                Some(sender) => {
                    let sender = Arc::clone(sender);
                    let message = Arc::clone(&message);
                    let handle = tokio::spawn(async move { sender.send(&message).await });
                    handles.push((id, handle));
                }
                None => {
                    let err = ChannelError::NotConfigured(id.to_string());
                    log::warn!("{} for '{}': {}", id, message.key, err);
                    report.results.insert(id, false);
                    report.errors.insert(id, err.to_string());
                }
            }
        }

        for (id, handle) in handles {
            let outcome = match tokio::time::timeout_at(deadline, handle).await {
                Ok(Ok(result)) => result,
                Ok(Err(join_err)) => Err(ChannelError::Transport(format!(
                    "sender task failed: {}",
                    join_err
                ))),
                // Dropping the handle detaches the task
                Err(_) => Err(ChannelError::Timeout),
            };

            match outcome {
                Ok(()) => {
                    log::debug!("Sent '{}' via {}", message.key, id);
                    report.results.insert(id, true);
                }
                Err(e) => {
                    log::warn!("Failed to send '{}' via {}: {}", message.key, id, e);
                    report.results.insert(id, false);
                    report.errors.insert(id, e.to_string());
                }
            }
        }

        report
    }

    /// Send an escalated alert, recording it locally if no channel took it
    pub async fn deliver_alert(
        &self,
        channels: &[ChannelId],
        message: &AlertMessage,
        timeout: Duration,
        at: DateTime<Utc>,
    ) -> DispatchReport {
        let mut report = self.dispatch(channels, message, timeout).await;
        if report.delivered() {
            return report;
        }

        if channels.is_empty() {
            log::error!("No channel routed for '{}' at {}", message.key, message.priority);
        }
        self.record_undelivered(message, &mut report, at).await;
        report
    }

    /// Write an alert no channel confirmed to the fallback sink
    pub async fn record_undelivered(
        &self,
        message: &AlertMessage,
        report: &mut DispatchReport,
        at: DateTime<Utc>,
    ) {
        let record = FallbackRecord {
            recorded_at: at,
            message: message.clone(),
            results: report.results.clone(),
            errors: report.errors.clone(),
        };
        match self.fallback.record(&record).await {
            Ok(()) => {
                log::error!(
                    "Alert '{}' was not delivered by any channel; recorded locally",
                    message.key
                );
                report.fallback_recorded = true;
                report.fallback_error = None;
            }
            Err(e) => {
                log::error!("Alert '{}' was not delivered and {}", message.key, e);
                report.fallback_error = Some(e.to_string());
            }
        }
    }

    /// Send a notice that never falls back (recovery messages)
    pub async fn send_notice(
        &self,
        channels: &[ChannelId],
        message: &AlertMessage,
        timeout: Duration,
    ) -> DispatchReport {
        self.dispatch(channels, message, timeout).await
    }
}
