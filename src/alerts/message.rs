//! Alert message formatting
//!
//! One [`AlertMessage`] is built per alert and shared by every channel.

use crate::domain::{AlertKey, Priority, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Visual marker for a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Marker {
    Red,
    Yellow,
    Green,
}

impl Marker {
    /// Emoji used in chat and mail bodies
    pub fn emoji(&self) -> &'static str {
        match self {
            Self::Red => "🔴",
            Self::Yellow => "🟡",
            Self::Green => "🟢",
        }
    }

    /// ANSI color escape for terminal output
    pub fn ansi(&self) -> &'static str {
        match self {
            Self::Red => "\x1b[31m",
            Self::Yellow => "\x1b[33m",
            Self::Green => "\x1b[32m",
        }
    }
}

impl From<Severity> for Marker {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::High => Self::Red,
            Severity::Medium => Self::Yellow,
            Severity::Warning => Self::Green,
        }
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.emoji())
    }
}

/// Channel-independent alert message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertMessage {
    /// Alert key this message is about
    pub key: AlertKey,
    /// Human title
    pub title: String,
    /// Body text
    pub body: String,
    /// Source identifier (host or instance name)
    pub source: String,
    /// Service name, for service alerts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    /// Severity tier
    pub severity: Severity,
    /// Routing priority
    pub priority: Priority,
    /// UTC time the message was built
    pub timestamp: DateTime<Utc>,
    /// Recovery notice rather than an alert
    #[serde(default)]
    pub recovery: bool,
}

impl AlertMessage {
    /// Build an alert message
    pub fn alert(
        key: impl Into<AlertKey>,
        title: impl Into<String>,
        body: impl Into<String>,
        severity: Severity,
        priority: Priority,
        source: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            body: body.into(),
            source: source.into(),
            service: None,
            severity,
            priority,
            timestamp,
            recovery: false,
        }
    }

    /// Build a recovery notice for a key that had alerted
    pub fn recovery(
        key: impl Into<AlertKey>,
        source: impl Into<String>,
        healthy_for_minutes: u64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let key = key.into();
        Self {
            title: format!("Recovered: {}", key),
            body: format!(
                "{} has been healthy for at least {} minute(s).",
                key, healthy_for_minutes
            ),
            key,
            source: source.into(),
            service: None,
            severity: Severity::Warning,
            priority: Priority::Low,
            timestamp,
            recovery: true,
        }
    }

    /// Set the service name
    pub fn with_service(mut self, service: Option<String>) -> Self {
        self.service = service;
        self
    }

    /// Visual marker; recovery notices are always green
    pub fn marker(&self) -> Marker {
        if self.recovery {
            Marker::Green
        } else {
            Marker::from(self.severity)
        }
    }

    /// Subject line for mail
    pub fn subject(&self) -> String {
        if self.recovery {
            format!("[RESOLVED] {}", self.title)
        } else {
            format!("[{}] {}", self.severity, self.title)
        }
    }

    /// Plain-text rendering shared by chat and mail
    pub fn render_text(&self) -> String {
        let mut text = format!("{} {}\n\n{}\n\n", self.marker(), self.title, self.body);
        text.push_str(&format!("Source: {}\n", self.source));
        if let Some(service) = &self.service {
            text.push_str(&format!("Service: {}\n", service));
        }
        text.push_str(&format!(
            "Severity: {} | Priority: {}\n",
            self.severity, self.priority
        ));
        text.push_str(&format!(
            "Time: {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        text
    }

    /// Single-line rendering for terminals and logs
    pub fn render_line(&self) -> String {
        let service = self
            .service
            .as_deref()
            .map(|s| format!(" ({})", s))
            .unwrap_or_default();
        format!(
            "[{}] {} {}{}: {} [{}]",
            self.timestamp.format("%H:%M:%S"),
            self.severity,
            self.title,
            service,
            self.body,
            self.source
        )
    }

    /// JSON payload for webhooks
    pub fn payload(&self) -> serde_json::Value {
        serde_json::json!({
            "key": self.key,
            "title": self.title,
            "body": self.body,
            "source": self.source,
            "service": self.service,
            "severity": self.severity,
            "priority": self.priority,
            "marker": self.marker(),
            "timestamp": self.timestamp.to_rfc3339(),
            "recovery": self.recovery,
        })
    }
}
