//! Configuration system
//!
//! Handles TOML config file parsing, CLI overrides and hot reload.

pub mod builder;
pub mod file;
pub mod handle;

pub use builder::{ConfigBuilder, ConfigOverrides};
pub use file::ConfigFile;
pub use handle::{ConfigHandle, LiveConfig};

use crate::alerts::ChannelId;
use crate::domain::Priority;
use crate::error::ConfigError;
use crate::probes::ProbeKind;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;

/// Longest accepted interval, window or timeout
pub const MAX_DURATION_SECONDS: u64 = 30 * 24 * 60 * 60;

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    /// Scheduler and escalation settings
    pub engine: EngineSettings,
    /// Metric thresholds
    pub thresholds: Thresholds,
    /// Priority to channel routing
    pub routing: RoutingConfig,
    /// Channel settings and enable flags
    pub channels: ChannelsConfig,
    /// Local durable record for undelivered alerts
    pub fallback: FallbackConfig,
    /// Registered probes
    pub probes: Vec<ProbeConfig>,
}

/// Scheduler and escalation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Seconds between scheduled cycles
    pub check_interval_seconds: u64,
    /// Consecutive breaching cycles required before alerting
    pub consecutive_failure_threshold: u32,
    /// Minimum seconds between two delivered alerts for one key
    pub dedup_window_seconds: u64,
    /// Healthy minutes after which a recovery notice is sent
    pub alert_recovery_minutes: u64,
    /// Minimum seconds between the end of one cycle and the start of the next
    pub health_check_cooldown_seconds: u64,
    /// Upper bound for one full cycle
    pub max_runtime_seconds: Option<u64>,
    /// Upper bound for one probe
    pub probe_timeout_seconds: u64,
    /// Upper bound for the channel fan-out of one alert
    pub dispatch_timeout_seconds: u64,
    /// Entries kept in each diagnostics ring buffer
    pub history_size: usize,
    /// Source identifier placed in every message
    pub source: Option<String>,
    /// Where to write the status document after each cycle
    pub status_file: Option<PathBuf>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            check_interval_seconds: 60,
            consecutive_failure_threshold: 3,
            dedup_window_seconds: 1800,
            alert_recovery_minutes: 10,
            health_check_cooldown_seconds: 5,
            max_runtime_seconds: None,
            probe_timeout_seconds: 10,
            dispatch_timeout_seconds: 15,
            history_size: 100,
            source: None,
            status_file: None,
        }
    }
}

impl EngineSettings {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_seconds)
    }

    pub fn dedup_window(&self) -> Duration {
        Duration::from_secs(self.dedup_window_seconds)
    }

    pub fn recovery_period(&self) -> Duration {
        Duration::from_secs(self.alert_recovery_minutes.saturating_mul(60))
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.health_check_cooldown_seconds)
    }

    pub fn max_runtime(&self) -> Option<Duration> {
        self.max_runtime_seconds.map(Duration::from_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_seconds)
    }

    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_secs(self.dispatch_timeout_seconds)
    }

    /// Source identifier: configured name, then `$HOSTNAME`, then "vigil"
    pub fn source_name(&self) -> String {
        self.source
            .clone()
            .or_else(|| std::env::var("HOSTNAME").ok())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "vigil".to_string())
    }
}

/// Metric thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// CPU usage percentage
    pub cpu: f64,
    /// Memory usage percentage
    pub memory: f64,
    /// Disk usage percentage
    pub disk: f64,
    /// Response time at which a service counts as slow
    pub slow_response_ms: f64,
    /// Response time at which a service counts as down
    pub down_response_ms: f64,
    /// Per-key threshold overrides
    pub overrides: BTreeMap<String, f64>,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            cpu: 80.0,
            memory: 85.0,
            disk: 90.0,
            slow_response_ms: 2000.0,
            down_response_ms: 10000.0,
            overrides: BTreeMap::new(),
        }
    }
}

impl Thresholds {
    /// Default threshold for a probe kind
    pub fn for_kind(&self, kind: ProbeKind) -> Option<f64> {
        match kind {
            ProbeKind::Cpu => Some(self.cpu),
            ProbeKind::Memory => Some(self.memory),
            ProbeKind::Disk => Some(self.disk),
            ProbeKind::Service => Some(self.slow_response_ms),
            ProbeKind::Gauge => None,
        }
    }

    /// Per-key override, if any
    pub fn override_for(&self, key: &str) -> Option<f64> {
        self.overrides.get(key).copied()
    }
}

/// Priority to channel routing lists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub critical: Vec<String>,
    pub high: Vec<String>,
    pub medium: Vec<String>,
    pub low: Vec<String>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        let list = |items: &[&str]| -> Vec<String> {
            items.iter().map(|s| s.to_string()).collect()
        };
        Self {
            critical: list(&["chat", "mail", "webhook", "console"]),
            high: list(&["chat", "mail", "console"]),
            medium: list(&["chat", "console"]),
            low: list(&["console"]),
        }
    }
}

impl RoutingConfig {
    /// Raw channel identifiers for a priority
    pub fn list(&self, priority: Priority) -> &[String] {
        match priority {
            Priority::Critical => &self.critical,
            Priority::High => &self.high,
            Priority::Medium => &self.medium,
            Priority::Low => &self.low,
        }
    }
}

/// Channel settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ChannelsConfig {
    pub chat: ChatConfig,
    pub mail: MailConfig,
    pub webhook: WebhookConfig,
    pub console: ConsoleConfig,
}

impl ChannelsConfig {
    /// Independent enable flag of a channel
    pub fn is_enabled(&self, id: ChannelId) -> bool {
        match id {
            ChannelId::Chat => self.chat.enabled,
            ChannelId::Mail => self.mail.enabled,
            ChannelId::Webhook => self.webhook.enabled,
            ChannelId::Console => self.console.enabled,
        }
    }
}

/// Bot-chat channel settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub enabled: bool,
    /// Bot API base URL
    pub api_base: String,
    /// Bot token
    pub bot_token: String,
    /// Target chat ids
    pub chat_ids: Vec<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_base: "https://api.telegram.org".to_string(),
            bot_token: String::new(),
            chat_ids: Vec::new(),
        }
    }
}

/// SMTP transport security
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MailSecurity {
    /// Implicit TLS (usually port 465)
    Tls,
    /// STARTTLS upgrade (usually port 587)
    #[default]
    Starttls,
    /// Plain connection to a trusted local relay
    None,
}

/// Mail channel settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub enabled: bool,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub security: MailSecurity,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
    pub recipients: Vec<String>,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: "localhost".to_string(),
            smtp_port: 587,
            security: MailSecurity::default(),
            username: None,
            password: None,
            from: String::new(),
            recipients: Vec::new(),
        }
    }
}

/// Webhook channel settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct WebhookConfig {
    pub enabled: bool,
    pub url: String,
    pub headers: BTreeMap<String, String>,
}

/// Console channel settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub enabled: bool,
    /// Use ANSI colors when the terminal supports them
    pub color: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            color: true,
        }
    }
}

/// Fallback record settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FallbackConfig {
    /// JSON-lines file receiving undelivered alerts
    pub path: Option<PathBuf>,
}

impl FallbackConfig {
    /// Configured path or the default under the user data directory
    pub fn resolved_path(&self) -> PathBuf {
        if let Some(path) = &self.path {
            return path.clone();
        }
        match dirs::data_local_dir() {
            Some(dir) => dir.join("vigil").join("undelivered.jsonl"),
            None => PathBuf::from("vigil-undelivered.jsonl"),
        }
    }
}

/// One registered probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Alert key
    pub key: String,
    /// Probe kind
    pub kind: ProbeKind,
    /// Title used in alert messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Routing priority override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    /// Service name for service probes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    /// File holding the current value (gauge-style probes)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    /// URL to probe (service probes)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl EngineConfig {
    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let engine = &self.engine;
        if engine.check_interval_seconds == 0 {
            return Err(ConfigError::invalid(
                "engine.check_interval_seconds",
                "must be at least 1",
            ));
        }
        if engine.consecutive_failure_threshold == 0 {
            return Err(ConfigError::invalid(
                "engine.consecutive_failure_threshold",
                "must be at least 1",
            ));
        }
        if engine.max_runtime_seconds == Some(0) {
            return Err(ConfigError::invalid(
                "engine.max_runtime_seconds",
                "must be at least 1 when set",
            ));
        }
        if engine.probe_timeout_seconds == 0 || engine.dispatch_timeout_seconds == 0 {
            return Err(ConfigError::invalid(
                "engine",
                "probe and dispatch timeouts must be at least 1 second",
            ));
        }
        let durations = [
            ("engine.check_interval_seconds", engine.check_interval_seconds),
            ("engine.dedup_window_seconds", engine.dedup_window_seconds),
            (
                "engine.alert_recovery_minutes",
                engine.alert_recovery_minutes.saturating_mul(60),
            ),
            (
                "engine.health_check_cooldown_seconds",
                engine.health_check_cooldown_seconds,
            ),
            (
                "engine.max_runtime_seconds",
                engine.max_runtime_seconds.unwrap_or(0),
            ),
            ("engine.probe_timeout_seconds", engine.probe_timeout_seconds),
            ("engine.dispatch_timeout_seconds", engine.dispatch_timeout_seconds),
        ];
        for (key, seconds) in durations {
            if seconds > MAX_DURATION_SECONDS {
                return Err(ConfigError::invalid(key, "must not exceed 30 days"));
            }
        }

        let t = &self.thresholds;
        let named = [
            ("thresholds.cpu", t.cpu),
            ("thresholds.memory", t.memory),
            ("thresholds.disk", t.disk),
            ("thresholds.slow_response_ms", t.slow_response_ms),
            ("thresholds.down_response_ms", t.down_response_ms),
        ];
        for (key, value) in named {
            check_positive(key, value)?;
        }
        for (key, value) in &t.overrides {
            check_positive(&format!("thresholds.overrides.{}", key), *value)?;
        }
        if t.slow_response_ms >= t.down_response_ms {
            return Err(ConfigError::invalid(
                "thresholds.slow_response_ms",
                "must be lower than down_response_ms",
            ));
        }

        let mut seen = HashSet::new();
        for probe in &self.probes {
            if probe.key.trim().is_empty() {
                return Err(ConfigError::invalid("probes.key", "must not be empty"));
            }
            if !seen.insert(probe.key.as_str()) {
                return Err(ConfigError::invalid(
                    "probes.key",
                    format!("duplicate probe key '{}'", probe.key),
                ));
            }
            match (probe.kind, &probe.file, &probe.url) {
                (ProbeKind::Service, _, Some(_)) => {}
                (ProbeKind::Service, _, None) => {
                    return Err(ConfigError::invalid(
                        format!("probes.{}.url", probe.key),
                        "service probes need a url",
                    ))
                }
                (_, Some(_), _) => {}
                (_, None, _) => {
                    return Err(ConfigError::invalid(
                        format!("probes.{}.file", probe.key),
                        "gauge probes need a file",
                    ))
                }
            }
            if probe.kind == ProbeKind::Gauge && t.override_for(&probe.key).is_none() {
                return Err(ConfigError::invalid(
                    format!("thresholds.overrides.{}", probe.key),
                    "gauge probes need a threshold override",
                ));
            }
        }

        Ok(())
    }
}

fn check_positive(key: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(key, format!("{} must be > 0", value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.engine.check_interval_seconds, 60);
        assert_eq!(config.engine.consecutive_failure_threshold, 3);
        assert_eq!(config.thresholds.cpu, 80.0);
        assert!(config.channels.console.enabled);
        assert!(!config.channels.chat.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_durations() {
        let settings = EngineSettings {
            alert_recovery_minutes: 2,
            max_runtime_seconds: Some(30),
            ..Default::default()
        };
        assert_eq!(settings.recovery_period(), Duration::from_secs(120));
        assert_eq!(settings.max_runtime(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_validate_rejects_zero_threshold() {
        let mut config = EngineConfig::default();
        config.engine.consecutive_failure_threshold = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_huge_durations() {
        let mut config = EngineConfig::default();
        config.engine.check_interval_seconds = u64::MAX;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("engine.check_interval_seconds"));

        let mut config = EngineConfig::default();
        config.engine.alert_recovery_minutes = u64::MAX;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.engine.check_interval_seconds = MAX_DURATION_SECONDS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_metric_threshold() {
        let mut config = EngineConfig::default();
        config.thresholds.cpu = -5.0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("thresholds.cpu"));

        let mut config = EngineConfig::default();
        config.thresholds.overrides.insert("queue".to_string(), f64::NAN);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_probe_sources() {
        let mut config = EngineConfig::default();
        config.probes.push(ProbeConfig {
            key: "service_web".to_string(),
            kind: ProbeKind::Service,
            title: None,
            priority: None,
            service: Some("web".to_string()),
            file: None,
            url: None,
        });
        assert!(config.validate().is_err());

        config.probes[0].url = Some("http://localhost:8080/health".to_string());
        assert!(config.validate().is_ok());

        let duplicate = config.probes[0].clone();
        config.probes.push(duplicate);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_routing_lists() {
        let routing = RoutingConfig::default();
        assert_eq!(routing.list(Priority::Low), &["console".to_string()]);
        assert!(routing.list(Priority::Critical).len() > routing.list(Priority::Low).len());
    }

    #[test]
    fn test_channel_enable_flags() {
        let mut channels = ChannelsConfig::default();
        channels.mail.enabled = true;
        assert!(channels.is_enabled(ChannelId::Mail));
        assert!(!channels.is_enabled(ChannelId::Webhook));
    }
}
