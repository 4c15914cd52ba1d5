//! Output formatting utilities
//!
//! Provides table and JSON output formatting for CLI commands.

use crate::alerts::{ChannelId, RoutingTable};
use crate::cli::args::OutputFormat;
use crate::config::EngineConfig;
use crate::domain::{Classification, HealthEntry, HealthSnapshot};
use crate::engine::EngineStatus;
use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;

/// Format and print output based on the selected format
pub fn print_output<T: Serialize + TableDisplay>(data: &T, format: OutputFormat) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();

    match format {
        OutputFormat::Table => {
            writeln!(handle, "{}", data.to_table())?;
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_string());
            writeln!(handle, "{}", json)?;
        }
        OutputFormat::Compact => {
            writeln!(handle, "{}", data.to_compact())?;
        }
    }

    Ok(())
}

/// Trait for types that can be displayed as a table
pub trait TableDisplay {
    /// Format as a table string
    fn to_table(&self) -> String;

    /// Format as a compact single line
    fn to_compact(&self) -> String {
        self.to_table().replace('\n', " | ")
    }
}

fn format_value(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.1}", v),
        None => "-".to_string(),
    }
}

fn entry_note(entry: &HealthEntry) -> String {
    let mut notes = Vec::new();
    if entry.suppressed {
        notes.push("suppressed".to_string());
    }
    if entry.recovered {
        notes.push("recovered".to_string());
    }
    if let Some(delivery) = &entry.delivery {
        let channels: Vec<String> = delivery
            .results
            .iter()
            .map(|(id, ok)| format!("{}:{}", id, if *ok { "ok" } else { "failed" }))
            .collect();
        if channels.is_empty() {
            notes.push("no channels".to_string());
        } else {
            notes.push(channels.join(","));
        }
        if delivery.fallback_recorded {
            notes.push("recorded locally".to_string());
        }
    }
    if let Some(fault) = &entry.fault {
        notes.push(fault.clone());
    }
    notes.join("; ")
}

impl TableDisplay for HealthSnapshot {
    fn to_table(&self) -> String {
        let mut output = format!(
            "Cycle {} at {}{}\n",
            self.cycle,
            self.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
            if self.timed_out { " (TIMED OUT)" } else { "" }
        );
        output.push_str(&format!(
            "  {} healthy, {} transient, {} escalated, {} dispatched\n\n",
            self.with_classification(Classification::Healthy).len(),
            self.with_classification(Classification::Transient).len(),
            self.with_classification(Classification::Escalated).len(),
            self.dispatched_count()
        ));

        if self.entries.is_empty() {
            output.push_str("  No probes registered\n");
            return output;
        }

        output.push_str(&format!(
            "  {:<32} {:>10} {:>10} {:<8} {:<10} {:>5}  {}\n",
            "KEY", "VALUE", "THRESHOLD", "SEVERITY", "STATE", "FAILS", "NOTES"
        ));
        for entry in &self.entries {
            output.push_str(&format!(
                "  {:<32} {:>10} {:>10.1} {:<8} {:<10} {:>5}  {}\n",
                entry.key,
                format_value(entry.value),
                entry.threshold,
                entry.severity.to_string(),
                entry.classification.to_string(),
                entry.failure_count,
                entry_note(entry)
            ));
        }

        output
    }

    fn to_compact(&self) -> String {
        let mut parts = vec![format!("cycle={}", self.cycle)];
        for entry in self
            .entries
            .iter()
            .filter(|e| e.classification != Classification::Healthy)
        {
            parts.push(format!(
                "{}={}:{}",
                entry.key, entry.classification, entry.severity
            ));
        }
        if self.is_healthy() {
            parts.push("healthy".to_string());
        }
        if self.timed_out {
            parts.push("timed_out".to_string());
        }
        parts.join(" ")
    }
}

fn routing_table(routing: &RoutingTable) -> String {
    let mut output = String::new();
    for (priority, channels) in routing.routes() {
        let list = if channels.is_empty() {
            "(none)".to_string()
        } else {
            channels
                .iter()
                .map(ChannelId::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        };
        output.push_str(&format!("  {:<9} {}\n", priority.as_str(), list));
    }
    output
}

impl TableDisplay for EngineStatus {
    fn to_table(&self) -> String {
        let scheduler = &self.scheduler;
        let mut output = format!(
            "Engine status at {} (config generation {})\n\n",
            self.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
            self.config_generation
        );

        output.push_str("Scheduler:\n");
        output.push_str(&format!(
            "  Running: {}\n",
            if scheduler.is_running { "yes" } else { "no" }
        ));
        output.push_str(&format!(
            "  Interval: {}s, consecutive threshold: {}, dedup window: {}s\n",
            self.settings.check_interval_seconds,
            self.settings.consecutive_failure_threshold,
            self.settings.dedup_window_seconds
        ));
        if let Some(end) = scheduler.last_check_end {
            output.push_str(&format!(
                "  Last check: {}\n",
                end.format("%Y-%m-%d %H:%M:%S UTC")
            ));
        }
        output.push_str(&format!(
            "  Cycles: {}, ticks skipped: {}, triggers rejected: {}\n\n",
            scheduler.cycles_completed, scheduler.ticks_skipped, scheduler.triggers_rejected
        ));

        match &self.snapshot {
            Some(snapshot) => output.push_str(&snapshot.to_table()),
            None => output.push_str("No cycle has completed yet\n"),
        }

        let pending: Vec<_> = self
            .escalation
            .iter()
            .filter(|(_, r)| r.failure_count > 0 || r.last_alert_at.is_some())
            .collect();
        if !pending.is_empty() {
            output.push_str("\nEscalation:\n");
            for (key, record) in pending {
                let last = record
                    .last_alert_at
                    .map(|t| t.format("%H:%M:%S").to_string())
                    .unwrap_or_else(|| "-".to_string());
                output.push_str(&format!(
                    "  {:<32} failures: {:<3} last alert: {}\n",
                    key, record.failure_count, last
                ));
            }
        }

        let faults: Vec<_> = self.diagnostics.faults.iter().collect();
        if !faults.is_empty() {
            output.push_str("\nRecent faults:\n");
            for fault in faults.iter().rev().take(5) {
                output.push_str(&format!(
                    "  [{}] {:?} {}: {}\n",
                    fault.at.format("%H:%M:%S"),
                    fault.kind,
                    fault.key.as_deref().unwrap_or("-"),
                    fault.message
                ));
            }
        }

        output.push_str("\nRouting:\n");
        output.push_str(&routing_table(&self.routing));
        output
    }

    fn to_compact(&self) -> String {
        let snapshot = self
            .snapshot
            .as_ref()
            .map(|s| s.to_compact())
            .unwrap_or_else(|| "no cycle yet".to_string());
        format!(
            "running={} cycles={} {}",
            self.scheduler.is_running, self.scheduler.cycles_completed, snapshot
        )
    }
}

/// Effective configuration for display
#[derive(Debug, Clone, Serialize)]
pub struct ConfigView {
    pub source: Option<PathBuf>,
    pub config: EngineConfig,
    pub routing: RoutingTable,
}

impl TableDisplay for ConfigView {
    fn to_table(&self) -> String {
        let source = match &self.source {
            Some(path) => path.display().to_string(),
            None => "built-in defaults".to_string(),
        };
        let engine = &self.config.engine;
        let thresholds = &self.config.thresholds;

        let mut output = format!("Configuration: {}\n\n", source);
        output.push_str("Engine:\n");
        output.push_str(&format!(
            "  Check interval: {}s\n",
            engine.check_interval_seconds
        ));
        output.push_str(&format!(
            "  Consecutive failure threshold: {}\n",
            engine.consecutive_failure_threshold
        ));
        output.push_str(&format!("  Dedup window: {}s\n", engine.dedup_window_seconds));
        output.push_str(&format!(
            "  Recovery period: {} min\n",
            engine.alert_recovery_minutes
        ));
        output.push_str(&format!(
            "  Cooldown: {}s\n",
            engine.health_check_cooldown_seconds
        ));
        if let Some(max) = engine.max_runtime_seconds {
            output.push_str(&format!("  Max runtime: {}s\n", max));
        }
        output.push_str(&format!("  Source: {}\n", engine.source_name()));

        output.push_str("\nThresholds:\n");
        output.push_str(&format!(
            "  CPU {}%, memory {}%, disk {}%\n",
            thresholds.cpu, thresholds.memory, thresholds.disk
        ));
        output.push_str(&format!(
            "  Service slow at {}ms, down at {}ms\n",
            thresholds.slow_response_ms, thresholds.down_response_ms
        ));
        for (key, value) in &thresholds.overrides {
            output.push_str(&format!("  {} = {}\n", key, value));
        }

        output.push_str("\nChannels:\n");
        for id in ChannelId::ALL {
            output.push_str(&format!(
                "  {:<9} {}\n",
                id.as_str(),
                if self.config.channels.is_enabled(id) {
                    "enabled"
                } else {
                    "disabled"
                }
            ));
        }

        output.push_str("\nRouting:\n");
        output.push_str(&routing_table(&self.routing));

        output.push_str(&format!("\nProbes: {}\n", self.config.probes.len()));
        for probe in &self.config.probes {
            let target = probe
                .url
                .clone()
                .or_else(|| probe.file.as_ref().map(|f| f.display().to_string()))
                .unwrap_or_default();
            output.push_str(&format!("  {:<24} {:<8} {}\n", probe.key, probe.kind, target));
        }

        output
    }

    fn to_compact(&self) -> String {
        format!(
            "interval={}s threshold={} dedup={}s probes={}",
            self.config.engine.check_interval_seconds,
            self.config.engine.consecutive_failure_threshold,
            self.config.engine.dedup_window_seconds,
            self.config.probes.len()
        )
    }
}

/// A configuration file that passed validation
#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    pub path: PathBuf,
    pub probes: usize,
    pub routed_channels: usize,
}

impl TableDisplay for ValidationResult {
    fn to_table(&self) -> String {
        format!(
            "{}: valid ({} probe(s), {} routed channel(s))",
            self.path.display(),
            self.probes,
            self.routed_channels
        )
    }

    fn to_compact(&self) -> String {
        format!("{}=valid", self.path.display())
    }
}

/// A test alert accepted by a channel
#[derive(Debug, Clone, Serialize)]
pub struct ChannelTestResult {
    pub channel: ChannelId,
    pub delivered: bool,
    pub elapsed_ms: u64,
}

impl TableDisplay for ChannelTestResult {
    fn to_table(&self) -> String {
        format!(
            "{}: test alert delivered in {}ms",
            self.channel, self.elapsed_ms
        )
    }

    fn to_compact(&self) -> String {
        format!(
            "{}={}",
            self.channel,
            if self.delivered { "ok" } else { "failed" }
        )
    }
}

/// Simple message output
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub message: String,
    pub success: bool,
}

impl TableDisplay for Message {
    fn to_table(&self) -> String {
        if self.success {
            format!("✓ {}", self.message)
        } else {
            format!("✗ {}", self.message)
        }
    }
}
