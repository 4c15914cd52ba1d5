//! Terminal channel

use super::{ChannelId, ChannelSender};
use crate::alerts::AlertMessage;
use crate::error::ChannelError;
use async_trait::async_trait;
use std::io::{self, Write};

/// Writes alerts to stderr (or stdout) with colored markers
pub struct ConsoleSender {
    /// Use stderr instead of stdout
    use_stderr: bool,
    /// Use colors (ANSI escape codes)
    use_colors: bool,
}

impl ConsoleSender {
    /// Console sender on stderr; colors only if requested and supported
    pub fn new(color: bool) -> Self {
        Self {
            use_stderr: true,
            use_colors: color && Self::supports_color(),
        }
    }

    /// Console sender on stdout without colors
    pub fn stdout() -> Self {
        Self {
            use_stderr: false,
            use_colors: false,
        }
    }

    /// Check if terminal supports colors
    fn supports_color() -> bool {
        std::env::var("TERM")
            .map(|term| term != "dumb")
            .unwrap_or(false)
            && std::env::var_os("NO_COLOR").is_none()
    }

    fn format(&self, message: &AlertMessage) -> String {
        let marker = message.marker();
        let line = message.render_line();
        if self.use_colors {
            format!("{}{}\x1b[0m {}", marker.ansi(), marker, line)
        } else {
            format!("{} {}", marker, line)
        }
    }
}

#[async_trait]
impl ChannelSender for ConsoleSender {
    fn id(&self) -> ChannelId {
        ChannelId::Console
    }

    async fn send(&self, message: &AlertMessage) -> Result<(), ChannelError> {
        let line = self.format(message);
        let written = if self.use_stderr {
            writeln!(io::stderr().lock(), "{}", line)
        } else {
            writeln!(io::stdout().lock(), "{}", line)
        };
        written.map_err(|e| ChannelError::Transport(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Priority, Severity};
    use chrono::Utc;

    fn message() -> AlertMessage {
        AlertMessage::alert(
            "high_cpu",
            "High CPU usage",
            "cpu usage is 91.0%",
            Severity::Medium,
            Priority::High,
            "web-01",
            Utc::now(),
        )
    }

    #[test]
    fn test_format_without_color() {
        let sender = ConsoleSender::stdout();
        let line = sender.format(&message());
        assert!(line.starts_with("🟡 "));
        assert!(line.contains("MEDIUM High CPU usage"));
        assert!(!line.contains("\x1b["));
    }

    #[tokio::test]
    async fn test_send() {
        let sender = ConsoleSender::stdout();
        assert!(sender.send(&message()).await.is_ok());
    }
}
