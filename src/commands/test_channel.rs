//! Test-channel command implementation
//!
//! Sends one synthetic alert through a single channel, whether or not the
//! channel is enabled, so credentials can be checked before routing to it.

use crate::alerts::{build_sender, AlertMessage, ChannelId, ChannelSender};
use crate::cli::args::OutputFormat;
use crate::cli::output::{print_output, ChannelTestResult};
use crate::config::ConfigBuilder;
use crate::domain::{Priority, Severity};
use crate::error::{ChannelError, Result};
use chrono::Utc;
use std::time::{Duration, Instant};

/// Execute the test-channel command
pub async fn run_test_channel(
    channel: ChannelId,
    format: OutputFormat,
    config_path: Option<&str>,
) -> Result<()> {
    let (config, _, _) = ConfigBuilder::new().with_file(config_path)?.build()?;
    if !config.channels.is_enabled(channel) {
        log::info!("Channel '{}' is disabled; testing it anyway", channel);
    }

    let timeout = config.engine.dispatch_timeout();
    let sender = build_sender(channel, &config.channels, timeout)?;
    let message = test_message(config.engine.source_name());

    let started = Instant::now();
    send_with_timeout(sender.as_ref(), &message, timeout).await?;

    print_output(
        &ChannelTestResult {
            channel,
            delivered: true,
            elapsed_ms: started.elapsed().as_millis() as u64,
        },
        format,
    )?;
    Ok(())
}

fn test_message(source: String) -> AlertMessage {
    AlertMessage::alert(
        "vigil_test",
        "Test alert",
        "This is a test alert from vigil. No action is needed.",
        Severity::Warning,
        Priority::Low,
        source,
        Utc::now(),
    )
}

async fn send_with_timeout(
    sender: &dyn ChannelSender,
    message: &AlertMessage,
    timeout: Duration,
) -> std::result::Result<(), ChannelError> {
    match tokio::time::timeout(timeout, sender.send(message)).await {
        Ok(result) => result,
        Err(_) => Err(ChannelError::Timeout),
    }
}
