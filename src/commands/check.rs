//! Check command implementation
//!
//! Runs one cycle through the manual-trigger path and prints the snapshot.

use super::load_handle;
use crate::cli::args::{OutputFormat, OverrideArgs};
use crate::cli::output::print_output;
use crate::engine::Engine;
use crate::error::Result;

/// Execute the check command
pub async fn run_check(
    overrides: &OverrideArgs,
    format: OutputFormat,
    config_path: Option<&str>,
) -> Result<()> {
    let handle = load_handle(config_path, overrides)?;
    let engine = Engine::from_config(handle);
    if engine.probe_count() == 0 {
        log::warn!("No probes configured; add [[probes]] to the configuration");
    }

    let snapshot = engine.trigger().await?;
    print_output(&snapshot, format)?;
    Ok(())
}
