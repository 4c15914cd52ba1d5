//! Command handlers
//!
//! Each command handler orchestrates the execution of a CLI command.

pub mod check;
pub mod config;
pub mod run;
pub mod status;
pub mod test_channel;

pub use check::run_check;
pub use config::run_config;
pub use run::run_engine;
pub use status::run_status;
pub use test_channel::run_test_channel;

use crate::cli::args::OverrideArgs;
use crate::config::{ConfigBuilder, ConfigHandle};
use crate::error::Result;
use std::sync::Arc;

/// Load the configuration and wrap it for hot reload
fn load_handle(config_path: Option<&str>, overrides: &OverrideArgs) -> Result<Arc<ConfigHandle>> {
    let (config, path, overrides) = ConfigBuilder::new()
        .with_file(config_path)?
        .with_interval(overrides.interval)
        .with_consecutive_threshold(overrides.consecutive)
        .with_dedup_window(overrides.dedup_window)
        .with_max_runtime(overrides.max_runtime)
        .build()?;

    let handle = match path {
        Some(path) => ConfigHandle::with_file(config, path, overrides),
        None => {
            log::info!("No configuration file found, using defaults");
            ConfigHandle::new(config)
        }
    };
    Ok(Arc::new(handle))
}
