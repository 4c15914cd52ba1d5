//! Status command implementation
//!
//! Reads the status document a running engine writes after each cycle.

use crate::cli::args::OutputFormat;
use crate::cli::output::print_output;
use crate::config::ConfigBuilder;
use crate::engine::EngineStatus;
use crate::error::{AppError, Result};
use std::path::{Path, PathBuf};

/// Execute the status command
pub fn run_status(file: Option<&Path>, format: OutputFormat, config_path: Option<&str>) -> Result<()> {
    let path = match file {
        Some(path) => path.to_path_buf(),
        None => status_path(config_path)?,
    };

    let status = EngineStatus::load(&path)?;
    print_output(&status, format)?;
    Ok(())
}

fn status_path(config_path: Option<&str>) -> Result<PathBuf> {
    let (config, _, _) = ConfigBuilder::new().with_file(config_path)?.build()?;
    config.engine.status_file.ok_or_else(|| {
        AppError::StatusUnavailable("(engine.status_file is not configured)".to_string())
    })
}
