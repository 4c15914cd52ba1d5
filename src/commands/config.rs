//! Config command implementation
//!
//! Writes, shows and validates configuration files.

use crate::alerts::RoutingTable;
use crate::cli::args::{ConfigArgs, ConfigCommands, OutputFormat};
use crate::cli::output::{print_output, ConfigView, Message, ValidationResult};
use crate::config::{ConfigBuilder, ConfigFile, EngineConfig};
use crate::error::{ConfigError, Result};
use std::path::{Path, PathBuf};

/// Execute config commands
pub fn run_config(args: &ConfigArgs, format: OutputFormat, config_path: Option<&str>) -> Result<()> {
    match &args.command {
        ConfigCommands::Init { path, force } => run_config_init(path.as_deref(), *force, format),
        ConfigCommands::Show => run_config_show(format, config_path),
        ConfigCommands::Validate { path } => {
            let path = path
                .clone()
                .or_else(|| config_path.map(PathBuf::from))
                .or_else(ConfigFile::find_default)
                .ok_or_else(|| {
                    ConfigError::FileNotFound("no configuration file in the default locations".to_string())
                })?;
            run_config_validate(&path, format)
        }
    }
}

fn run_config_init(path: Option<&Path>, force: bool, format: OutputFormat) -> Result<()> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(ConfigFile::user_path);
    write_default(&path, force)?;

    print_output(
        &Message {
            message: format!("Wrote default configuration to {}", path.display()),
            success: true,
        },
        format,
    )?;
    Ok(())
}

fn write_default(path: &Path, force: bool) -> std::result::Result<(), ConfigError> {
    if path.exists() && !force {
        return Err(ConfigError::AlreadyExists(path.display().to_string()));
    }
    ConfigFile::save(&EngineConfig::default(), path)
}

fn run_config_show(format: OutputFormat, config_path: Option<&str>) -> Result<()> {
    let (config, source, _) = ConfigBuilder::new().with_file(config_path)?.build()?;
    let routing = RoutingTable::from_config(&config.routing, &config.channels);

    print_output(
        &ConfigView {
            source,
            config,
            routing,
        },
        format,
    )?;
    Ok(())
}

fn validate(path: &Path) -> std::result::Result<ValidationResult, ConfigError> {
    let config = ConfigFile::load(path)?;
    let routing = RoutingTable::from_config(&config.routing, &config.channels);
    let mut routed: Vec<_> = routing.routes().values().flatten().copied().collect();
    routed.sort();
    routed.dedup();

    Ok(ValidationResult {
        path: path.to_path_buf(),
        probes: config.probes.len(),
        routed_channels: routed.len(),
    })
}

fn run_config_validate(path: &Path, format: OutputFormat) -> Result<()> {
    let result = validate(path)?;
    print_output(&result, format)?;
    Ok(())
}
