//! Run command implementation
//!
//! Starts the scheduler and keeps it running until Ctrl-C.

use super::{load_handle, run_check};
use crate::cli::args::{OutputFormat, RunArgs};
use crate::engine::Engine;
use crate::error::Result;
use crate::scheduler::Scheduler;
use std::sync::Arc;

/// Execute the run command
pub async fn run_engine(args: &RunArgs, format: OutputFormat, config_path: Option<&str>) -> Result<()> {
    if args.once {
        return run_check(&args.overrides, format, config_path).await;
    }

    let handle = load_handle(config_path, &args.overrides)?;
    let engine = Arc::new(Engine::from_config(Arc::clone(&handle)));

    let live = handle.current();
    println!(
        "Monitoring {} probe(s) every {}s",
        engine.probe_count(),
        live.config.engine.check_interval_seconds
    );
    if let Some(path) = handle.path() {
        println!("Watching {} for changes", path.display());
    }
    println!("Press Ctrl+C to stop");

    Scheduler::new(engine).run().await;
    Ok(())
}
