//! vigil - health-check scheduler and alert escalation library
//!
//! Samples registered probes on a fixed interval, classifies each reading
//! into a severity tier, escalates conditions that stay broken for several
//! consecutive cycles and routes the resulting alerts to chat, mail,
//! webhook and console channels by priority.
//!
//! # Modules
//!
//! - [`alerts`]: Message formatting, routing, channel senders and dispatch
//! - [`cli`]: Command-line interface definitions
//! - [`clock`]: Wall-clock abstraction
//! - [`commands`]: Command handlers
//! - [`config`]: Configuration system with hot reload
//! - [`diagnostics`]: Ring buffers of recent cycles, deliveries and faults
//! - [`domain`]: Severity, priority and snapshot models
//! - [`engine`]: Evaluation pipeline and status query
//! - [`error`]: Error types
//! - [`escalation`]: Per-key escalation state
//! - [`probes`]: Metric providers
//! - [`scheduler`]: Single-flight guard and interval loop

pub mod alerts;
pub mod cli;
pub mod clock;
pub mod commands;
pub mod config;
pub mod diagnostics;
pub mod domain;
pub mod engine;
pub mod error;
pub mod escalation;
pub mod probes;
pub mod scheduler;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use engine::{Engine, EngineStatus};
pub use error::{AppError, Result};
