//! Unified error types for vigil
//!
//! This module defines all error types used throughout the engine.
//! Uses thiserror for ergonomic error definitions.

use std::time::Duration;
use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from configuration parsing/validation
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Error from the evaluation engine
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Error from a notification channel
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Error writing the local fallback record
    #[error("Fallback error: {0}")]
    Fallback(#[from] FallbackError),

    /// Status document not available
    #[error("No status available at {0}. Is the engine running with `status_file` set?")]
    StatusUnavailable(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from configuration parsing and validation
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    /// Refusing to overwrite an existing file
    #[error("Configuration file already exists: {0}")]
    AlreadyExists(String),

    /// Failed to parse config file
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Invalid config value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl ConfigError {
    /// Shorthand for an invalid value error
    pub fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Errors from a metric provider
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CollectorError {
    /// Provider reported a failure
    #[error("probe failed: {0}")]
    Failed(String),

    /// Provider exceeded the probe timeout
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),

    /// Provider returned NaN or infinity
    #[error("probe returned a non-finite value: {0}")]
    NonFinite(f64),
}

/// Errors from a channel sender
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// Bot token / SMTP credentials rejected
    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    /// Recipient refused the message (e.g. bot not allowed in chat)
    #[error("unauthorized recipient: {0}")]
    UnauthorizedRecipient(String),

    /// Send did not complete in time
    #[error("timed out")]
    Timeout,

    /// Non-success HTTP status
    #[error("unexpected status {0}")]
    Status(u16),

    /// Network or protocol failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Channel is routed but has no usable sender
    #[error("channel '{0}' is not configured")]
    NotConfigured(String),
}

impl From<reqwest::Error> for ChannelError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if let Some(status) = err.status() {
            Self::Status(status.as_u16())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Errors from the evaluation engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Single-flight guard is held by another cycle
    #[error("a health-check cycle is already running")]
    CycleInProgress,

    /// Cycle exceeded `max_runtime_seconds`
    #[error("health-check cycle exceeded {0:?}")]
    CycleTimeout(Duration),
}

/// Errors from the local fallback record
#[derive(Error, Debug)]
pub enum FallbackError {
    /// Failed to write the record
    #[error("failed to write fallback record to {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },

    /// Failed to encode the record
    #[error("failed to encode fallback record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::invalid("thresholds.cpu", "must be greater than 0");
        assert_eq!(
            err.to_string(),
            "Invalid configuration value for 'thresholds.cpu': must be greater than 0"
        );
    }

    #[test]
    fn test_channel_error_display() {
        let err = ChannelError::NotConfigured("mail".to_string());
        assert!(err.to_string().contains("mail"));
        assert_eq!(ChannelError::Status(503).to_string(), "unexpected status 503");
    }

    #[test]
    fn test_engine_error_display() {
        let err = EngineError::CycleTimeout(Duration::from_secs(30));
        assert!(err.to_string().contains("30s"));
    }

    #[test]
    fn test_error_conversion() {
        let engine_err = EngineError::CycleInProgress;
        let app_err: AppError = engine_err.into();
        assert!(matches!(app_err, AppError::Engine(_)));
    }
}
