//! Configuration builder
//!
//! Merges configuration from files and CLI arguments. CLI values are kept as
//! [`ConfigOverrides`] so they survive a hot reload of the file.

use crate::config::{ConfigFile, EngineConfig};
use crate::error::ConfigError;
use std::path::PathBuf;

/// CLI values that take precedence over the file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub check_interval_seconds: Option<u64>,
    pub consecutive_failure_threshold: Option<u32>,
    pub dedup_window_seconds: Option<u64>,
    pub max_runtime_seconds: Option<u64>,
}

impl ConfigOverrides {
    /// Apply overrides to a loaded configuration
    pub fn apply(&self, config: &mut EngineConfig) {
        if let Some(i) = self.check_interval_seconds {
            config.engine.check_interval_seconds = i;
        }
        if let Some(t) = self.consecutive_failure_threshold {
            config.engine.consecutive_failure_threshold = t;
        }
        if let Some(w) = self.dedup_window_seconds {
            config.engine.dedup_window_seconds = w;
        }
        if let Some(m) = self.max_runtime_seconds {
            config.engine.max_runtime_seconds = Some(m);
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Builder for merging configuration sources
pub struct ConfigBuilder {
    config: EngineConfig,
    path: Option<PathBuf>,
    overrides: ConfigOverrides,
}

impl ConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            path: None,
            overrides: ConfigOverrides::default(),
        }
    }

    /// Load configuration from a file
    ///
    /// An explicit path must exist. Without one, the default locations are
    /// searched and built-in defaults are used if none exists.
    pub fn with_file(mut self, path: Option<&str>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => Some(PathBuf::from(p)),
            None => ConfigFile::find_default(),
        };

        if let Some(path) = path {
            self.config = ConfigFile::load(&path)?;
            log::info!("Loaded config from {}", path.display());
            self.path = Some(path);
        }

        Ok(self)
    }

    /// Override with CLI interval
    pub fn with_interval(mut self, interval: Option<u64>) -> Self {
        if interval.is_some() {
            self.overrides.check_interval_seconds = interval;
        }
        self
    }

    /// Override with CLI consecutive-failure threshold
    pub fn with_consecutive_threshold(mut self, threshold: Option<u32>) -> Self {
        if threshold.is_some() {
            self.overrides.consecutive_failure_threshold = threshold;
        }
        self
    }

    /// Override with CLI dedup window
    pub fn with_dedup_window(mut self, seconds: Option<u64>) -> Self {
        if seconds.is_some() {
            self.overrides.dedup_window_seconds = seconds;
        }
        self
    }

    /// Override with CLI max runtime
    pub fn with_max_runtime(mut self, seconds: Option<u64>) -> Self {
        if seconds.is_some() {
            self.overrides.max_runtime_seconds = seconds;
        }
        self
    }

    /// Build the final configuration, its source path and the overrides
    pub fn build(self) -> Result<(EngineConfig, Option<PathBuf>, ConfigOverrides), ConfigError> {
        let mut config = self.config;
        self.overrides.apply(&mut config);
        config.validate()?;
        Ok((config, self.path, self.overrides))
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
