//! Live configuration with hot reload
//!
//! Cycles take an `Arc<LiveConfig>` at start and keep it for the whole cycle.
//! A reload swaps in a new `Arc`; a config that fails to load or validate is
//! rejected and the last-known-good one stays active.

use crate::alerts::RoutingTable;
use crate::config::{ConfigFile, ConfigOverrides, EngineConfig};
use crate::error::ConfigError;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use std::time::SystemTime;

/// Validated configuration plus its resolved routing table
#[derive(Debug, Clone, PartialEq)]
pub struct LiveConfig {
    pub config: EngineConfig,
    pub routing: RoutingTable,
    /// Incremented on every accepted reload
    pub generation: u64,
}

impl LiveConfig {
    fn new(config: EngineConfig, generation: u64) -> Self {
        let routing = RoutingTable::from_config(&config.routing, &config.channels);
        Self {
            config,
            routing,
            generation,
        }
    }
}

/// Shared handle to the live configuration
#[derive(Debug)]
pub struct ConfigHandle {
    path: Option<PathBuf>,
    overrides: ConfigOverrides,
    live: RwLock<Arc<LiveConfig>>,
    last_modified: Mutex<Option<SystemTime>>,
}

impl ConfigHandle {
    /// Wrap an in-memory configuration with no backing file
    pub fn new(config: EngineConfig) -> Self {
        Self {
            path: None,
            overrides: ConfigOverrides::default(),
            live: RwLock::new(Arc::new(LiveConfig::new(config, 1))),
            last_modified: Mutex::new(None),
        }
    }

    /// Wrap a configuration loaded from `path`, remembering CLI overrides
    pub fn with_file(config: EngineConfig, path: PathBuf, overrides: ConfigOverrides) -> Self {
        let modified = ConfigFile::modified(&path);
        Self {
            path: Some(path),
            overrides,
            live: RwLock::new(Arc::new(LiveConfig::new(config, 1))),
            last_modified: Mutex::new(modified),
        }
    }

    /// Current configuration
    pub fn current(&self) -> Arc<LiveConfig> {
        let guard = self.live.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Backing file, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Validate and activate a new configuration
    pub fn replace(&self, mut config: EngineConfig) -> Result<u64, ConfigError> {
        self.overrides.apply(&mut config);
        if let Err(e) = config.validate() {
            log::warn!("Rejected configuration, keeping last-known-good: {}", e);
            return Err(e);
        }

        let mut guard = self.live.write().unwrap_or_else(|e| e.into_inner());
        let generation = guard.generation + 1;
        *guard = Arc::new(LiveConfig::new(config, generation));
        log::info!("Activated configuration generation {}", generation);
        Ok(generation)
    }

    /// Reload from the backing file
    ///
    /// Returns `Ok(false)` when there is no backing file.
    pub fn reload(&self) -> Result<bool, ConfigError> {
        let Some(path) = &self.path else {
            return Ok(false);
        };

        *self.last_modified.lock().unwrap_or_else(|e| e.into_inner()) =
            ConfigFile::modified(path);

        match ConfigFile::load(path) {
            Ok(config) => {
                self.replace(config)?;
                Ok(true)
            }
            Err(e) => {
                log::warn!(
                    "Failed to reload {}, keeping last-known-good: {}",
                    path.display(),
                    e
                );
                Err(e)
            }
        }
    }

    /// Reload only if the backing file changed since the last load
    pub fn reload_if_changed(&self) -> Result<bool, ConfigError> {
        let Some(path) = &self.path else {
            return Ok(false);
        };

        let modified = ConfigFile::modified(path);
        let changed = {
            let last = self.last_modified.lock().unwrap_or_else(|e| e.into_inner());
            modified.is_some() && modified != *last
        };

        if changed {
            self.reload()
        } else {
            Ok(false)
        }
    }
}
