//! Configuration file loading
//!
//! Handles loading and saving configuration as TOML files.

use crate::config::EngineConfig;
use crate::error::ConfigError;

use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Configuration file handler
pub struct ConfigFile;

impl ConfigFile {
    /// Load and validate configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<EngineConfig, ConfigError> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound(path.display().to_string()))?;

        Self::parse(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn parse(content: &str) -> Result<EngineConfig, ConfigError> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file, creating parent directories
    pub fn save<P: AsRef<Path>>(config: &EngineConfig, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = toml::to_string_pretty(config)?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    ConfigError::ParseError(format!("Failed to create {}: {}", parent.display(), e))
                })?;
            }
        }
        std::fs::write(path, contents).map_err(|e| {
            ConfigError::ParseError(format!("Failed to write {}: {}", path.display(), e))
        })?;

        Ok(())
    }

    /// Find the first existing file among the default locations
    pub fn find_default() -> Option<PathBuf> {
        Self::default_paths().into_iter().find(|p| p.exists())
    }

    /// Get default configuration file paths
    pub fn default_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        // System-wide config
        paths.push(PathBuf::from("/etc/vigil/config.toml"));

        // User config
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("vigil").join("config.toml"));
        }

        // Current directory
        paths.push(PathBuf::from("vigil.toml"));

        paths
    }

    /// Path used by `vigil config init` when none is given
    pub fn user_path() -> PathBuf {
        match dirs::config_dir() {
            Some(dir) => dir.join("vigil").join("config.toml"),
            None => PathBuf::from("vigil.toml"),
        }
    }

    /// Last modification time, used to detect edits for hot reload
    pub fn modified<P: AsRef<Path>>(path: P) -> Option<SystemTime> {
        std::fs::metadata(path).and_then(|m| m.modified()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_paths_not_empty() {
        let paths = ConfigFile::default_paths();
        assert!(!paths.is_empty());
    }

    #[test]
    fn test_load_missing_file() {
        let result = ConfigFile::load("/nonexistent/path/config.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_parse_partial_file_uses_defaults() {
        let config = ConfigFile::parse(
            r#"
            [engine]
            consecutive_failure_threshold = 5

            [thresholds]
            cpu = 75.0

            [routing]
            critical = ["chat", "pager"]
            "#,
        )
        .unwrap();

        assert_eq!(config.engine.consecutive_failure_threshold, 5);
        assert_eq!(config.engine.check_interval_seconds, 60);
        assert_eq!(config.thresholds.cpu, 75.0);
        assert_eq!(config.thresholds.disk, 90.0);
        assert_eq!(config.routing.critical, vec!["chat", "pager"]);
    }

    #[test]
    fn test_parse_rejects_invalid_values() {
        let result = ConfigFile::parse("[engine]\ncheck_interval_seconds = 0\n");
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));

        let result = ConfigFile::parse("[engine\n");
        assert!(matches!(result, Err(ConfigError::TomlError(_))));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = EngineConfig::default();
        config.engine.dedup_window_seconds = 900;
        ConfigFile::save(&config, &path).unwrap();

        let loaded = ConfigFile::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert!(ConfigFile::modified(&path).is_some());
    }

    #[test]
    fn test_load_probes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [[probes]]
            key = "high_cpu"
            kind = "cpu"
            file = "/run/vigil/cpu"

            [[probes]]
            key = "service_web"
            kind = "service"
            url = "http://localhost:8080/health"
            priority = "critical"
            "#
        )
        .unwrap();

        let config = ConfigFile::load(file.path()).unwrap();
        assert_eq!(config.probes.len(), 2);
        assert_eq!(
            config.probes[1].priority,
            Some(crate::domain::Priority::Critical)
        );
    }
}
