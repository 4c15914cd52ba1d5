//! File-backed gauge
//!
//! Reads a single number from a file, e.g. one written by a cron job or an
//! exporter. An optional second number on the same line is the threshold.

use super::{MetricProvider, Reading};
use crate::error::CollectorError;
use async_trait::async_trait;
use std::path::PathBuf;

/// Provider reading `<value> [threshold]` from a file
#[derive(Debug, Clone)]
pub struct FileGauge {
    path: PathBuf,
}

impl FileGauge {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn parse(content: &str) -> Result<Reading, CollectorError> {
        let mut parts = content.split_whitespace();
        let parse = |s: &str| {
            s.parse::<f64>()
                .map_err(|_| CollectorError::Failed(format!("not a number: '{}'", s)))
        };

        let value = match parts.next() {
            Some(v) => parse(v)?,
            None => return Err(CollectorError::Failed("file is empty".to_string())),
        };
        match parts.next() {
            Some(t) => Ok(Reading::with_threshold(value, parse(t)?)),
            None => Ok(Reading::value(value)),
        }
    }
}

#[async_trait]
impl MetricProvider for FileGauge {
    async fn sample(&self) -> Result<Reading, CollectorError> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            CollectorError::Failed(format!("failed to read {}: {}", self.path.display(), e))
        })?;
        Self::parse(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse() {
        assert_eq!(FileGauge::parse("42.5\n").unwrap(), Reading::value(42.5));
        assert_eq!(
            FileGauge::parse("7 5").unwrap(),
            Reading::with_threshold(7.0, 5.0)
        );
        assert!(FileGauge::parse("").is_err());
        assert!(FileGauge::parse("abc").is_err());
    }

    #[tokio::test]
    async fn test_sample_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "91.0").unwrap();

        let gauge = FileGauge::new(file.path().to_path_buf());
        assert_eq!(gauge.sample().await.unwrap(), Reading::value(91.0));
    }

    #[tokio::test]
    async fn test_missing_file_is_collector_fault() {
        let gauge = FileGauge::new(PathBuf::from("/nonexistent/vigil/gauge"));
        assert!(matches!(
            gauge.sample().await,
            Err(CollectorError::Failed(_))
        ));
    }
}
