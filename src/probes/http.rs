//! HTTP service probe

use super::{MetricProvider, Reading};
use crate::error::CollectorError;
use async_trait::async_trait;
use std::time::{Duration, Instant};

/// Measures the response time of a GET request in milliseconds
///
/// A connection error, timeout or non-success status counts as no response.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    url: String,
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(url: String, timeout: Duration) -> Result<Self, CollectorError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CollectorError::Failed(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { url, client })
    }
}

#[async_trait]
impl MetricProvider for HttpProbe {
    async fn sample(&self) -> Result<Reading, CollectorError> {
        let started = Instant::now();
        match self.client.get(&self.url).send().await {
            Ok(response) if response.status().is_success() => {
                Ok(Reading::value(started.elapsed().as_secs_f64() * 1000.0))
            }
            Ok(response) => {
                log::debug!("{} answered {}", self.url, response.status());
                Ok(Reading::no_response())
            }
            Err(e) => {
                log::debug!("{} unreachable: {}", self.url, e);
                Ok(Reading::no_response())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_service_has_no_response() {
        // Port 9 (discard) on localhost is closed on test machines
        let probe = HttpProbe::new(
            "http://127.0.0.1:9/health".to_string(),
            Duration::from_secs(2),
        )
        .unwrap();
        assert_eq!(probe.sample().await.unwrap(), Reading::no_response());
    }
}
