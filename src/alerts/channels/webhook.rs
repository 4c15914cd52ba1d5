//! HTTP webhook channel

use super::{ChannelId, ChannelSender};
use crate::alerts::AlertMessage;
use crate::config::WebhookConfig;
use crate::error::ChannelError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;

/// POSTs the JSON payload; any 2xx within the timeout is a success
pub struct WebhookSender {
    url: String,
    headers: BTreeMap<String, String>,
    client: reqwest::Client,
}

impl WebhookSender {
    pub fn new(config: &WebhookConfig, timeout: Duration) -> Result<Self, ChannelError> {
        let url = config.url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ChannelError::NotConfigured(format!(
                "webhook (invalid url '{}')",
                config.url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ChannelError::from)?;

        Ok(Self {
            url: url.to_string(),
            headers: config.headers.clone(),
            client,
        })
    }
}

#[async_trait]
impl ChannelSender for WebhookSender {
    fn id(&self) -> ChannelId {
        ChannelId::Webhook
    }

    async fn send(&self, message: &AlertMessage) -> Result<(), ChannelError> {
        let mut request = self.client.post(&self.url);
        for (key, value) in &self.headers {
            request = request.header(key, value);
        }

        let response = request.json(&message.payload()).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ChannelError::Status(status.as_u16()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_missing_url() {
        let config = WebhookConfig {
            enabled: true,
            ..Default::default()
        };
        assert!(matches!(
            WebhookSender::new(&config, Duration::from_secs(5)),
            Err(ChannelError::NotConfigured(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_fails() {
        let config = WebhookConfig {
            enabled: true,
            url: "http://127.0.0.1:9/hook".to_string(),
            headers: BTreeMap::new(),
        };
        let sender = WebhookSender::new(&config, Duration::from_secs(2)).unwrap();
        let message = AlertMessage::recovery("high_cpu", "web-01", 10, chrono::Utc::now());
        assert!(sender.send(&message).await.is_err());
    }
}
