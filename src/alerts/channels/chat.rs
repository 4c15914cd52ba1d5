//! Bot-chat channel
//!
//! Posts the rendered text to a bot API (`{api_base}/bot{token}/sendMessage`)
//! once per chat id.

use super::{ChannelId, ChannelSender};
use crate::alerts::AlertMessage;
use crate::config::ChatConfig;
use crate::error::ChannelError;
use async_trait::async_trait;
use std::time::Duration;

pub struct ChatSender {
    endpoint: String,
    chat_ids: Vec<String>,
    client: reqwest::Client,
}

impl ChatSender {
    pub fn new(config: &ChatConfig, timeout: Duration) -> Result<Self, ChannelError> {
        if config.bot_token.trim().is_empty() {
            return Err(ChannelError::InvalidCredential(
                "bot_token is empty".to_string(),
            ));
        }
        if config.chat_ids.is_empty() {
            return Err(ChannelError::NotConfigured("chat (no chat_ids)".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ChannelError::from)?;

        Ok(Self {
            endpoint: format!(
                "{}/bot{}/sendMessage",
                config.api_base.trim_end_matches('/'),
                config.bot_token
            ),
            chat_ids: config.chat_ids.clone(),
            client,
        })
    }

    /// Map a bot API status to a channel error
    fn status_error(status: u16, chat_id: &str) -> ChannelError {
        match status {
            401 => ChannelError::InvalidCredential("bot token rejected".to_string()),
            400 | 403 => ChannelError::UnauthorizedRecipient(chat_id.to_string()),
            other => ChannelError::Status(other),
        }
    }

    async fn send_one(&self, chat_id: &str, text: &str) -> Result<(), ChannelError> {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "disable_web_page_preview": true,
        });

        let response = self.client.post(&self.endpoint).json(&body).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(Self::status_error(status.as_u16(), chat_id))
        }
    }
}

#[async_trait]
impl ChannelSender for ChatSender {
    fn id(&self) -> ChannelId {
        ChannelId::Chat
    }

    /// Succeeds when at least one chat id accepted the message
    async fn send(&self, message: &AlertMessage) -> Result<(), ChannelError> {
        let text = message.render_text();
        let mut first_error = None;
        let mut delivered = 0usize;

        for chat_id in &self.chat_ids {
            match self.send_one(chat_id, &text).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    log::warn!("Chat delivery to {} failed: {}", chat_id, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) if delivered == 0 => Err(e),
            _ => Ok(()),
        }
    }
}
