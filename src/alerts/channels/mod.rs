//! Notification channels
//!
//! Every transport implements [`ChannelSender`]. Senders only report success
//! or failure; they never retry at the message level.

mod chat;
mod console;
mod mail;
mod webhook;

pub use chat::ChatSender;
pub use console::ConsoleSender;
pub use mail::MailSender;
pub use webhook::WebhookSender;

use super::AlertMessage;
use crate::config::ChannelsConfig;
use crate::error::ChannelError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Channel identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelId {
    /// Bot-chat API
    Chat,
    /// SMTP mail
    Mail,
    /// HTTP webhook
    Webhook,
    /// Local terminal
    Console,
}

impl ChannelId {
    pub const ALL: [ChannelId; 4] = [Self::Chat, Self::Mail, Self::Webhook, Self::Console];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Mail => "mail",
            Self::Webhook => "webhook",
            Self::Console => "console",
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "chat" | "telegram" | "bot" => Ok(Self::Chat),
            "mail" | "email" | "smtp" => Ok(Self::Mail),
            "webhook" | "http" => Ok(Self::Webhook),
            "console" | "terminal" => Ok(Self::Console),
            _ => Err(format!("Unknown channel: {}", s)),
        }
    }
}

/// One notification transport
#[async_trait]
pub trait ChannelSender: Send + Sync {
    /// Channel this sender serves
    fn id(&self) -> ChannelId;

    /// Deliver one message
    async fn send(&self, message: &AlertMessage) -> Result<(), ChannelError>;
}

/// Build the sender for one channel, regardless of its enable flag
pub fn build_sender(
    id: ChannelId,
    channels: &ChannelsConfig,
    timeout: Duration,
) -> Result<Arc<dyn ChannelSender>, ChannelError> {
    let sender: Arc<dyn ChannelSender> = match id {
        ChannelId::Chat => Arc::new(ChatSender::new(&channels.chat, timeout)?),
        ChannelId::Mail => Arc::new(MailSender::new(&channels.mail, timeout)?),
        ChannelId::Webhook => Arc::new(WebhookSender::new(&channels.webhook, timeout)?),
        ChannelId::Console => Arc::new(ConsoleSender::new(channels.console.color)),
    };
    Ok(sender)
}

/// Build senders for every enabled and usable channel
///
/// A channel that is enabled but cannot be built is logged and left out; the
/// dispatcher then records it as failed whenever it is routed.
pub fn senders_from_config(
    channels: &ChannelsConfig,
    timeout: Duration,
) -> BTreeMap<ChannelId, Arc<dyn ChannelSender>> {
    let mut senders = BTreeMap::new();

    for id in ChannelId::ALL {
        if !channels.is_enabled(id) {
            continue;
        }
        match build_sender(id, channels, timeout) {
            Ok(sender) => {
                senders.insert(id, sender);
            }
            Err(e) => log::warn!("Channel '{}' is enabled but unusable: {}", id, e),
        }
    }

    senders
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_id_parse() {
        assert_eq!("chat".parse::<ChannelId>().unwrap(), ChannelId::Chat);
        assert_eq!("Telegram".parse::<ChannelId>().unwrap(), ChannelId::Chat);
        assert_eq!("email".parse::<ChannelId>().unwrap(), ChannelId::Mail);
        assert_eq!(" webhook ".parse::<ChannelId>().unwrap(), ChannelId::Webhook);
        assert!("pager".parse::<ChannelId>().is_err());
    }

    #[test]
    fn test_channel_id_serde() {
        let json = serde_json::to_string(&ChannelId::Mail).unwrap();
        assert_eq!(json, "\"mail\"");
    }

    #[test]
    fn test_senders_from_default_config() {
        let senders = senders_from_config(&ChannelsConfig::default(), Duration::from_secs(5));
        assert_eq!(senders.keys().copied().collect::<Vec<_>>(), vec![ChannelId::Console]);
    }

    #[test]
    fn test_misconfigured_channel_is_left_out() {
        let mut channels = ChannelsConfig::default();
        channels.chat.enabled = true; // no token, no chat ids
        channels.webhook.enabled = true;
        channels.webhook.url = "https://hooks.example.com/alert".to_string();

        let senders = senders_from_config(&channels, Duration::from_secs(5));
        assert!(!senders.contains_key(&ChannelId::Chat));
        assert!(senders.contains_key(&ChannelId::Webhook));
    }

    #[test]
    fn test_build_sender_ignores_enable_flag() {
        let channels = ChannelsConfig::default();
        assert!(!channels.is_enabled(ChannelId::Chat));
        assert!(matches!(
            build_sender(ChannelId::Chat, &channels, Duration::from_secs(5)),
            Err(ChannelError::InvalidCredential(_))
        ));
        assert!(build_sender(ChannelId::Console, &channels, Duration::from_secs(5)).is_ok());
    }
}
