//! SMTP mail channel

use super::{ChannelId, ChannelSender};
use crate::alerts::AlertMessage;
use crate::config::{MailConfig, MailSecurity};
use crate::error::ChannelError;
use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;

/// Sends one plain-text mail to all recipients per alert
pub struct MailSender {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    recipients: Vec<Mailbox>,
}

impl MailSender {
    pub fn new(config: &MailConfig, timeout: Duration) -> Result<Self, ChannelError> {
        let from: Mailbox = config
            .from
            .parse()
            .map_err(|e| ChannelError::NotConfigured(format!("mail (invalid from: {})", e)))?;
        let recipients = Self::parse_recipients(&config.recipients)?;

        let builder = match config.security {
            MailSecurity::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
                .map_err(|e| ChannelError::Transport(e.to_string()))?,
            MailSecurity::Starttls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
                    .map_err(|e| ChannelError::Transport(e.to_string()))?
            }
            MailSecurity::None => {
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
            }
        };

        let mut builder = builder.port(config.smtp_port).timeout(Some(timeout));
        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            mailer: builder.build(),
            from,
            recipients,
        })
    }

    fn parse_recipients(recipients: &[String]) -> Result<Vec<Mailbox>, ChannelError> {
        if recipients.is_empty() {
            return Err(ChannelError::NotConfigured("mail (no recipients)".to_string()));
        }
        recipients
            .iter()
            .map(|r| {
                r.parse::<Mailbox>().map_err(|e| {
                    ChannelError::UnauthorizedRecipient(format!("{}: {}", r, e))
                })
            })
            .collect()
    }

    fn build(&self, message: &AlertMessage) -> Result<Message, ChannelError> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(message.subject())
            .header(ContentType::TEXT_PLAIN);
        for to in &self.recipients {
            builder = builder.to(to.clone());
        }
        builder
            .body(message.render_text())
            .map_err(|e| ChannelError::Transport(format!("failed to build mail: {}", e)))
    }
}

#[async_trait]
impl ChannelSender for MailSender {
    fn id(&self) -> ChannelId {
        ChannelId::Mail
    }

    async fn send(&self, message: &AlertMessage) -> Result<(), ChannelError> {
        let email = self.build(message)?;
        match self.mailer.send(email).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_timeout() => Err(ChannelError::Timeout),
            Err(e) => Err(ChannelError::Transport(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Priority, Severity};
    use chrono::Utc;

    fn config() -> MailConfig {
        MailConfig {
            enabled: true,
            from: "vigil@example.com".to_string(),
            recipients: vec!["ops@example.com".to_string(), "dba@example.com".to_string()],
            security: MailSecurity::None,
            ..Default::default()
        }
    }

    #[test]
    fn test_requires_sender_and_recipients() {
        let mut bad = config();
        bad.recipients.clear();
        assert!(matches!(
            MailSender::new(&bad, Duration::from_secs(5)),
            Err(ChannelError::NotConfigured(_))
        ));

        let mut bad = config();
        bad.from = "not an address".to_string();
        assert!(MailSender::new(&bad, Duration::from_secs(5)).is_err());
    }

    #[test]
    fn test_build_message() {
        let sender = MailSender::new(&config(), Duration::from_secs(5)).unwrap();
        let alert = AlertMessage::alert(
            "disk_root",
            "High disk usage",
            "disk usage is 97.0%",
            Severity::High,
            Priority::High,
            "db-02",
            Utc::now(),
        );

        let formatted = String::from_utf8(sender.build(&alert).unwrap().formatted()).unwrap();
        assert!(formatted.contains("Subject: [HIGH] High disk usage"));
        assert!(formatted.contains("dba@example.com"));
    }
}
