//! Plain-text SMTP email

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use super::{ChannelError, MessageChannel};
use crate::services::runtime_config::EmailRuntimeConfig;

/// Port that expects TLS from the first byte instead of STARTTLS
const IMPLICIT_TLS_PORT: u16 = 465;

pub struct EmailChannel {
    config: EmailRuntimeConfig,
    subject: String,
}

impl EmailChannel {
    pub fn new(config: EmailRuntimeConfig, subject: &str) -> Self {
        Self {
            config,
            subject: subject.to_string(),
        }
    }

    fn build_message(&self, recipient: &str, body: &str) -> Result<Message, ChannelError> {
        if self.config.host.trim().is_empty() || self.config.from_email.trim().is_empty() {
            return Err(ChannelError::NotConfigured(
                "SMTP configuration not set".to_string(),
            ));
        }

        let from_address = self
            .config
            .from_email
            .trim()
            .parse::<Address>()
            .map_err(|_| ChannelError::InvalidAddress(self.config.from_email.clone()))?;
        let from_name = self.config.from_name.trim();
        let from = Mailbox::new(
            (!from_name.is_empty()).then(|| from_name.to_string()),
            from_address,
        );
        let to = recipient
            .trim()
            .parse::<Mailbox>()
            .map_err(|_| ChannelError::InvalidAddress(recipient.to_string()))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(self.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| ChannelError::Smtp(e.to_string()))
    }

    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, ChannelError> {
        let builder = if self.config.port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.host)
        }
        .map_err(|e| ChannelError::Smtp(e.to_string()))?
        .port(self.config.port);

        let builder = if self.config.username.is_empty() {
            builder
        } else {
            builder.credentials(Credentials::new(
                self.config.username.clone(),
                self.config.password.clone(),
            ))
        };

        Ok(builder.build())
    }
}

#[async_trait]
impl MessageChannel for EmailChannel {
    async fn send(&self, recipient: &str, message: &str) -> Result<(), ChannelError> {
        let email = self.build_message(recipient, message)?;

        self.transport()?
            .send(email)
            .await
            .map_err(|e| ChannelError::Smtp(e.to_string()))?;

        tracing::debug!(recipient = %recipient, subject = %self.subject, "Email sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EmailRuntimeConfig {
        EmailRuntimeConfig {
            host: "smtp.example.com".to_string(),
            port: 587,
            username: String::new(),
            password: String::new(),
            from_email: "noreply@example.com".to_string(),
            from_name: "TatApps".to_string(),
        }
    }

    #[test]
    fn test_build_message_sets_headers() {
        let channel = EmailChannel::new(config(), "Low Stock Alert - 2 Items");
        let message = channel.build_message("ops@gudang.co.id", "body").unwrap();
        let formatted = String::from_utf8(message.formatted()).unwrap();

        assert!(formatted.contains("Subject: Low Stock Alert - 2 Items"));
        assert!(formatted.contains("To: ops@gudang.co.id"));
        assert!(formatted.contains("TatApps <noreply@example.com>"));
    }

    #[test]
    fn test_invalid_recipient() {
        let channel = EmailChannel::new(config(), "subject");
        let err = channel.build_message("not-an-address", "body").unwrap_err();
        assert!(matches!(err, ChannelError::InvalidAddress(_)));
    }

    #[test]
    fn test_missing_host_is_not_configured() {
        let mut config = config();
        config.host = String::new();
        let channel = EmailChannel::new(config, "subject");
        let err = channel.build_message("ops@gudang.co.id", "body").unwrap_err();
        assert!(matches!(err, ChannelError::NotConfigured(_)));
    }
}
