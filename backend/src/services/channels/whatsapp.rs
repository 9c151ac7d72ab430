//! WhatsApp HTTP gateway client

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::to_international_phone;

use super::{ChannelError, MessageChannel};
use crate::services::runtime_config::WhatsAppRuntimeConfig;

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    api_key: &'a str,
    sender: &'a str,
    number: &'a str,
    message: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct SendMessageResponse {
    #[serde(default)]
    status: bool,
    #[serde(default)]
    message: String,
}

pub struct WhatsAppChannel {
    http_client: reqwest::Client,
    config: WhatsAppRuntimeConfig,
}

impl WhatsAppChannel {
    pub fn new(http_client: reqwest::Client, config: WhatsAppRuntimeConfig) -> Self {
        Self { http_client, config }
    }

    fn ensure_configured(&self) -> Result<(), ChannelError> {
        if self.config.url.trim().is_empty() || self.config.api_key.trim().is_empty() {
            return Err(ChannelError::NotConfigured(
                "WhatsApp API configuration not set".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl MessageChannel for WhatsAppChannel {
    async fn send(&self, recipient: &str, message: &str) -> Result<(), ChannelError> {
        self.ensure_configured()?;

        let number = to_international_phone(recipient.trim());
        let request = SendMessageRequest {
            api_key: &self.config.api_key,
            sender: &self.config.sender,
            number: &number,
            message,
        };

        let response = self
            .http_client
            .post(&self.config.url)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        // Gateways answer with an HTML error page on some failures
        let body: SendMessageResponse = response.json().await.unwrap_or_default();

        if !status.is_success() || !body.status {
            return Err(ChannelError::Rejected {
                status: status.as_u16(),
                message: body.message,
            });
        }

        tracing::debug!(number = %number, "WhatsApp message accepted");
        Ok(())
    }
}
