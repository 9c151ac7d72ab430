//! Outbound delivery channels (WhatsApp gateway and SMTP email)

pub mod email;
pub mod whatsapp;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::services::runtime_config::{
    resolve_email_config, resolve_whatsapp_config, ChannelDefaults, SiteSettingsCache,
};

pub use email::EmailChannel;
pub use whatsapp::WhatsAppChannel;

#[derive(Error, Debug)]
pub enum ChannelError {
    /// Missing credentials or endpoint, detected at send time
    #[error("{0}")]
    NotConfigured(String),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("failed to send email: {0}")]
    Smtp(String),

    #[error("invalid address {0:?}")]
    InvalidAddress(String),
}

/// A capability to deliver a text message to one recipient
#[async_trait]
pub trait MessageChannel: Send + Sync {
    async fn send(&self, recipient: &str, message: &str) -> Result<(), ChannelError>;
}

/// Channels resolved for one tick or request
#[derive(Clone)]
pub struct Channels {
    pub whatsapp: Arc<dyn MessageChannel>,
    pub email: Arc<dyn MessageChannel>,
}

/// Builds channels from the current runtime configuration
#[async_trait]
pub trait ChannelProvider: Send + Sync {
    /// `email_subject` is used for every email sent through the returned channels
    async fn channels(&self, email_subject: &str) -> Channels;
}

/// Channel provider backed by process defaults and cached site settings
pub struct ConfiguredChannelProvider {
    defaults: ChannelDefaults,
    site_settings: Arc<SiteSettingsCache>,
    http_client: reqwest::Client,
}

impl ConfiguredChannelProvider {
    pub fn new(defaults: ChannelDefaults, site_settings: Arc<SiteSettingsCache>) -> Self {
        Self {
            defaults,
            site_settings,
            http_client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ChannelProvider for ConfiguredChannelProvider {
    async fn channels(&self, email_subject: &str) -> Channels {
        let site = match self.site_settings.current().await {
            Ok(site) => site,
            Err(e) => {
                tracing::warn!("Failed to load site settings, using defaults: {}", e);
                None
            }
        };

        let whatsapp = resolve_whatsapp_config(&self.defaults.whatsapp, site.as_ref());
        let email = resolve_email_config(&self.defaults.email, site.as_ref());

        Channels {
            whatsapp: Arc::new(WhatsAppChannel::new(self.http_client.clone(), whatsapp)),
            email: Arc::new(EmailChannel::new(email, email_subject)),
        }
    }
}
