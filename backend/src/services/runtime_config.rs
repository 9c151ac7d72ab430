//! Runtime channel configuration
//!
//! Channel settings are the process defaults from `Config` overlaid with the
//! site settings row. A non-blank site field (or non-zero SMTP port) wins;
//! blank fields fall back to the default.

use std::sync::Arc;
use std::time::{Duration, Instant};

use shared::SiteSetting;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::services::store::{SiteSettingsSource, StoreError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhatsAppRuntimeConfig {
    pub url: String,
    pub api_key: String,
    pub sender: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailRuntimeConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_email: String,
    pub from_name: String,
}

/// Process-level channel defaults
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelDefaults {
    pub whatsapp: WhatsAppRuntimeConfig,
    pub email: EmailRuntimeConfig,
}

impl ChannelDefaults {
    pub fn from_config(config: &Config) -> Self {
        Self {
            whatsapp: WhatsAppRuntimeConfig {
                url: config.whatsapp.api_url.trim().to_string(),
                api_key: config.whatsapp.api_key.trim().to_string(),
                sender: config.whatsapp.sender.trim().to_string(),
            },
            email: EmailRuntimeConfig {
                host: config.smtp.host.trim().to_string(),
                port: config.smtp.port,
                username: config.smtp.username.trim().to_string(),
                password: config.smtp.password.clone(),
                from_email: config.smtp.from_email.trim().to_string(),
                from_name: config.smtp.from_name.trim().to_string(),
            },
        }
    }
}

fn overlay(default: &str, site_value: &str) -> String {
    match site_value.trim() {
        "" => default.to_string(),
        value => value.to_string(),
    }
}

pub fn resolve_whatsapp_config(
    defaults: &WhatsAppRuntimeConfig,
    overrides: Option<&SiteSetting>,
) -> WhatsAppRuntimeConfig {
    let Some(site) = overrides else {
        return defaults.clone();
    };

    WhatsAppRuntimeConfig {
        url: overlay(&defaults.url, &site.whatsapp_api_url),
        api_key: overlay(&defaults.api_key, &site.whatsapp_api_key),
        sender: overlay(&defaults.sender, &site.whatsapp_sender),
    }
}

pub fn resolve_email_config(
    defaults: &EmailRuntimeConfig,
    overrides: Option<&SiteSetting>,
) -> EmailRuntimeConfig {
    let Some(site) = overrides else {
        return defaults.clone();
    };

    let port = u16::try_from(site.smtp_port)
        .ok()
        .filter(|port| *port != 0)
        .unwrap_or(defaults.port);

    EmailRuntimeConfig {
        host: overlay(&defaults.host, &site.smtp_host),
        port,
        username: overlay(&defaults.username, &site.smtp_username),
        // Passwords may legitimately carry surrounding whitespace
        password: if site.smtp_password.is_empty() {
            defaults.password.clone()
        } else {
            site.smtp_password.clone()
        },
        from_email: overlay(&defaults.from_email, &site.smtp_from_email),
        from_name: overlay(&defaults.from_name, &site.smtp_from_name),
    }
}

// ============================================================================
// Site Settings Cache
// ============================================================================

struct CachedSite {
    loaded_at: Instant,
    setting: Option<SiteSetting>,
}

/// Site settings row cached for a bounded time.
///
/// The site settings write path calls `invalidate` so changes apply to the
/// next send.
pub struct SiteSettingsCache {
    source: Arc<dyn SiteSettingsSource>,
    ttl: Duration,
    cached: RwLock<Option<CachedSite>>,
}

impl SiteSettingsCache {
    pub fn new(source: Arc<dyn SiteSettingsSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            cached: RwLock::new(None),
        }
    }

    /// Current site settings, reloading once the cached copy expires
    pub async fn current(&self) -> Result<Option<SiteSetting>, StoreError> {
        if let Some(cached) = self.cached.read().await.as_ref() {
            if cached.loaded_at.elapsed() < self.ttl {
                return Ok(cached.setting.clone());
            }
        }

        let setting = self.source.load_site_setting().await?;
        *self.cached.write().await = Some(CachedSite {
            loaded_at: Instant::now(),
            setting: setting.clone(),
        });

        Ok(setting)
    }

    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
    }
}
