//! Site-wide delivery channel settings
//!
//! Administrators override the WhatsApp gateway and SMTP defaults here. Secrets
//! are never returned; a blank secret in an update keeps the stored one.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use shared::{validate_email, SiteSetting};
use sqlx::PgPool;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::services::runtime_config::SiteSettingsCache;
use crate::services::store::{SiteSettingRow, SITE_SETTING_COLUMNS};

const DEFAULT_APP_NAME: &str = "TatApps";

/// Channel settings as returned to administrators
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ChannelSettingsView {
    pub whatsapp_api_url: String,
    pub whatsapp_api_key_set: bool,
    pub whatsapp_sender: String,
    pub smtp_host: String,
    pub smtp_port: i32,
    pub smtp_username: String,
    pub smtp_password_set: bool,
    pub smtp_from_email: String,
    pub smtp_from_name: String,
}

impl From<&SiteSetting> for ChannelSettingsView {
    fn from(site: &SiteSetting) -> Self {
        Self {
            whatsapp_api_url: site.whatsapp_api_url.clone(),
            whatsapp_api_key_set: !site.whatsapp_api_key.is_empty(),
            whatsapp_sender: site.whatsapp_sender.clone(),
            smtp_host: site.smtp_host.clone(),
            smtp_port: site.smtp_port,
            smtp_username: site.smtp_username.clone(),
            smtp_password_set: !site.smtp_password.is_empty(),
            smtp_from_email: site.smtp_from_email.clone(),
            smtp_from_name: site.smtp_from_name.clone(),
        }
    }
}

/// Partial update; absent fields keep their stored value
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateChannelSettingsInput {
    pub whatsapp_api_url: Option<String>,
    pub whatsapp_api_key: Option<String>,
    pub whatsapp_sender: Option<String>,
    pub smtp_host: Option<String>,
    pub smtp_port: Option<i32>,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_from_email: Option<String>,
    pub smtp_from_name: Option<String>,
}

/// Apply an update to the stored row
pub fn apply_channel_update(
    mut site: SiteSetting,
    input: UpdateChannelSettingsInput,
) -> AppResult<SiteSetting> {
    fn set(target: &mut String, value: Option<String>) {
        if let Some(value) = value {
            *target = value.trim().to_string();
        }
    }

    fn set_secret(target: &mut String, value: Option<String>) {
        if let Some(value) = value.filter(|value| !value.is_empty()) {
            *target = value;
        }
    }

    if let Some(port) = input.smtp_port {
        if !(0..=i32::from(u16::MAX)).contains(&port) {
            return Err(AppError::invalid_field(
                "smtp_port",
                "SMTP port must be between 0 and 65535",
                "Port SMTP harus antara 0 dan 65535",
            ));
        }
        site.smtp_port = port;
    }

    if let Some(from_email) = input.smtp_from_email.as_deref().map(str::trim) {
        if !from_email.is_empty() {
            validate_email(from_email).map_err(|e| {
                AppError::invalid_field("smtp_from_email", e, "Format email tidak valid")
            })?;
        }
    }

    set(&mut site.whatsapp_api_url, input.whatsapp_api_url);
    set_secret(&mut site.whatsapp_api_key, input.whatsapp_api_key);
    set(&mut site.whatsapp_sender, input.whatsapp_sender);
    set(&mut site.smtp_host, input.smtp_host);
    set(&mut site.smtp_username, input.smtp_username);
    set_secret(&mut site.smtp_password, input.smtp_password);
    set(&mut site.smtp_from_email, input.smtp_from_email);
    set(&mut site.smtp_from_name, input.smtp_from_name);

    Ok(site)
}

/// Site settings service
#[derive(Clone)]
pub struct SiteSettingsService {
    db: PgPool,
    cache: Arc<SiteSettingsCache>,
}

impl SiteSettingsService {
    pub fn new(db: PgPool, cache: Arc<SiteSettingsCache>) -> Self {
        Self { db, cache }
    }

    async fn get_or_create(&self) -> AppResult<SiteSetting> {
        let existing = sqlx::query_as::<_, SiteSettingRow>(&format!(
            "SELECT {} FROM site_settings ORDER BY id LIMIT 1",
            SITE_SETTING_COLUMNS
        ))
        .fetch_optional(&self.db)
        .await?;

        if let Some(row) = existing {
            return Ok(row.into());
        }

        let row = sqlx::query_as::<_, SiteSettingRow>(&format!(
            "INSERT INTO site_settings (app_name) VALUES ($1) RETURNING {}",
            SITE_SETTING_COLUMNS
        ))
        .bind(DEFAULT_APP_NAME)
        .fetch_one(&self.db)
        .await?;

        Ok(row.into())
    }

    pub async fn get_channel_settings(&self, user: &AuthUser) -> AppResult<ChannelSettingsView> {
        user.require_permission("settings", "update")?;
        let site = self.get_or_create().await?;
        Ok(ChannelSettingsView::from(&site))
    }

    pub async fn update_channel_settings(
        &self,
        user: &AuthUser,
        input: UpdateChannelSettingsInput,
    ) -> AppResult<ChannelSettingsView> {
        user.require_permission("settings", "update")?;

        let current = self.get_or_create().await?;
        let site = apply_channel_update(current, input)?;

        let row = sqlx::query_as::<_, SiteSettingRow>(&format!(
            r#"
            UPDATE site_settings SET
                whatsapp_api_url = $2, whatsapp_api_key = $3, whatsapp_sender = $4,
                smtp_host = $5, smtp_port = $6, smtp_username = $7, smtp_password = $8,
                smtp_from_email = $9, smtp_from_name = $10, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            SITE_SETTING_COLUMNS
        ))
        .bind(site.id)
        .bind(&site.whatsapp_api_url)
        .bind(&site.whatsapp_api_key)
        .bind(&site.whatsapp_sender)
        .bind(&site.smtp_host)
        .bind(site.smtp_port)
        .bind(&site.smtp_username)
        .bind(&site.smtp_password)
        .bind(&site.smtp_from_email)
        .bind(&site.smtp_from_name)
        .fetch_one(&self.db)
        .await?;

        self.cache.invalidate().await;
        tracing::info!(user_id = user.user_id, "Site channel settings updated");

        Ok(ChannelSettingsView::from(&SiteSetting::from(row)))
    }
}
