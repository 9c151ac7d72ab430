//! Notification settings service
//!
//! Supports:
//! - Reading and saving each user's low stock notification preferences
//! - Sending a test message through the selected channels
//! - Notification history listing
//! - Manual "check now" low stock notifications

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{
    normalize_whatsapp_recipients, validate_email, CheckFrequency, HistoryLimit, HistoryType,
    LowStockEntry, NewNotificationHistory, NotificationHistory, NotificationSetting, ScheduleMode,
    UserContact, DEFAULT_CRON_EXPRESSION, DEFAULT_TIMEZONE,
};
use sqlx::{FromRow, PgPool};

use crate::error::{AppError, AppResult};
use crate::services::channels::ChannelProvider;
use crate::services::dispatch::{deliver, DeliveryTargets, DispatchOutcome};
use crate::services::low_stock::{build_low_stock_message, compute_low_stock_entries, low_stock_subject};
use crate::services::schedule::{parse_cron, parse_timezone};
use crate::services::store::{
    HistoryStore, InventorySnapshotSource, NotificationSettingRow, PgNotificationStore,
    NOTIFICATION_SETTING_COLUMNS,
};

pub const TEST_MESSAGE: &str = "This is a test notification from TatApps inventory system. If you receive this, your notification settings are working correctly.";
pub const TEST_SUBJECT: &str = "Test Notification - TatApps";
pub const TEST_TITLE: &str = "Test Notification";

/// Notification settings as returned to the client
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NotificationSettingsView {
    pub enabled: bool,
    pub threshold: i32,
    pub check_frequency: CheckFrequency,
    pub schedule_mode: ScheduleMode,
    pub cron_expression: String,
    pub timezone: String,
    pub whatsapp_enabled: bool,
    pub whatsapp_number: String,
    pub email_enabled: bool,
    pub email_address: String,
    pub last_run_at: Option<DateTime<Utc>>,
}

impl From<&NotificationSetting> for NotificationSettingsView {
    fn from(setting: &NotificationSetting) -> Self {
        let or_default = |value: &str, default: &str| match value.trim() {
            "" => default.to_string(),
            value => value.to_string(),
        };

        Self {
            enabled: setting.enabled,
            threshold: setting.threshold,
            check_frequency: setting.check_frequency,
            schedule_mode: setting.schedule_mode,
            cron_expression: or_default(&setting.cron_expression, DEFAULT_CRON_EXPRESSION),
            timezone: or_default(&setting.timezone, DEFAULT_TIMEZONE),
            whatsapp_enabled: setting.whatsapp_enabled,
            whatsapp_number: normalize_whatsapp_recipients(&setting.whatsapp_number),
            email_enabled: setting.email_enabled,
            email_address: setting.email_address.clone(),
            last_run_at: setting.last_run_at,
        }
    }
}

/// Input for saving notification settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdateNotificationSettingsInput {
    pub enabled: bool,
    pub threshold: i32,
    pub check_frequency: String,
    pub schedule_mode: String,
    pub cron_expression: String,
    #[serde(alias = "time_zone")]
    pub timezone: String,
    pub whatsapp_enabled: bool,
    pub whatsapp_number: String,
    pub email_enabled: bool,
    pub email_address: String,
}

/// Channels to try in a test notification
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TestNotificationInput {
    pub whatsapp_enabled: bool,
    pub whatsapp_number: String,
    pub email_enabled: bool,
    pub email_address: String,
}

/// Channels for a manual low stock check. Both default to on.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckLowStockInput {
    #[serde(default = "default_true")]
    pub send_whatsapp: bool,
    #[serde(default = "default_true")]
    pub send_email: bool,
}

fn default_true() -> bool {
    true
}

impl Default for CheckLowStockInput {
    fn default() -> Self {
        Self {
            send_whatsapp: true,
            send_email: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TestNotificationResult {
    pub message: String,
    pub whatsapp_sent: bool,
    pub email_sent: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl TestNotificationResult {
    pub fn is_partial(&self) -> bool {
        !self.errors.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LowStockCheckResult {
    pub message: String,
    pub low_stock_count: usize,
    pub whatsapp_sent: bool,
    pub email_sent: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<LowStockEntry>,
}

impl LowStockCheckResult {
    pub fn is_partial(&self) -> bool {
        !self.errors.is_empty()
    }
}

#[derive(Debug, FromRow)]
struct NotificationHistoryRow {
    id: i64,
    user_id: i64,
    notification_type: String,
    title: String,
    message: String,
    whatsapp_sent: bool,
    email_sent: bool,
    created_at: DateTime<Utc>,
}

impl From<NotificationHistoryRow> for NotificationHistory {
    fn from(row: NotificationHistoryRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            notification_type: row.notification_type,
            title: row.title,
            message: row.message,
            whatsapp_sent: row.whatsapp_sent,
            email_sent: row.email_sent,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct UserContactRow {
    id: i64,
    name: String,
    email: Option<String>,
    phone: Option<String>,
}

// ============================================================================
// Settings Update Rules
// ============================================================================

fn parse_frequency(value: &str) -> AppResult<CheckFrequency> {
    match value.to_lowercase().as_str() {
        "" | "daily" => Ok(CheckFrequency::Daily),
        "hourly" => Ok(CheckFrequency::Hourly),
        "weekly" => Ok(CheckFrequency::Weekly),
        _ => Err(AppError::invalid_field(
            "check_frequency",
            "Check frequency must be hourly, daily or weekly",
            "Frekuensi pengecekan harus hourly, daily atau weekly",
        )),
    }
}

/// Normalize and validate an update, then merge it over the stored setting.
///
/// `last_run_at` is cleared when the enabled flag or any schedule field
/// changes so the new schedule starts from a clean slate.
pub fn merge_settings_update(
    existing: Option<&NotificationSetting>,
    user_id: i64,
    input: UpdateNotificationSettingsInput,
    now: DateTime<Utc>,
) -> AppResult<NotificationSetting> {
    let schedule_mode = ScheduleMode::parse_lenient(&input.schedule_mode);
    let cron_expression = input.cron_expression.trim().to_string();
    let timezone = match input.timezone.trim() {
        "" => DEFAULT_TIMEZONE.to_string(),
        timezone => timezone.to_string(),
    };
    let check_frequency = parse_frequency(input.check_frequency.trim())?;

    if schedule_mode == ScheduleMode::Cron {
        if cron_expression.is_empty() {
            return Err(AppError::invalid_field(
                "cron_expression",
                "Cron expression is required for custom schedule",
                "Ekspresi cron wajib diisi untuk jadwal kustom",
            ));
        }
        parse_cron(&cron_expression).map_err(|e| {
            AppError::invalid_field(
                "cron_expression",
                &e.to_string(),
                "Ekspresi cron tidak valid",
            )
        })?;
    }

    parse_timezone(&timezone).map_err(|e| {
        AppError::invalid_field("timezone", &e.to_string(), "Zona waktu tidak dikenal")
    })?;

    if input.threshold < 0 {
        return Err(AppError::invalid_field(
            "threshold",
            "Threshold cannot be negative",
            "Ambang batas tidak boleh negatif",
        ));
    }

    let email_address = input.email_address.trim().to_string();
    if !email_address.is_empty() {
        validate_email(&email_address).map_err(|e| {
            AppError::invalid_field("email_address", e, "Format email tidak valid")
        })?;
    }

    let mut setting = match existing {
        Some(existing) => existing.clone(),
        None => NotificationSetting::defaults_for(user_id, now),
    };

    let reset_schedule = existing.is_some_and(|existing| {
        existing.enabled != input.enabled
            || existing.schedule_mode != schedule_mode
            || existing.cron_expression.trim() != cron_expression
            || existing.check_frequency != check_frequency
            || existing.timezone.trim() != timezone
    });

    setting.enabled = input.enabled;
    setting.threshold = input.threshold;
    setting.check_frequency = check_frequency;
    setting.schedule_mode = schedule_mode;
    setting.cron_expression = cron_expression;
    setting.timezone = timezone;
    setting.whatsapp_enabled = input.whatsapp_enabled;
    setting.whatsapp_number = normalize_whatsapp_recipients(&input.whatsapp_number);
    setting.email_enabled = input.email_enabled;
    setting.email_address = email_address;
    setting.updated_at = now;

    if existing.is_none() || reset_schedule {
        setting.last_run_at = None;
    }

    Ok(setting)
}

/// Read-merge-write rounds before a save gives up
const SAVE_ATTEMPTS: usize = 2;

/// Update of an existing row; returns nothing if the row vanished
fn update_setting_query() -> String {
    format!(
        r#"
        UPDATE notification_settings SET
            enabled = $2, threshold = $3, check_frequency = $4, schedule_mode = $5,
            cron_expression = $6, timezone = $7, whatsapp_enabled = $8,
            whatsapp_number = $9, email_enabled = $10, email_address = $11,
            last_run_at = $12, updated_at = $13
        WHERE user_id = $1
        RETURNING {}
        "#,
        NOTIFICATION_SETTING_COLUMNS
    )
}

/// First insert; returns nothing if another save created the row first
fn insert_setting_query() -> String {
    format!(
        r#"
        INSERT INTO notification_settings (
            user_id, enabled, threshold, check_frequency, schedule_mode,
            cron_expression, timezone, whatsapp_enabled, whatsapp_number,
            email_enabled, email_address, last_run_at, updated_at, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $13)
        ON CONFLICT (user_id) DO NOTHING
        RETURNING {}
        "#,
        NOTIFICATION_SETTING_COLUMNS
    )
}

// ============================================================================
// Service
// ============================================================================

/// Notification settings service
#[derive(Clone)]
pub struct NotificationSettingsService {
    db: PgPool,
    store: PgNotificationStore,
    channels: Arc<dyn ChannelProvider>,
}

impl NotificationSettingsService {
    pub fn new(db: PgPool, channels: Arc<dyn ChannelProvider>) -> Self {
        Self {
            store: PgNotificationStore::new(db.clone()),
            db,
            channels,
        }
    }

    async fn find_setting(&self, user_id: i64) -> AppResult<Option<NotificationSetting>> {
        let row = sqlx::query_as::<_, NotificationSettingRow>(&format!(
            "SELECT {} FROM notification_settings WHERE user_id = $1",
            NOTIFICATION_SETTING_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(NotificationSetting::from))
    }

    /// Stored settings, or the defaults for a user who never saved any
    pub async fn get_settings(&self, user_id: i64) -> AppResult<NotificationSettingsView> {
        let setting = self
            .find_setting(user_id)
            .await?
            .unwrap_or_else(|| NotificationSetting::defaults_for(user_id, Utc::now()));

        Ok(NotificationSettingsView::from(&setting))
    }

    /// Save settings, creating the row on first write.
    ///
    /// Two first saves for the same user can race; the loser's insert hits
    /// the `user_id` conflict, so it re-reads the winner's row and applies
    /// its update on top.
    pub async fn update_settings(
        &self,
        user_id: i64,
        input: UpdateNotificationSettingsInput,
    ) -> AppResult<NotificationSettingsView> {
        let mut saved_row = None;

        for _ in 0..SAVE_ATTEMPTS {
            let existing = self.find_setting(user_id).await?;
            let setting = merge_settings_update(existing.as_ref(), user_id, input.clone(), Utc::now())?;

            let query = if existing.is_some() {
                update_setting_query()
            } else {
                insert_setting_query()
            };

            saved_row = sqlx::query_as::<_, NotificationSettingRow>(&query)
                .bind(user_id)
                .bind(setting.enabled)
                .bind(setting.threshold)
                .bind(setting.check_frequency.as_str())
                .bind(setting.schedule_mode.as_str())
                .bind(&setting.cron_expression)
                .bind(&setting.timezone)
                .bind(setting.whatsapp_enabled)
                .bind(&setting.whatsapp_number)
                .bind(setting.email_enabled)
                .bind(&setting.email_address)
                .bind(setting.last_run_at)
                .bind(setting.updated_at)
                .fetch_optional(&self.db)
                .await?;

            if saved_row.is_some() {
                break;
            }
            tracing::debug!(user_id, "Notification settings changed during save, retrying");
        }

        let row = saved_row.ok_or(AppError::DatabaseError(sqlx::Error::RowNotFound))?;
        let saved = NotificationSetting::from(row);
        tracing::info!(
            user_id,
            enabled = saved.enabled,
            schedule_mode = saved.schedule_mode.as_str(),
            "Notification settings saved"
        );

        Ok(NotificationSettingsView::from(&saved))
    }

    /// Send a fixed test message through the requested channels
    pub async fn send_test_notification(
        &self,
        user_id: i64,
        input: TestNotificationInput,
    ) -> AppResult<TestNotificationResult> {
        if !input.whatsapp_enabled && !input.email_enabled {
            return Err(AppError::invalid_field(
                "channels",
                "Please select at least one notification channel",
                "Pilih minimal satu kanal notifikasi",
            ));
        }

        let channels = self.channels.channels(TEST_SUBJECT).await;
        let targets = DeliveryTargets {
            whatsapp: input.whatsapp_enabled.then_some(input.whatsapp_number.as_str()),
            email: input.email_enabled.then_some(input.email_address.as_str()),
        };
        let outcome = deliver(&channels, targets, TEST_MESSAGE).await;

        self.record_history(user_id, HistoryType::Test, TEST_TITLE, TEST_MESSAGE, &outcome)
            .await;

        let message = if outcome.errors.is_empty() {
            "Test notification sent successfully"
        } else {
            "Some notifications failed to send"
        };

        Ok(TestNotificationResult {
            message: message.to_string(),
            whatsapp_sent: outcome.whatsapp_sent,
            email_sent: outcome.email_sent,
            errors: outcome.errors,
        })
    }

    /// Most recent history rows for a user, newest first
    pub async fn get_history(
        &self,
        user_id: i64,
        limit: HistoryLimit,
    ) -> AppResult<Vec<NotificationHistory>> {
        let rows = sqlx::query_as::<_, NotificationHistoryRow>(
            r#"
            SELECT id, user_id, notification_type, title, message,
                   whatsapp_sent, email_sent, created_at
            FROM notification_history
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(i64::from(limit.get()))
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(NotificationHistory::from).collect())
    }

    async fn get_contact(&self, user_id: i64) -> AppResult<UserContact> {
        let row = sqlx::query_as::<_, UserContactRow>(
            "SELECT id, name, email, phone FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User".to_string()))?;

        Ok(UserContact {
            id: row.id,
            name: row.name,
            email: row.email,
            phone: row.phone,
        })
    }

    /// Check stock now and notify the caller's own phone and email
    pub async fn check_low_stock(
        &self,
        user_id: i64,
        input: CheckLowStockInput,
    ) -> AppResult<LowStockCheckResult> {
        if !input.send_whatsapp && !input.send_email {
            return Err(AppError::invalid_field(
                "channels",
                "Please select at least one notification channel",
                "Pilih minimal satu kanal notifikasi",
            ));
        }

        let contact = self.get_contact(user_id).await?;
        let phone = contact.phone.as_deref().map(str::trim).unwrap_or_default();
        let email = contact.email.as_deref().map(str::trim).unwrap_or_default();

        if input.send_whatsapp && phone.is_empty() {
            return Err(AppError::invalid_field(
                "send_whatsapp",
                "WhatsApp selected but phone number not set in profile",
                "WhatsApp dipilih tetapi nomor telepon belum diisi di profil",
            ));
        }
        if input.send_email && email.is_empty() {
            return Err(AppError::invalid_field(
                "send_email",
                "Email selected but email address not set in profile",
                "Email dipilih tetapi alamat email belum diisi di profil",
            ));
        }

        let items = self.store.load_active_items().await?;
        let entries = compute_low_stock_entries(&items);

        if entries.is_empty() {
            return Ok(LowStockCheckResult {
                message: "No low stock items found".to_string(),
                low_stock_count: 0,
                whatsapp_sent: false,
                email_sent: false,
                errors: Vec::new(),
                items: Vec::new(),
            });
        }

        let message = build_low_stock_message(&entries);
        let subject = low_stock_subject(entries.len());
        let channels = self.channels.channels(&subject).await;
        let targets = DeliveryTargets {
            whatsapp: input.send_whatsapp.then_some(phone),
            email: input.send_email.then_some(email),
        };
        let outcome = deliver(&channels, targets, &message).await;

        self.record_history(user_id, HistoryType::LowStock, &subject, &message, &outcome)
            .await;

        let summary = if outcome.errors.is_empty() {
            "Low stock notifications sent successfully"
        } else {
            "Some notifications failed to send"
        };

        Ok(LowStockCheckResult {
            message: summary.to_string(),
            low_stock_count: entries.len(),
            whatsapp_sent: outcome.whatsapp_sent,
            email_sent: outcome.email_sent,
            errors: outcome.errors,
            items: entries,
        })
    }

    async fn record_history(
        &self,
        user_id: i64,
        notification_type: HistoryType,
        title: &str,
        message: &str,
        outcome: &DispatchOutcome,
    ) {
        let entry = NewNotificationHistory {
            user_id,
            notification_type,
            title: title.to_string(),
            message: message.to_string(),
            whatsapp_sent: outcome.whatsapp_sent,
            email_sent: outcome.email_sent,
        };

        if let Err(e) = self.store.append(entry).await {
            tracing::error!(user_id, "Failed to record notification history: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_fills_blank_schedule_fields() {
        let mut setting = NotificationSetting::defaults_for(3, Utc::now());
        setting.cron_expression = " ".to_string();
        setting.timezone = String::new();
        setting.whatsapp_number = "0811, 0812;0811".to_string();

        let view = NotificationSettingsView::from(&setting);
        assert_eq!(view.cron_expression, DEFAULT_CRON_EXPRESSION);
        assert_eq!(view.timezone, DEFAULT_TIMEZONE);
        assert_eq!(view.whatsapp_number, "0811|0812");
        assert!(!view.enabled);
        assert_eq!(view.threshold, 10);
    }

    #[test]
    fn test_check_low_stock_input_defaults_to_both_channels() {
        let input: CheckLowStockInput = serde_json::from_str("{}").unwrap();
        assert!(input.send_whatsapp);
        assert!(input.send_email);

        let input: CheckLowStockInput = serde_json::from_str(r#"{"send_email": false}"#).unwrap();
        assert!(input.send_whatsapp);
        assert!(!input.send_email);
    }

    #[test]
    fn test_update_input_accepts_time_zone_alias() {
        let input: UpdateNotificationSettingsInput =
            serde_json::from_str(r#"{"time_zone": "Asia/Makassar"}"#).unwrap();
        assert_eq!(input.timezone, "Asia/Makassar");
    }

    #[test]
    fn test_first_insert_yields_on_user_conflict() {
        let insert = insert_setting_query();
        assert!(insert.contains("ON CONFLICT (user_id) DO NOTHING"));
        assert!(insert.contains("RETURNING"));
        assert!(!insert.contains("DO UPDATE"));
    }

    #[test]
    fn test_save_queries_share_bind_order() {
        for query in [insert_setting_query(), update_setting_query()] {
            assert!(query.contains("$13"));
            assert!(!query.contains("$14"));
        }
        assert!(update_setting_query().contains("WHERE user_id = $1"));
    }
}
