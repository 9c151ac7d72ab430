//! Notification preference and history models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timezone applied when a setting does not name one
pub const DEFAULT_TIMEZONE: &str = "Asia/Jakarta";

/// Cron expression suggested to users switching to a custom schedule
pub const DEFAULT_CRON_EXPRESSION: &str = "0 9 * * *";

/// Informational threshold shown in the settings screen
pub const DEFAULT_THRESHOLD: i32 = 10;

/// Preset cadence for low stock checks
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CheckFrequency {
    Hourly,
    #[default]
    Daily,
    Weekly,
}

impl CheckFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckFrequency::Hourly => "hourly",
            CheckFrequency::Daily => "daily",
            CheckFrequency::Weekly => "weekly",
        }
    }

    /// Parse a stored value. Anything that is not daily or weekly runs hourly.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "daily" => CheckFrequency::Daily,
            "weekly" => CheckFrequency::Weekly,
            _ => CheckFrequency::Hourly,
        }
    }
}

/// How the schedule of a notification setting is defined
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleMode {
    #[default]
    Preset,
    Cron,
}

impl ScheduleMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleMode::Preset => "preset",
            ScheduleMode::Cron => "cron",
        }
    }

    /// Parse a stored value, treating anything other than `cron` as preset
    pub fn parse_lenient(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("cron") {
            ScheduleMode::Cron
        } else {
            ScheduleMode::Preset
        }
    }
}

/// Per-user low stock notification preferences
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationSetting {
    pub id: i64,
    pub user_id: i64,
    pub enabled: bool,
    pub threshold: i32,
    pub check_frequency: CheckFrequency,
    pub schedule_mode: ScheduleMode,
    pub cron_expression: String,
    pub timezone: String,
    pub whatsapp_enabled: bool,
    /// Pipe separated list of phone numbers
    pub whatsapp_number: String,
    pub email_enabled: bool,
    pub email_address: String,
    pub last_run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NotificationSetting {
    /// Default preferences for a user who never saved any
    pub fn defaults_for(user_id: i64, now: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            user_id,
            enabled: false,
            threshold: DEFAULT_THRESHOLD,
            check_frequency: CheckFrequency::Daily,
            schedule_mode: ScheduleMode::Preset,
            cron_expression: DEFAULT_CRON_EXPRESSION.to_string(),
            timezone: DEFAULT_TIMEZONE.to_string(),
            whatsapp_enabled: false,
            whatsapp_number: String::new(),
            email_enabled: false,
            email_address: String::new(),
            last_run_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Cron expression to evaluate, if the setting runs on a custom schedule
    pub fn active_cron_expression(&self) -> Option<&str> {
        let expression = self.cron_expression.trim();
        (self.schedule_mode == ScheduleMode::Cron && !expression.is_empty()).then_some(expression)
    }
}

/// Kind of notification recorded in history
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HistoryType {
    LowStock,
    Test,
}

impl HistoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryType::LowStock => "low_stock",
            HistoryType::Test => "test",
        }
    }
}

/// A delivered notification, kept for auditing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationHistory {
    pub id: i64,
    pub user_id: i64,
    pub notification_type: String,
    pub title: String,
    pub message: String,
    pub whatsapp_sent: bool,
    pub email_sent: bool,
    pub created_at: DateTime<Utc>,
}

/// History row to append
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotificationHistory {
    pub user_id: i64,
    pub notification_type: HistoryType,
    pub title: String,
    pub message: String,
    pub whatsapp_sent: bool,
    pub email_sent: bool,
}
