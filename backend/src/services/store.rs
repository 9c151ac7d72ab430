//! Persistence seams used by the low stock scheduler
//!
//! The scheduler only talks to these traits so it can run against
//! in-memory fakes in tests. `PgNotificationStore` is the PostgreSQL
//! implementation used by the server.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared::{
    CheckFrequency, InventoryItem, NewNotificationHistory, NotificationSetting, ScheduleMode,
    SiteSetting,
};
use sqlx::{FromRow, PgPool};
use thiserror::Error;

/// Storage failure surfaced to the scheduler and services
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Current inventory snapshot
#[async_trait]
pub trait InventorySnapshotSource: Send + Sync {
    async fn load_active_items(&self) -> Result<Vec<InventoryItem>, StoreError>;
}

/// Notification preferences read and bookkept by the scheduler
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn load_enabled(&self) -> Result<Vec<NotificationSetting>, StoreError>;

    async fn update_last_run(&self, setting_id: i64, ran_at: DateTime<Utc>) -> Result<(), StoreError>;
}

/// Append-only notification history
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, entry: NewNotificationHistory) -> Result<(), StoreError>;
}

/// Site-wide channel overrides
#[async_trait]
pub trait SiteSettingsSource: Send + Sync {
    async fn load_site_setting(&self) -> Result<Option<SiteSetting>, StoreError>;
}

// ============================================================================
// Row Types
// ============================================================================

#[derive(Debug, FromRow)]
pub(crate) struct NotificationSettingRow {
    pub id: i64,
    pub user_id: i64,
    pub enabled: bool,
    pub threshold: i32,
    pub check_frequency: String,
    pub schedule_mode: String,
    pub cron_expression: String,
    pub timezone: String,
    pub whatsapp_enabled: bool,
    pub whatsapp_number: String,
    pub email_enabled: bool,
    pub email_address: String,
    pub last_run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<NotificationSettingRow> for NotificationSetting {
    fn from(row: NotificationSettingRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            enabled: row.enabled,
            threshold: row.threshold,
            check_frequency: CheckFrequency::parse_lenient(&row.check_frequency),
            schedule_mode: ScheduleMode::parse_lenient(&row.schedule_mode),
            cron_expression: row.cron_expression,
            timezone: row.timezone,
            whatsapp_enabled: row.whatsapp_enabled,
            whatsapp_number: row.whatsapp_number,
            email_enabled: row.email_enabled,
            email_address: row.email_address,
            last_run_at: row.last_run_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

pub(crate) const NOTIFICATION_SETTING_COLUMNS: &str = r#"
    id, user_id, enabled, threshold, check_frequency, schedule_mode,
    cron_expression, timezone, whatsapp_enabled, whatsapp_number,
    email_enabled, email_address, last_run_at, created_at, updated_at
"#;

#[derive(Debug, FromRow)]
struct InventoryItemRow {
    id: i64,
    name: String,
    sn: Option<String>,
    category: Option<String>,
    unit: Option<String>,
    quantity: Decimal,
    min_stock: Decimal,
    is_active: bool,
    warehouse_id: Option<i64>,
    warehouse_name: Option<String>,
    updated_at: DateTime<Utc>,
}

impl From<InventoryItemRow> for InventoryItem {
    fn from(row: InventoryItemRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            sn: row.sn,
            category: row.category,
            unit: row.unit,
            quantity: row.quantity,
            min_stock: row.min_stock,
            is_active: row.is_active,
            warehouse_id: row.warehouse_id.unwrap_or(0),
            warehouse_name: row.warehouse_name,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct SiteSettingRow {
    pub id: i64,
    pub app_name: String,
    pub whatsapp_api_url: String,
    pub whatsapp_api_key: String,
    pub whatsapp_sender: String,
    pub smtp_host: String,
    pub smtp_port: i32,
    pub smtp_username: String,
    pub smtp_password: String,
    pub smtp_from_email: String,
    pub smtp_from_name: String,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<SiteSettingRow> for SiteSetting {
    fn from(row: SiteSettingRow) -> Self {
        Self {
            id: row.id,
            app_name: row.app_name,
            whatsapp_api_url: row.whatsapp_api_url,
            whatsapp_api_key: row.whatsapp_api_key,
            whatsapp_sender: row.whatsapp_sender,
            smtp_host: row.smtp_host,
            smtp_port: row.smtp_port,
            smtp_username: row.smtp_username,
            smtp_password: row.smtp_password,
            smtp_from_email: row.smtp_from_email,
            smtp_from_name: row.smtp_from_name,
            updated_at: row.updated_at,
        }
    }
}

pub(crate) const SITE_SETTING_COLUMNS: &str = r#"
    id, app_name, whatsapp_api_url, whatsapp_api_key, whatsapp_sender,
    smtp_host, smtp_port, smtp_username, smtp_password,
    smtp_from_email, smtp_from_name, updated_at
"#;

// ============================================================================
// PostgreSQL Store
// ============================================================================

/// PostgreSQL backed implementation of every scheduler store
#[derive(Clone)]
pub struct PgNotificationStore {
    db: PgPool,
}

impl PgNotificationStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl InventorySnapshotSource for PgNotificationStore {
    async fn load_active_items(&self) -> Result<Vec<InventoryItem>, StoreError> {
        let rows = sqlx::query_as::<_, InventoryItemRow>(
            r#"
            SELECT i.id, i.name, i.sn, i.category, i.unit, i.quantity, i.min_stock,
                   i.is_active, i.warehouse_id, w.name AS warehouse_name, i.updated_at
            FROM inventory_items i
            LEFT JOIN warehouses w ON w.id = i.warehouse_id
            WHERE i.is_active = TRUE
            ORDER BY i.id
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(InventoryItem::from).collect())
    }
}

#[async_trait]
impl PreferenceStore for PgNotificationStore {
    async fn load_enabled(&self) -> Result<Vec<NotificationSetting>, StoreError> {
        let rows = sqlx::query_as::<_, NotificationSettingRow>(&format!(
            "SELECT {} FROM notification_settings WHERE enabled = TRUE ORDER BY id",
            NOTIFICATION_SETTING_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(NotificationSetting::from).collect())
    }

    async fn update_last_run(&self, setting_id: i64, ran_at: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query("UPDATE notification_settings SET last_run_at = $2 WHERE id = $1")
            .bind(setting_id)
            .bind(ran_at)
            .execute(&self.db)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl HistoryStore for PgNotificationStore {
    async fn append(&self, entry: NewNotificationHistory) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO notification_history (
                user_id, notification_type, title, message, whatsapp_sent, email_sent
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(entry.user_id)
        .bind(entry.notification_type.as_str())
        .bind(&entry.title)
        .bind(&entry.message)
        .bind(entry.whatsapp_sent)
        .bind(entry.email_sent)
        .execute(&self.db)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl SiteSettingsSource for PgNotificationStore {
    async fn load_site_setting(&self) -> Result<Option<SiteSetting>, StoreError> {
        let row = sqlx::query_as::<_, SiteSettingRow>(&format!(
            "SELECT {} FROM site_settings ORDER BY id LIMIT 1",
            SITE_SETTING_COLUMNS
        ))
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(SiteSetting::from))
    }
}
