//! Site-wide settings

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Site-wide branding and delivery channel overrides.
///
/// Blank channel fields (or a zero SMTP port) mean "use the server default".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SiteSetting {
    pub id: i64,
    pub app_name: String,

    // WhatsApp API
    pub whatsapp_api_url: String,
    pub whatsapp_api_key: String,
    pub whatsapp_sender: String,

    // SMTP email
    pub smtp_host: String,
    pub smtp_port: i32,
    pub smtp_username: String,
    pub smtp_password: String,
    pub smtp_from_email: String,
    pub smtp_from_name: String,

    pub updated_at: Option<DateTime<Utc>>,
}

/// Contact details from a user profile
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserContact {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}
