//! Common types used across the platform

use serde::{Deserialize, Serialize};

/// Delivery channels for notifications
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryChannel {
    WhatsApp,
    Email,
}

impl DeliveryChannel {
    pub fn label(&self) -> &'static str {
        match self {
            DeliveryChannel::WhatsApp => "WhatsApp",
            DeliveryChannel::Email => "Email",
        }
    }
}

/// Number of history rows returned by a listing
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryLimit(u32);

impl HistoryLimit {
    pub const DEFAULT: u32 = 10;
    pub const MAX: u32 = 100;

    /// Accepts 1..=100; anything else (or nothing) yields the default
    pub fn from_query(requested: Option<i64>) -> Self {
        match requested {
            Some(limit) if limit > 0 && limit <= i64::from(Self::MAX) => Self(limit as u32),
            _ => Self(Self::DEFAULT),
        }
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl Default for HistoryLimit {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}
