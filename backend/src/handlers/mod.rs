//! HTTP request handlers

pub mod health;
pub mod inventory;
pub mod notification;
pub mod site_settings;

pub use health::health_check;
pub use inventory::list_low_stock;
pub use notification::{
    check_low_stock, get_history, get_settings, send_test_notification, update_settings,
};
pub use site_settings::{get_channel_settings, update_channel_settings};
