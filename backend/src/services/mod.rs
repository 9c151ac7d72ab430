//! Business logic services for the inventory administration backend

pub mod channels;
pub mod clock;
pub mod dispatch;
pub mod low_stock;
pub mod notification_settings;
pub mod runtime_config;
pub mod schedule;
pub mod scheduler;
pub mod site_settings;
pub mod store;

pub use channels::{ChannelProvider, Channels, ConfiguredChannelProvider, MessageChannel};
pub use clock::{Clock, SystemClock};
pub use notification_settings::NotificationSettingsService;
pub use runtime_config::{ChannelDefaults, SiteSettingsCache};
pub use schedule::DueJobCalculator;
pub use scheduler::{LowStockScheduler, SchedulerDeps};
pub use site_settings::SiteSettingsService;
pub use store::{PgNotificationStore, StoreError};
