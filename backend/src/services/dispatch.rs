//! Per-recipient delivery of a digest over the enabled channels

use serde::Serialize;
use shared::{is_blank, split_whatsapp_recipients, DeliveryChannel, NotificationSetting};

use crate::services::channels::Channels;

/// What happened when a message was delivered to one user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchOutcome {
    pub whatsapp_sent: bool,
    pub email_sent: bool,
    pub errors: Vec<String>,
}

impl DispatchOutcome {
    pub fn any_sent(&self) -> bool {
        self.whatsapp_sent || self.email_sent
    }

    fn record_failure(&mut self, channel: DeliveryChannel, detail: Option<&str>, error: impl std::fmt::Display) {
        let label = channel.label();
        let message = match detail {
            Some(detail) => format!("{} ({}): {}", label, detail, error),
            None => format!("{}: {}", label, error),
        };
        self.errors.push(message);
    }
}

/// Where a message should go. `None` means the channel is off.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeliveryTargets<'a> {
    /// Raw recipient list, split before sending
    pub whatsapp: Option<&'a str>,
    pub email: Option<&'a str>,
}

impl<'a> DeliveryTargets<'a> {
    pub fn from_setting(setting: &'a NotificationSetting) -> Self {
        Self {
            whatsapp: setting
                .whatsapp_enabled
                .then_some(setting.whatsapp_number.as_str()),
            email: setting.email_enabled.then_some(setting.email_address.as_str()),
        }
    }
}

/// Deliver `message` to every target.
///
/// WhatsApp recipients are attempted independently; one success marks the
/// channel as sent. A blank email address is skipped silently.
pub async fn deliver(channels: &Channels, targets: DeliveryTargets<'_>, message: &str) -> DispatchOutcome {
    let mut outcome = DispatchOutcome::default();

    if let Some(raw_recipients) = targets.whatsapp {
        let recipients = split_whatsapp_recipients(raw_recipients);
        if recipients.is_empty() {
            outcome.record_failure(
                DeliveryChannel::WhatsApp,
                None,
                "no valid phone numbers configured",
            );
        }

        for phone in &recipients {
            match channels.whatsapp.send(phone, message).await {
                Ok(()) => outcome.whatsapp_sent = true,
                Err(e) => outcome.record_failure(DeliveryChannel::WhatsApp, Some(phone), e),
            }
        }
    }

    if let Some(address) = targets.email.filter(|a| !is_blank(a)).map(str::trim) {
        match channels.email.send(address, message).await {
            Ok(()) => outcome.email_sent = true,
            Err(e) => outcome.record_failure(DeliveryChannel::Email, None, e),
        }
    }

    outcome
}
