//! Due-job calculation for low stock notification settings
//!
//! Each enabled setting is evaluated in its own timezone against the instant
//! of the current tick and its persisted `last_run_at`:
//! - cron mode fires once per computed occurrence of a 5-field expression
//! - daily fires at 09:00 local, weekly at 09:00 local on Monday
//! - hourly (and any unrecognised frequency) fires when an hour has passed

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, Local, LocalResult, NaiveDate, NaiveTime,
    TimeZone, Timelike, Utc,
};
use chrono_tz::Tz;
use croner::Cron;
use shared::{is_blank, split_whatsapp_recipients, CheckFrequency, NotificationSetting, DEFAULT_TIMEZONE};
use thiserror::Error;

/// Local hour preset schedules fire at
const PRESET_HOUR: u32 = 9;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("invalid cron expression {expression:?}: {reason}")]
    InvalidCron { expression: String, reason: String },

    #[error("unknown timezone {0:?}")]
    UnknownTimezone(String),
}

/// Timezone a setting is evaluated in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleZone {
    Named(Tz),
    /// Fallback for names that do not resolve
    ServerLocal,
}

/// A setting whose alert is due in the current tick
#[derive(Debug, Clone)]
pub struct ScheduledJob {
    pub setting: NotificationSetting,
    /// Localized instant the job is considered to have fired
    pub run_time: DateTime<FixedOffset>,
    pub zone: ScheduleZone,
}

/// Parse a 5-field minute/hour/day-of-month/month/day-of-week expression
pub fn parse_cron(expression: &str) -> Result<Cron, ScheduleError> {
    let expression = expression.trim();
    if expression.split_whitespace().count() != 5 {
        return Err(ScheduleError::InvalidCron {
            expression: expression.to_string(),
            reason: "expected 5 fields (minute hour day-of-month month day-of-week)".to_string(),
        });
    }

    Cron::new(expression)
        .parse()
        .map_err(|e| ScheduleError::InvalidCron {
            expression: expression.to_string(),
            reason: e.to_string(),
        })
}

/// Resolve an IANA zone name; blank means the default zone
pub fn parse_timezone(name: &str) -> Result<Tz, ScheduleError> {
    let name = match name.trim() {
        "" => DEFAULT_TIMEZONE,
        name => name,
    };

    name.parse::<Tz>()
        .map_err(|_| ScheduleError::UnknownTimezone(name.to_string()))
}

/// Whether the setting has anywhere to deliver an alert
pub fn has_deliverable_channel(setting: &NotificationSetting) -> bool {
    let whatsapp_ready =
        setting.whatsapp_enabled && !split_whatsapp_recipients(&setting.whatsapp_number).is_empty();
    let email_ready = setting.email_enabled && !is_blank(&setting.email_address);

    match (setting.whatsapp_enabled, setting.email_enabled) {
        (false, false) => false,
        (true, false) => whatsapp_ready,
        (false, true) => email_ready,
        // Both toggled on: dispatch reports whichever one is unusable
        (true, true) => true,
    }
}

/// Computes which settings are due, caching resolved timezones
#[derive(Debug, Default)]
pub struct DueJobCalculator {
    zones: RwLock<HashMap<String, Tz>>,
}

impl DueJobCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings due at `now`, in input order
    pub fn due_jobs(&self, settings: &[NotificationSetting], now: DateTime<Utc>) -> Vec<ScheduledJob> {
        let mut due = Vec::with_capacity(settings.len());

        for setting in settings {
            if !setting.enabled || !has_deliverable_channel(setting) {
                continue;
            }

            let zone = self.resolve_zone(&setting.timezone);
            let run_time = match zone {
                ScheduleZone::Named(tz) => next_run_time(setting, now.with_timezone(&tz)),
                ScheduleZone::ServerLocal => next_run_time(setting, now.with_timezone(&Local)),
            };

            match run_time {
                Ok(Some(run_time)) => due.push(ScheduledJob {
                    setting: setting.clone(),
                    run_time,
                    zone,
                }),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(
                        user_id = setting.user_id,
                        setting_id = setting.id,
                        "Skipping schedule evaluation: {}",
                        e
                    );
                }
            }
        }

        due
    }

    /// Look up a zone, falling back to the server zone when the name is unknown
    pub fn resolve_zone(&self, name: &str) -> ScheduleZone {
        let key = match name.trim() {
            "" => DEFAULT_TIMEZONE,
            name => name,
        };

        if let Some(tz) = self
            .zones
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
        {
            return ScheduleZone::Named(*tz);
        }

        match parse_timezone(key) {
            Ok(tz) => {
                self.zones
                    .write()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .insert(key.to_string(), tz);
                ScheduleZone::Named(tz)
            }
            Err(e) => {
                tracing::warn!("{}, falling back to server local time", e);
                ScheduleZone::ServerLocal
            }
        }
    }
}

/// Compute the run time of a setting if it is due at `localized_now`
pub fn next_run_time<Z: TimeZone>(
    setting: &NotificationSetting,
    localized_now: DateTime<Z>,
) -> Result<Option<DateTime<FixedOffset>>, ScheduleError> {
    let zone = localized_now.timezone();
    let last_run = setting.last_run_at.map(|t| t.with_timezone(&zone));

    let next = match setting.active_cron_expression() {
        Some(expression) => next_cron_run(expression, &localized_now, last_run.as_ref())?,
        None => next_preset_run(setting.check_frequency, &localized_now, last_run.as_ref()),
    };

    Ok(next.map(|t| t.fixed_offset()))
}

/// Next occurrence after `last_run` (or the minute before now), if it has passed
pub fn next_cron_run<Z: TimeZone>(
    expression: &str,
    localized_now: &DateTime<Z>,
    last_run: Option<&DateTime<Z>>,
) -> Result<Option<DateTime<Z>>, ScheduleError> {
    let cron = parse_cron(expression)?;

    let base = match last_run {
        Some(last_run) => last_run.clone(),
        None => localized_now.clone() - Duration::minutes(1),
    };

    let next = cron
        .find_next_occurrence(&base, false)
        .map_err(|e| ScheduleError::InvalidCron {
            expression: expression.to_string(),
            reason: e.to_string(),
        })?;

    if next > *localized_now {
        return Ok(None);
    }
    if last_run.is_some_and(|last_run| next <= *last_run) {
        return Ok(None);
    }
    Ok(Some(next))
}

/// Preset cadence evaluation
pub fn next_preset_run<Z: TimeZone>(
    frequency: CheckFrequency,
    localized_now: &DateTime<Z>,
    last_run: Option<&DateTime<Z>>,
) -> Option<DateTime<Z>> {
    let zone = localized_now.timezone();
    let today = localized_now.date_naive();

    match frequency {
        CheckFrequency::Daily => {
            let scheduled = local_time_at(&zone, today, PRESET_HOUR)?;
            due_since(scheduled, localized_now, last_run)
        }
        CheckFrequency::Weekly => {
            let monday =
                today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
            let scheduled = local_time_at(&zone, monday, PRESET_HOUR)?;
            due_since(scheduled, localized_now, last_run)
        }
        CheckFrequency::Hourly => {
            let elapsed = last_run.map(|last_run| localized_now.clone() - last_run.clone());
            match elapsed {
                Some(elapsed) if elapsed < Duration::hours(1) => None,
                _ => truncate_to_minute(localized_now),
            }
        }
    }
}

fn due_since<Z: TimeZone>(
    scheduled: DateTime<Z>,
    localized_now: &DateTime<Z>,
    last_run: Option<&DateTime<Z>>,
) -> Option<DateTime<Z>> {
    if *localized_now < scheduled {
        return None;
    }
    match last_run {
        Some(last_run) if *last_run >= scheduled => None,
        _ => Some(scheduled),
    }
}

/// `hour:00` on `date` in `zone`. A wall time skipped by a DST jump resolves
/// to the first valid instant after the gap.
fn local_time_at<Z: TimeZone>(zone: &Z, date: NaiveDate, hour: u32) -> Option<DateTime<Z>> {
    let naive = date.and_time(NaiveTime::from_hms_opt(hour, 0, 0)?);

    match zone.from_local_datetime(&naive) {
        LocalResult::Single(t) => Some(t),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => zone
            .from_local_datetime(&(naive + Duration::hours(1)))
            .earliest(),
    }
}

fn truncate_to_minute<Z: TimeZone>(t: &DateTime<Z>) -> Option<DateTime<Z>> {
    t.with_second(0)?.with_nanosecond(0)
}
