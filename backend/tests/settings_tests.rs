//! Notification settings update tests
//!
//! Tests for the rules applied when a user saves preferences:
//! - Schedule changes reset `last_run_at`
//! - Defaults for blank fields
//! - Validation of cron, timezone and contact fields

use chrono::{Duration, TimeZone, Utc};
use inventory_backend::error::AppError;
use inventory_backend::services::notification_settings::{
    merge_settings_update, UpdateNotificationSettingsInput,
};
use proptest::prelude::*;
use shared::{CheckFrequency, NotificationSetting, ScheduleMode, DEFAULT_TIMEZONE};

fn now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 15, 3, 0, 0).unwrap()
}

fn stored() -> NotificationSetting {
    let created = now() - Duration::days(3);
    let mut setting = NotificationSetting::defaults_for(7, created);
    setting.id = 42;
    setting.enabled = true;
    setting.whatsapp_enabled = true;
    setting.whatsapp_number = "081111".to_string();
    setting.last_run_at = Some(now() - Duration::hours(18));
    setting
}

/// Input that restates the stored setting unchanged
fn same_as_stored() -> UpdateNotificationSettingsInput {
    UpdateNotificationSettingsInput {
        enabled: true,
        threshold: 10,
        check_frequency: "daily".to_string(),
        schedule_mode: "preset".to_string(),
        cron_expression: "0 9 * * *".to_string(),
        timezone: DEFAULT_TIMEZONE.to_string(),
        whatsapp_enabled: true,
        whatsapp_number: "081111".to_string(),
        email_enabled: false,
        email_address: String::new(),
    }
}

fn validation_field(err: AppError) -> String {
    match err {
        AppError::Validation { field, .. } => field,
        other => panic!("expected validation error, got {:?}", other),
    }
}

// ============================================================================
// Last Run Reset
// ============================================================================

#[cfg(test)]
mod reset_tests {
    use super::*;

    #[test]
    fn test_unchanged_schedule_keeps_last_run() {
        let existing = stored();
        let mut input = same_as_stored();
        input.whatsapp_number = "081111 | 082222".to_string();
        input.threshold = 25;

        let merged = merge_settings_update(Some(&existing), 7, input, now()).unwrap();
        assert_eq!(merged.last_run_at, existing.last_run_at);
        assert_eq!(merged.id, 42);
        assert_eq!(merged.created_at, existing.created_at);
        assert_eq!(merged.updated_at, now());
        assert_eq!(merged.threshold, 25);
    }

    #[test]
    fn test_toggling_enabled_resets_last_run() {
        let existing = stored();

        let mut disable = same_as_stored();
        disable.enabled = false;
        let disabled = merge_settings_update(Some(&existing), 7, disable, now()).unwrap();
        assert!(!disabled.enabled);
        assert_eq!(disabled.last_run_at, None);

        let mut reenabled_from = disabled.clone();
        reenabled_from.last_run_at = Some(now());
        let enabled = merge_settings_update(Some(&reenabled_from), 7, same_as_stored(), now()).unwrap();
        assert!(enabled.enabled);
        assert_eq!(enabled.last_run_at, None);
    }

    #[test]
    fn test_schedule_field_changes_reset_last_run() {
        let existing = stored();

        let mut frequency = same_as_stored();
        frequency.check_frequency = "weekly".to_string();

        let mut mode = same_as_stored();
        mode.schedule_mode = "cron".to_string();

        let mut timezone = same_as_stored();
        timezone.timezone = "Asia/Makassar".to_string();

        for input in [frequency, mode, timezone] {
            let merged = merge_settings_update(Some(&existing), 7, input, now()).unwrap();
            assert_eq!(merged.last_run_at, None);
        }
    }

    #[test]
    fn test_cron_expression_change_resets_last_run() {
        let mut existing = stored();
        existing.schedule_mode = ScheduleMode::Cron;

        let mut input = same_as_stored();
        input.schedule_mode = "cron".to_string();
        input.cron_expression = "  0 9 * * *  ".to_string();
        let same = merge_settings_update(Some(&existing), 7, input.clone(), now()).unwrap();
        assert_eq!(same.last_run_at, existing.last_run_at);
        assert_eq!(same.cron_expression, "0 9 * * *");

        input.cron_expression = "30 8 * * 1-5".to_string();
        let changed = merge_settings_update(Some(&existing), 7, input, now()).unwrap();
        assert_eq!(changed.last_run_at, None);
    }

    #[test]
    fn test_retry_after_concurrent_first_save_merges_over_winner() {
        // Another request created the row between our read and insert
        let first = merge_settings_update(None, 7, same_as_stored(), now()).unwrap();
        let mut winner = first.clone();
        winner.id = 99;
        winner.last_run_at = Some(now() + Duration::minutes(1));

        let mut input = same_as_stored();
        input.threshold = 30;
        let later = now() + Duration::minutes(2);
        let retried = merge_settings_update(Some(&winner), 7, input, later).unwrap();

        assert_eq!(retried.id, 99);
        assert_eq!(retried.created_at, winner.created_at);
        assert_eq!(retried.last_run_at, winner.last_run_at);
        assert_eq!(retried.threshold, 30);
        assert_eq!(retried.updated_at, later);
    }

    #[test]
    fn test_first_save_creates_defaults() {
        let merged = merge_settings_update(None, 7, same_as_stored(), now()).unwrap();
        assert_eq!(merged.user_id, 7);
        assert_eq!(merged.last_run_at, None);
        assert_eq!(merged.created_at, now());
    }
}

// ============================================================================
// Normalization And Validation
// ============================================================================

#[cfg(test)]
mod validation_tests {
    use super::*;

    #[test]
    fn test_blank_fields_take_defaults() {
        let input = UpdateNotificationSettingsInput {
            enabled: true,
            ..Default::default()
        };

        let merged = merge_settings_update(None, 7, input, now()).unwrap();
        assert_eq!(merged.schedule_mode, ScheduleMode::Preset);
        assert_eq!(merged.check_frequency, CheckFrequency::Daily);
        assert_eq!(merged.timezone, DEFAULT_TIMEZONE);
    }

    #[test]
    fn test_cron_mode_requires_valid_expression() {
        let mut input = same_as_stored();
        input.schedule_mode = "cron".to_string();
        input.cron_expression = "   ".to_string();
        let err = merge_settings_update(None, 7, input.clone(), now()).unwrap_err();
        assert_eq!(validation_field(err), "cron_expression");

        input.cron_expression = "0 0 9 * * *".to_string();
        let err = merge_settings_update(None, 7, input, now()).unwrap_err();
        assert_eq!(validation_field(err), "cron_expression");
    }

    #[test]
    fn test_invalid_expression_ignored_in_preset_mode() {
        let mut input = same_as_stored();
        input.cron_expression = "not a cron".to_string();

        let merged = merge_settings_update(None, 7, input, now()).unwrap();
        assert_eq!(merged.schedule_mode, ScheduleMode::Preset);
        assert_eq!(merged.cron_expression, "not a cron");
    }

    #[test]
    fn test_rejects_unknown_timezone_and_frequency() {
        let mut input = same_as_stored();
        input.timezone = "Mars/Olympus".to_string();
        let err = merge_settings_update(None, 7, input, now()).unwrap_err();
        assert_eq!(validation_field(err), "timezone");

        let mut input = same_as_stored();
        input.check_frequency = "monthly".to_string();
        let err = merge_settings_update(None, 7, input, now()).unwrap_err();
        assert_eq!(validation_field(err), "check_frequency");

        let mut input = same_as_stored();
        input.check_frequency = "Hourly".to_string();
        let merged = merge_settings_update(None, 7, input, now()).unwrap();
        assert_eq!(merged.check_frequency, CheckFrequency::Hourly);
    }

    #[test]
    fn test_rejects_negative_threshold_and_bad_email() {
        let mut input = same_as_stored();
        input.threshold = -1;
        let err = merge_settings_update(None, 7, input, now()).unwrap_err();
        assert_eq!(validation_field(err), "threshold");

        let mut input = same_as_stored();
        input.email_enabled = true;
        input.email_address = "gudang-at-example".to_string();
        let err = merge_settings_update(None, 7, input, now()).unwrap_err();
        assert_eq!(validation_field(err), "email_address");
    }

    #[test]
    fn test_recipients_normalized() {
        let mut input = same_as_stored();
        input.whatsapp_number = " 0811 11, 082222 ;0811 11\n".to_string();

        let merged = merge_settings_update(None, 7, input, now()).unwrap();
        assert_eq!(merged.whatsapp_number, "081111|082222");
    }
}

// ============================================================================
// Property Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Contact-only edits never reset the schedule
        #[test]
        fn prop_contact_edits_keep_last_run(
            threshold in 0i32..1000,
            number in "[0-9]{8,12}",
            email_enabled in any::<bool>(),
        ) {
            let existing = stored();
            let mut input = same_as_stored();
            input.threshold = threshold;
            input.whatsapp_number = number.clone();
            input.email_enabled = email_enabled;

            let merged = merge_settings_update(Some(&existing), 7, input, now()).unwrap();
            prop_assert_eq!(merged.last_run_at, existing.last_run_at);
            prop_assert_eq!(merged.whatsapp_number, number);
        }
    }
}
