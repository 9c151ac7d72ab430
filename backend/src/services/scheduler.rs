//! Background low stock scheduler
//!
//! Every tick loads the enabled notification settings, works out which are
//! due, aggregates one inventory snapshot and delivers the digest to each due
//! user. `last_run_at` advances for every due job, even when nothing is low.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use shared::{HistoryType, NewNotificationHistory};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::services::channels::{ChannelProvider, Channels};
use crate::services::clock::Clock;
use crate::services::dispatch::{deliver, DeliveryTargets, DispatchOutcome};
use crate::services::low_stock::{build_low_stock_message, compute_low_stock_entries, low_stock_subject};
use crate::services::schedule::{DueJobCalculator, ScheduledJob};
use crate::services::store::{HistoryStore, InventorySnapshotSource, PreferenceStore};

/// Title of history rows written by the scheduler
pub const LOW_STOCK_TITLE: &str = "Low Stock Alert";

/// Collaborators the scheduler reads from and writes to
#[derive(Clone)]
pub struct SchedulerDeps {
    pub preferences: Arc<dyn PreferenceStore>,
    pub inventory: Arc<dyn InventorySnapshotSource>,
    pub history: Arc<dyn HistoryStore>,
    pub channels: Arc<dyn ChannelProvider>,
    pub clock: Arc<dyn Clock>,
}

/// Result of delivering to one due job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub setting_id: i64,
    pub user_id: i64,
    pub outcome: DispatchOutcome,
    pub history_recorded: bool,
    pub last_run_updated: bool,
}

/// Summary of one tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick_at: Option<DateTime<Utc>>,
    pub due_jobs: usize,
    pub low_stock_entries: usize,
    pub jobs: Vec<JobReport>,
}

struct SchedulerCore {
    deps: SchedulerDeps,
    calculator: DueJobCalculator,
    // Keeps a manual tick from overlapping the loop's tick
    tick_lock: tokio::sync::Mutex<()>,
}

impl SchedulerCore {
    async fn run_tick(&self) -> TickReport {
        let _guard = self.tick_lock.lock().await;
        let now = self.deps.clock.now();
        let mut report = TickReport {
            tick_at: Some(now),
            ..Default::default()
        };

        let settings = match self.deps.preferences.load_enabled().await {
            Ok(settings) => settings,
            Err(e) => {
                tracing::error!(tick_at = %now, "Failed to load notification settings: {}", e);
                return report;
            }
        };
        if settings.is_empty() {
            return report;
        }

        let due = self.calculator.due_jobs(&settings, now);
        report.due_jobs = due.len();
        if due.is_empty() {
            return report;
        }

        let items = match self.deps.inventory.load_active_items().await {
            Ok(items) => items,
            Err(e) => {
                tracing::error!(tick_at = %now, "Failed to load inventory for low stock check: {}", e);
                return report;
            }
        };

        let entries = compute_low_stock_entries(&items);
        let message = build_low_stock_message(&entries);
        report.low_stock_entries = entries.len();

        let channels = if entries.is_empty() {
            None
        } else {
            Some(self.deps.channels.channels(&low_stock_subject(entries.len())).await)
        };

        tracing::debug!(
            tick_at = %now,
            due_jobs = due.len(),
            low_stock_entries = entries.len(),
            "Running low stock tick"
        );

        for job in &due {
            let job_report = self.handle_job(job, channels.as_ref(), &message, now).await;
            report.jobs.push(job_report);
        }

        report
    }

    async fn handle_job(
        &self,
        job: &ScheduledJob,
        channels: Option<&Channels>,
        message: &str,
        now: DateTime<Utc>,
    ) -> JobReport {
        let setting = &job.setting;
        let mut outcome = DispatchOutcome::default();
        let mut history_recorded = false;

        if let Some(channels) = channels {
            outcome = deliver(channels, DeliveryTargets::from_setting(setting), message).await;

            if !outcome.errors.is_empty() {
                tracing::warn!(
                    user_id = setting.user_id,
                    run_time = %job.run_time,
                    "Errors sending low stock notification: {}",
                    outcome.errors.join("; ")
                );
            }

            if outcome.any_sent() {
                let entry = NewNotificationHistory {
                    user_id: setting.user_id,
                    notification_type: HistoryType::LowStock,
                    title: LOW_STOCK_TITLE.to_string(),
                    message: message.to_string(),
                    whatsapp_sent: outcome.whatsapp_sent,
                    email_sent: outcome.email_sent,
                };
                match self.deps.history.append(entry).await {
                    Ok(()) => history_recorded = true,
                    Err(e) => {
                        tracing::error!(
                            user_id = setting.user_id,
                            "Failed to record notification history: {}",
                            e
                        );
                    }
                }
            }
        }

        let last_run_updated = match self.deps.preferences.update_last_run(setting.id, now).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(
                    setting_id = setting.id,
                    "Failed to update last_run_at: {}",
                    e
                );
                false
            }
        };

        JobReport {
            setting_id: setting.id,
            user_id: setting.user_id,
            outcome,
            history_recorded,
            last_run_updated,
        }
    }
}

/// Periodic driver for low stock notifications
pub struct LowStockScheduler {
    core: Arc<SchedulerCore>,
    tick_interval: Duration,
    shutdown: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
    started: AtomicBool,
}

impl LowStockScheduler {
    pub fn new(deps: SchedulerDeps, tick_interval: Duration) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            core: Arc::new(SchedulerCore {
                deps,
                calculator: DueJobCalculator::new(),
                tick_lock: tokio::sync::Mutex::new(()),
            }),
            tick_interval,
            shutdown,
            handle: Mutex::new(None),
            started: AtomicBool::new(false),
        }
    }

    /// Spawn the loop. The first tick runs immediately. Later calls, and
    /// calls after `stop`, are no-ops.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            tracing::warn!("Low stock scheduler already started");
            return;
        }

        let core = self.core.clone();
        let period = self.tick_interval;
        let mut shutdown_rx = self.shutdown.subscribe();
        // Subscribing marks the current value as seen, so an earlier stop
        // would never reach `changed()`
        if *shutdown_rx.borrow() {
            tracing::warn!("Low stock scheduler already stopped, not starting");
            return;
        }

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => {
                        let core = core.clone();
                        // A panicking tick must not take the loop down with it
                        if let Err(e) = tokio::spawn(async move { core.run_tick().await }).await {
                            tracing::error!("Low stock tick aborted: {}", e);
                        }
                    }
                }
            }

            tracing::info!("Low stock scheduler stopped");
        });

        *self.handle.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(handle);
        tracing::info!(
            tick_interval_secs = period.as_secs(),
            "Low stock scheduler started"
        );
    }

    /// Signal the loop to stop and wait up to `deadline` for it to exit.
    ///
    /// Returns false when the deadline elapsed first. A tick already running
    /// is left to finish; no new tick starts after this call.
    pub async fn stop(&self, deadline: Duration) -> bool {
        self.shutdown.send_replace(true);

        let handle = self
            .handle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        let Some(handle) = handle else {
            return true;
        };

        match tokio::time::timeout(deadline, handle).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::error!("Low stock scheduler task failed: {}", e);
                true
            }
            Err(_) => {
                tracing::warn!(
                    deadline_ms = deadline.as_millis() as u64,
                    "Low stock scheduler did not stop before the deadline"
                );
                false
            }
        }
    }

    /// Run a single tick outside the loop.
    ///
    /// Test seam for driving ticks deterministically; production code only
    /// uses `start` and `stop`.
    #[doc(hidden)]
    pub async fn run_tick(&self) -> TickReport {
        self.core.run_tick().await
    }
}
