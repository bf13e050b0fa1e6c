use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use shared_models::{Appointment, MessageType, MessagingConfig};

use crate::error::ReminderError;
use crate::models::{ReminderSettings, TickReport};
use crate::services::dispatcher::{NotificationDispatcher, ReminderStores};
use crate::services::retry::RetryCoordinator;

/// Width of each reminder window. An appointment stays inside a window for
/// this long, so every tick in that span sees it until a reminder is recorded.
pub fn bucket_width() -> Duration {
    Duration::hours(1)
}

/// `[now + lead, now + lead + bucket)`.
pub fn reminder_window(now: DateTime<Utc>, lead_time: Duration) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = now + lead_time;
    (start, start + bucket_width())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DispatchOutcome {
    Sent,
    Skipped,
    Failed,
}

/// Cumulative counters since process start.
#[derive(Debug, Default)]
pub struct SchedulerStats {
    ticks_run: AtomicU64,
    ticks_skipped: AtomicU64,
    ticks_timed_out: AtomicU64,
    ticks_failed: AtomicU64,
    reminders_sent: AtomicU64,
    reminders_failed: AtomicU64,
    retries_sent: AtomicU64,
    retries_exhausted: AtomicU64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStatsSnapshot {
    pub ticks_run: u64,
    pub ticks_skipped: u64,
    pub ticks_timed_out: u64,
    pub ticks_failed: u64,
    pub reminders_sent: u64,
    pub reminders_failed: u64,
    pub retries_sent: u64,
    pub retries_exhausted: u64,
}

impl SchedulerStats {
    pub fn snapshot(&self) -> SchedulerStatsSnapshot {
        SchedulerStatsSnapshot {
            ticks_run: self.ticks_run.load(Ordering::Relaxed),
            ticks_skipped: self.ticks_skipped.load(Ordering::Relaxed),
            ticks_timed_out: self.ticks_timed_out.load(Ordering::Relaxed),
            ticks_failed: self.ticks_failed.load(Ordering::Relaxed),
            reminders_sent: self.reminders_sent.load(Ordering::Relaxed),
            reminders_failed: self.reminders_failed.load(Ordering::Relaxed),
            retries_sent: self.retries_sent.load(Ordering::Relaxed),
            retries_exhausted: self.retries_exhausted.load(Ordering::Relaxed),
        }
    }

    fn record(&self, report: &TickReport) {
        self.ticks_run.fetch_add(1, Ordering::Relaxed);
        self.reminders_sent.fetch_add(report.sent as u64, Ordering::Relaxed);
        self.reminders_failed.fetch_add(report.failed as u64, Ordering::Relaxed);
        self.retries_sent.fetch_add(report.retry.sent as u64, Ordering::Relaxed);
        self.retries_exhausted.fetch_add(report.retry.exhausted as u64, Ordering::Relaxed);
    }
}

/// Periodic driver for reminders. Each tick scans one window per enabled
/// reminder kind, dispatches what is due, then runs one retry pass.
pub struct ReminderWindowScheduler {
    stores: ReminderStores,
    dispatcher: Arc<NotificationDispatcher>,
    retry: Arc<RetryCoordinator>,
    settings: ReminderSettings,
    stats: Arc<SchedulerStats>,
    tick_lock: Mutex<()>,
}

/// Returned by [`ReminderWindowScheduler::start`].
pub struct SchedulerHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stops future ticks and waits for the loop to exit. A tick already
    /// running is allowed to finish.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.task.await {
            error!("Reminder scheduler task ended abnormally: {}", e);
        }
    }
}

impl ReminderWindowScheduler {
    pub fn new(
        stores: ReminderStores,
        dispatcher: Arc<NotificationDispatcher>,
        retry: Arc<RetryCoordinator>,
        settings: ReminderSettings,
        stats: Arc<SchedulerStats>,
    ) -> Self {
        Self {
            stores,
            dispatcher,
            retry,
            settings,
            stats,
            tick_lock: Mutex::new(()),
        }
    }

    pub fn stats(&self) -> Arc<SchedulerStats> {
        self.stats.clone()
    }

    /// Spawns the periodic loop. The first tick runs immediately.
    pub fn start(self: Arc<Self>) -> SchedulerHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let period = self.settings.check_interval;

        let task = tokio::spawn(async move {
            info!("Reminder scheduler started, checking every {:?}", period);
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = self.tick().await {
                            error!("Reminder tick failed: {}", e);
                        }
                    }
                }
            }

            info!("Reminder scheduler stopped");
        });

        SchedulerHandle { stop_tx, task }
    }

    /// One guarded, time-limited tick. Returns `Ok(None)` when another tick
    /// is still running.
    pub async fn tick(&self) -> Result<Option<TickReport>, ReminderError> {
        let Ok(_guard) = self.tick_lock.try_lock() else {
            warn!("Previous reminder tick still running, skipping this one");
            self.stats.ticks_skipped.fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        };

        match timeout(self.settings.tick_timeout, self.run_tick(Utc::now())).await {
            Ok(Ok(report)) => {
                self.stats.record(&report);
                Ok(Some(report))
            }
            Ok(Err(e)) => {
                self.stats.ticks_failed.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
            Err(_) => {
                self.stats.ticks_timed_out.fetch_add(1, Ordering::Relaxed);
                Err(ReminderError::TickTimeout {
                    timeout_seconds: self.settings.tick_timeout.as_secs(),
                })
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn run_tick(&self, now: DateTime<Utc>) -> Result<TickReport, ReminderError> {
        let config = self.stores.messaging_config.get_messaging_config().await?;
        let mut report = TickReport::default();

        if !config.is_sending_enabled() {
            debug!("WhatsApp reminders disabled, nothing to do");
            report.disabled = true;
            return Ok(report);
        }

        for offset in config.enabled_offsets() {
            let (start, end) = reminder_window(now, offset.lead_time);

            let appointments = match self.stores.appointments.list_appointments_in_range(start, end).await {
                Ok(appointments) => appointments,
                Err(e) => {
                    error!("Could not list appointments for {} reminders: {}", offset.message_type, e);
                    report.window_errors += 1;
                    continue;
                }
            };

            report.windows_scanned += 1;
            report.candidates += appointments.len();
            debug!(
                "{} appointment(s) due for {} reminder between {} and {}",
                appointments.len(),
                offset.message_type,
                start,
                end
            );

            let config = &config;
            let outcomes: Vec<DispatchOutcome> = stream::iter(appointments)
                .map(|appointment| self.remind(config, appointment, offset.message_type))
                .buffer_unordered(self.settings.dispatch_concurrency)
                .collect()
                .await;

            for outcome in outcomes {
                match outcome {
                    DispatchOutcome::Sent => report.sent += 1,
                    DispatchOutcome::Skipped => report.skipped += 1,
                    DispatchOutcome::Failed => report.failed += 1,
                }
            }
        }

        match self
            .retry
            .retry_pending(&config, self.settings.retry_batch_size, now)
            .await
        {
            Ok(retry) => report.retry = retry,
            Err(e) => error!("Retry pass failed: {}", e),
        }

        info!(
            "Reminder tick: {} sent, {} skipped, {} failed, {} retried",
            report.sent, report.skipped, report.failed, report.retry.sent
        );
        Ok(report)
    }

    async fn remind(
        &self,
        config: &MessagingConfig,
        appointment: Appointment,
        message_type: MessageType,
    ) -> DispatchOutcome {
        let existing = match self
            .stores
            .notifications
            .get_notifications_by_appointment(appointment.id)
            .await
        {
            Ok(records) => records,
            Err(e) => {
                error!("Could not read reminders for {}: {}", appointment.id, e);
                return DispatchOutcome::Failed;
            }
        };

        let settled = existing.iter().any(|record| {
            record.message_type == message_type
                && (record.status.is_terminal_success() || record.is_exhausted(self.settings.max_attempts))
        });
        if settled {
            return DispatchOutcome::Skipped;
        }

        let Some(patient_id) = appointment.patient_id else {
            debug!("Appointment {} has no registered patient, skipping", appointment.id);
            return DispatchOutcome::Skipped;
        };

        let contact = match self.stores.contacts.get_contact(patient_id).await {
            Ok(Some(contact)) => contact,
            Ok(None) => {
                warn!("Patient {} for appointment {} not found", patient_id, appointment.id);
                return DispatchOutcome::Skipped;
            }
            Err(e) => {
                error!("Could not load patient {}: {}", patient_id, e);
                return DispatchOutcome::Failed;
            }
        };

        match self.dispatcher.send(config, &appointment, &contact, message_type).await {
            Ok(_) => DispatchOutcome::Sent,
            Err(ReminderError::Validation(reason)) => {
                warn!("Not sending {} reminder for {}: {}", message_type, appointment.id, reason);
                DispatchOutcome::Skipped
            }
            Err(e) => {
                warn!("{} reminder for {} failed: {}", message_type, appointment.id, e);
                DispatchOutcome::Failed
            }
        }
    }
}
