use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error, info, instrument, warn};

use shared_models::{Appointment, Contact, MessagingConfig, NotificationRecord, NotificationStatus};

use crate::error::ReminderError;
use crate::models::{ReminderSettings, RetryReport};
use crate::services::dispatcher::{NotificationDispatcher, ReminderStores};

enum RetryOutcome {
    Sent,
    Failed,
    Exhausted,
}

/// Re-attempts failed reminders. A record is retryable while its status is
/// `failed`, it is under the attempt budget, and its last attempt is older
/// than the retry delay.
pub struct RetryCoordinator {
    stores: ReminderStores,
    dispatcher: Arc<NotificationDispatcher>,
    max_attempts: u32,
    retry_delay: Duration,
}

impl RetryCoordinator {
    pub fn new(
        stores: ReminderStores,
        dispatcher: Arc<NotificationDispatcher>,
        settings: &ReminderSettings,
    ) -> Self {
        Self {
            stores,
            dispatcher,
            max_attempts: settings.max_attempts,
            retry_delay: settings.retry_delay,
        }
    }

    #[instrument(skip(self, config))]
    pub async fn retry_pending(
        &self,
        config: &MessagingConfig,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<RetryReport, ReminderError> {
        let mut report = RetryReport::default();
        if !config.is_sending_enabled() || limit == 0 {
            return Ok(report);
        }

        let records = self
            .stores
            .notifications
            .get_pending_notifications(limit, self.max_attempts, now - self.retry_delay)
            .await?;

        report.selected = records.len();
        if records.is_empty() {
            return Ok(report);
        }
        debug!("Retrying {} failed reminder(s)", records.len());

        for record in records {
            match self.retry_one(config, &record, now).await {
                RetryOutcome::Sent => report.sent += 1,
                RetryOutcome::Failed => report.failed += 1,
                RetryOutcome::Exhausted => report.exhausted += 1,
            }
        }

        info!(
            "Retry pass: {} sent, {} failed, {} exhausted",
            report.sent, report.failed, report.exhausted
        );
        Ok(report)
    }

    async fn retry_one(
        &self,
        config: &MessagingConfig,
        record: &NotificationRecord,
        now: DateTime<Utc>,
    ) -> RetryOutcome {
        let (appointment, contact) = match self.load_recipient(record, now).await {
            Ok(recipient) => recipient,
            Err(ReminderError::NotFound(what)) => {
                return self.exhaust(record, &format!("{} no longer exists", what)).await
            }
            Err(ReminderError::Validation(reason)) => return self.exhaust(record, &reason).await,
            Err(e) => {
                error!("Could not load recipient for {}: {}", record.appointment_id, e);
                return RetryOutcome::Failed;
            }
        };

        match self
            .dispatcher
            .send(config, &appointment, &contact, record.message_type)
            .await
        {
            Ok(_) => RetryOutcome::Sent,
            Err(ReminderError::Validation(reason)) => self.exhaust(record, &reason).await,
            Err(e) => {
                warn!(
                    "Retry of {} reminder for {} failed: {}",
                    record.message_type, record.appointment_id, e
                );
                RetryOutcome::Failed
            }
        }
    }

    /// The appointment and contact a retry would send to, as they are now.
    async fn load_recipient(
        &self,
        record: &NotificationRecord,
        now: DateTime<Utc>,
    ) -> Result<(Appointment, Contact), ReminderError> {
        let appointment = self
            .stores
            .appointments
            .get_appointment(record.appointment_id)
            .await?
            .ok_or_else(|| ReminderError::NotFound("appointment".to_string()))?;

        if appointment.start_time <= now {
            return Err(ReminderError::Validation("appointment already started".to_string()));
        }

        let patient_id = appointment
            .patient_id
            .or(record.patient_id)
            .ok_or_else(|| ReminderError::Validation("appointment has no patient".to_string()))?;

        let contact = self
            .stores
            .contacts
            .get_contact(patient_id)
            .await?
            .ok_or_else(|| ReminderError::NotFound("patient".to_string()))?;

        Ok((appointment, contact))
    }

    /// Takes a record out of the retry set for good.
    async fn exhaust(&self, record: &NotificationRecord, reason: &str) -> RetryOutcome {
        info!(
            "Giving up on {} reminder for {}: {}",
            record.message_type, record.appointment_id, reason
        );

        let exhausted = NotificationRecord {
            status: NotificationStatus::Failed,
            attempts: record.attempts.max(self.max_attempts),
            error_message: Some(reason.to_string()),
            ..record.clone()
        };
        if let Err(e) = self.stores.notifications.upsert_notification(&exhausted).await {
            error!("Failed to mark reminder {} exhausted: {}", record.appointment_id, e);
            return RetryOutcome::Failed;
        }
        RetryOutcome::Exhausted
    }
}
