use std::sync::Arc;

use chrono::{FixedOffset, Utc};
use tracing::{error, info, instrument, warn};

use shared_database::{
    AppointmentStore, ClinicStore, ContactStore, MessagingConfigStore, NotificationStore,
};
use shared_models::{Appointment, Contact, MessageType, MessagingConfig, NotificationRecord, NotificationStatus};
use shared_utils::normalize_phone;

use crate::error::ReminderError;
use crate::models::TemplateParams;
use crate::services::whatsapp::MessagingProvider;

/// The storage views the reminder pipeline works through.
#[derive(Clone)]
pub struct ReminderStores {
    pub appointments: Arc<dyn AppointmentStore>,
    pub notifications: Arc<dyn NotificationStore>,
    pub contacts: Arc<dyn ContactStore>,
    pub messaging_config: Arc<dyn MessagingConfigStore>,
}

impl ReminderStores {
    pub fn from_store<S: ClinicStore + 'static>(store: Arc<S>) -> Self {
        Self {
            appointments: store.clone(),
            notifications: store.clone(),
            contacts: store.clone(),
            messaging_config: store,
        }
    }
}

/// Renders and sends one reminder, then records the attempt under the
/// `(appointment_id, message_type)` key. A repeated send for the same key
/// overwrites the earlier attempt instead of adding a row.
pub struct NotificationDispatcher {
    provider: Arc<dyn MessagingProvider>,
    notifications: Arc<dyn NotificationStore>,
    clinic_offset: FixedOffset,
}

impl NotificationDispatcher {
    pub fn new(
        provider: Arc<dyn MessagingProvider>,
        notifications: Arc<dyn NotificationStore>,
        clinic_offset: FixedOffset,
    ) -> Self {
        Self {
            provider,
            notifications,
            clinic_offset,
        }
    }

    #[instrument(skip(self, config, appointment, contact), fields(appointment_id = %appointment.id))]
    pub async fn send(
        &self,
        config: &MessagingConfig,
        appointment: &Appointment,
        contact: &Contact,
        message_type: MessageType,
    ) -> Result<NotificationRecord, ReminderError> {
        if !config.is_sending_enabled() {
            return Err(ReminderError::Config(
                "WhatsApp reminders are not enabled".to_string(),
            ));
        }

        let phone = normalize_phone(contact.phone.as_deref().unwrap_or_default()).map_err(|e| {
            ReminderError::Validation(format!("patient {}: {}", contact.patient_id, e))
        })?;

        let params = TemplateParams::render(&contact.name, appointment.start_time, self.clinic_offset);
        let attempts = self.previous_attempts(appointment, message_type).await + 1;

        let mut record = NotificationRecord {
            appointment_id: appointment.id,
            message_type,
            patient_id: Some(contact.patient_id),
            phone_number: Some(phone.clone()),
            status: NotificationStatus::Pending,
            provider_message_id: None,
            error_message: None,
            attempts,
            sent_at: Utc::now(),
            delivered_at: None,
            read_at: None,
        };

        match self.provider.send_template_message(config, &phone, &params).await {
            Ok(receipt) => {
                record.status = NotificationStatus::Sent;
                record.provider_message_id = Some(receipt.provider_message_id);
                info!("Sent {} reminder (attempt {})", message_type, attempts);

                match self.notifications.upsert_notification(&record).await {
                    Ok(stored) => Ok(stored),
                    Err(e) => {
                        // The message is out; only the bookkeeping failed.
                        error!("Failed to record sent {} reminder: {}", message_type, e);
                        Ok(record)
                    }
                }
            }
            Err(provider_error) => {
                warn!("{} reminder failed (attempt {}): {}", message_type, attempts, provider_error);
                record.status = NotificationStatus::Failed;
                record.error_message = Some(provider_error.to_string());

                if let Err(e) = self.notifications.upsert_notification(&record).await {
                    error!("Failed to record failed {} reminder: {}", message_type, e);
                }
                Err(ReminderError::Provider(provider_error))
            }
        }
    }

    async fn previous_attempts(&self, appointment: &Appointment, message_type: MessageType) -> u32 {
        match self.notifications.get_notifications_by_appointment(appointment.id).await {
            Ok(records) => records
                .iter()
                .find(|record| record.message_type == message_type)
                .map(|record| record.attempts)
                .unwrap_or(0),
            Err(e) => {
                warn!("Could not read prior attempts for {}: {}", appointment.id, e);
                0
            }
        }
    }
}
