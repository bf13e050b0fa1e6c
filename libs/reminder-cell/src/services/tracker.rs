use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use shared_database::NotificationStore;
use shared_models::NotificationStatus;

use crate::error::ReminderError;
use crate::models::{ApplyOutcome, ApplyReport, WebhookEvent, WebhookPayload, WebhookStatusEvent};

/// Applies provider delivery callbacks to notification records.
///
/// Events may arrive duplicated or out of order. The store applies each one
/// conditionally, so `delivered_at` and `read_at` are written at most once
/// and the status only moves forward.
pub struct DeliveryStatusTracker {
    notifications: Arc<dyn NotificationStore>,
}

impl DeliveryStatusTracker {
    pub fn new(notifications: Arc<dyn NotificationStore>) -> Self {
        Self { notifications }
    }

    pub async fn apply(&self, event: &WebhookStatusEvent) -> Result<ApplyOutcome, ReminderError> {
        let (delivered_at, read_at) = match event.status {
            NotificationStatus::Delivered => (Some(event.timestamp), None),
            NotificationStatus::Read => (None, Some(event.timestamp)),
            _ => (None, None),
        };

        let updated = self
            .notifications
            .apply_delivery_status(&event.provider_message_id, &event.status, delivered_at, read_at)
            .await?;

        match updated {
            Some(record) => {
                debug!(
                    "Message {} is now {} (event said {})",
                    event.provider_message_id, record.status, event.status
                );
                Ok(ApplyOutcome::Applied(record))
            }
            None => {
                warn!(
                    "Dropping {} status for unknown message {}",
                    event.status, event.provider_message_id
                );
                Ok(ApplyOutcome::UnknownMessage)
            }
        }
    }

    /// Applies every status in the payload independently, in payload order.
    /// A failing event is counted and does not stop the rest.
    pub async fn apply_payload(&self, payload: &WebhookPayload) -> ApplyReport {
        let mut report = ApplyReport::default();

        for event in payload.events(Utc::now()) {
            match event {
                WebhookEvent::Status(status_event) => match self.apply(&status_event).await {
                    Ok(ApplyOutcome::Applied(_)) => report.applied += 1,
                    Ok(ApplyOutcome::UnknownMessage) => report.unknown += 1,
                    Err(e) => {
                        error!(
                            "Failed to apply {} status for {}: {}",
                            status_event.status, status_event.provider_message_id, e
                        );
                        report.failed += 1;
                    }
                },
                WebhookEvent::InboundMessage { message_id, from } => {
                    debug!("Ignoring inbound message {} from {}", message_id, from);
                    report.ignored += 1;
                }
            }
        }

        info!(
            "Webhook processed: {} applied, {} unknown, {} failed",
            report.applied, report.unknown, report.failed
        );
        report
    }
}
