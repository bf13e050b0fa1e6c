use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use uuid::Uuid;

use shared_models::{
    Appointment, BusinessHourInterval, Contact, MessagingConfig, MessagingConfigUpdate,
    NotificationRecord, NotificationStatus,
};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage request failed: {0}")]
    Request(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Could not decode stored row: {0}")]
    Decode(String),
}

impl From<anyhow::Error> for StoreError {
    fn from(err: anyhow::Error) -> Self {
        StoreError::Request(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Decode(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Appointments whose start falls in `[start, end)`.
    async fn list_appointments_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<Appointment>>;

    async fn has_overlapping_appointment(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_id: Option<Uuid>,
    ) -> StoreResult<bool>;

    async fn get_appointment(&self, id: Uuid) -> StoreResult<Option<Appointment>>;
}

#[async_trait]
pub trait BusinessHoursStore: Send + Sync {
    /// `Some` when the date has its own schedule, even an empty one.
    async fn get_business_hours_override(
        &self,
        date: NaiveDate,
    ) -> StoreResult<Option<Vec<BusinessHourInterval>>>;

    /// Recurring hours for an ISO weekday (Monday = 1 .. Sunday = 7).
    async fn get_weekly_business_hours(&self, iso_weekday: u32)
        -> StoreResult<Vec<BusinessHourInterval>>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Insert or overwrite the record for `(appointment_id, message_type)`.
    /// Existing `delivered_at` / `read_at` values are kept.
    async fn upsert_notification(&self, record: &NotificationRecord) -> StoreResult<NotificationRecord>;

    async fn get_notifications_by_appointment(
        &self,
        appointment_id: Uuid,
    ) -> StoreResult<Vec<NotificationRecord>>;

    /// Failed records below `max_attempts` whose last attempt is older than
    /// `failed_before`, oldest first.
    async fn get_pending_notifications(
        &self,
        limit: usize,
        max_attempts: u32,
        failed_before: DateTime<Utc>,
    ) -> StoreResult<Vec<NotificationRecord>>;

    /// Applies a provider callback as a conditional update: the status only
    /// moves forward, and each timestamp is only written while still empty.
    /// Returns `None` when no record carries `provider_message_id`.
    async fn apply_delivery_status(
        &self,
        provider_message_id: &str,
        status: &NotificationStatus,
        delivered_at: Option<DateTime<Utc>>,
        read_at: Option<DateTime<Utc>>,
    ) -> StoreResult<Option<NotificationRecord>>;
}

#[async_trait]
pub trait ContactStore: Send + Sync {
    async fn get_contact(&self, patient_id: Uuid) -> StoreResult<Option<Contact>>;
}

#[async_trait]
pub trait MessagingConfigStore: Send + Sync {
    async fn get_messaging_config(&self) -> StoreResult<MessagingConfig>;

    /// Applies `update` to the active configuration and returns the result.
    async fn update_messaging_config(
        &self,
        update: &MessagingConfigUpdate,
    ) -> StoreResult<MessagingConfig>;
}

/// Everything the scheduling and reminder cells need from storage.
pub trait ClinicStore:
    AppointmentStore + BusinessHoursStore + NotificationStore + ContactStore + MessagingConfigStore
{
}

impl<T> ClinicStore for T where
    T: AppointmentStore + BusinessHoursStore + NotificationStore + ContactStore + MessagingConfigStore
{
}
