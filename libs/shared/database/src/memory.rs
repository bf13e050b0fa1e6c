use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use shared_models::{
    Appointment, BusinessHourInterval, Contact, MessageType, MessagingConfig,
    MessagingConfigUpdate, NotificationRecord, NotificationStatus,
};

use crate::store::{
    AppointmentStore, BusinessHoursStore, ContactStore, MessagingConfigStore, NotificationStore,
    StoreError, StoreResult,
};

#[derive(Default)]
struct MemoryState {
    appointments: HashMap<Uuid, Appointment>,
    contacts: HashMap<Uuid, Contact>,
    weekly_hours: HashMap<u32, Vec<BusinessHourInterval>>,
    overrides: HashMap<NaiveDate, Vec<BusinessHourInterval>>,
    notifications: HashMap<(Uuid, MessageType), NotificationRecord>,
    messaging_config: Option<MessagingConfig>,
}

/// Process-local storage used for development runs and tests. All writes
/// happen under one lock, which gives the same per-key atomicity the
/// database provides.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<MemoryState>,
    unavailable: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every call fail with a request error until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Request("in-memory store marked unavailable".to_string()));
        }
        Ok(())
    }

    pub async fn insert_appointment(&self, appointment: Appointment) {
        self.state.write().await.appointments.insert(appointment.id, appointment);
    }

    pub async fn remove_appointment(&self, id: Uuid) {
        self.state.write().await.appointments.remove(&id);
    }

    pub async fn insert_contact(&self, contact: Contact) {
        self.state.write().await.contacts.insert(contact.patient_id, contact);
    }

    pub async fn set_weekly_hours(&self, iso_weekday: u32, intervals: Vec<BusinessHourInterval>) {
        self.state.write().await.weekly_hours.insert(iso_weekday, intervals);
    }

    /// An empty `intervals` list closes the date.
    pub async fn set_date_override(&self, date: NaiveDate, intervals: Vec<BusinessHourInterval>) {
        self.state.write().await.overrides.insert(date, intervals);
    }

    pub async fn set_messaging_config(&self, config: MessagingConfig) {
        self.state.write().await.messaging_config = Some(config);
    }

    pub async fn notifications(&self) -> Vec<NotificationRecord> {
        let mut records: Vec<NotificationRecord> =
            self.state.read().await.notifications.values().cloned().collect();
        records.sort_by_key(|record| (record.sent_at, record.appointment_id));
        records
    }

    pub async fn notification(
        &self,
        appointment_id: Uuid,
        message_type: MessageType,
    ) -> Option<NotificationRecord> {
        self.state
            .read()
            .await
            .notifications
            .get(&(appointment_id, message_type))
            .cloned()
    }
}

#[async_trait]
impl AppointmentStore for InMemoryStore {
    async fn list_appointments_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<Appointment>> {
        self.check_available()?;
        let state = self.state.read().await;

        let mut appointments: Vec<Appointment> = state
            .appointments
            .values()
            .filter(|appointment| appointment.start_time >= start && appointment.start_time < end)
            .cloned()
            .collect();
        appointments.sort_by_key(|appointment| appointment.start_time);
        Ok(appointments)
    }

    async fn has_overlapping_appointment(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_id: Option<Uuid>,
    ) -> StoreResult<bool> {
        self.check_available()?;
        let state = self.state.read().await;

        Ok(state
            .appointments
            .values()
            .filter(|appointment| Some(appointment.id) != exclude_id)
            .any(|appointment| appointment.overlaps(start, end)))
    }

    async fn get_appointment(&self, id: Uuid) -> StoreResult<Option<Appointment>> {
        self.check_available()?;
        Ok(self.state.read().await.appointments.get(&id).cloned())
    }
}

#[async_trait]
impl BusinessHoursStore for InMemoryStore {
    async fn get_business_hours_override(
        &self,
        date: NaiveDate,
    ) -> StoreResult<Option<Vec<BusinessHourInterval>>> {
        self.check_available()?;
        Ok(self.state.read().await.overrides.get(&date).cloned())
    }

    async fn get_weekly_business_hours(
        &self,
        iso_weekday: u32,
    ) -> StoreResult<Vec<BusinessHourInterval>> {
        self.check_available()?;
        Ok(self
            .state
            .read()
            .await
            .weekly_hours
            .get(&iso_weekday)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl NotificationStore for InMemoryStore {
    async fn upsert_notification(&self, record: &NotificationRecord) -> StoreResult<NotificationRecord> {
        self.check_available()?;
        let mut state = self.state.write().await;

        let stored = state
            .notifications
            .entry(record.key())
            .and_modify(|existing| {
                let delivered_at = existing.delivered_at;
                let read_at = existing.read_at;
                *existing = record.clone();
                existing.delivered_at = delivered_at;
                existing.read_at = read_at;
            })
            .or_insert_with(|| NotificationRecord {
                delivered_at: None,
                read_at: None,
                ..record.clone()
            });

        Ok(stored.clone())
    }

    async fn get_notifications_by_appointment(
        &self,
        appointment_id: Uuid,
    ) -> StoreResult<Vec<NotificationRecord>> {
        self.check_available()?;
        let state = self.state.read().await;

        let mut records: Vec<NotificationRecord> = state
            .notifications
            .values()
            .filter(|record| record.appointment_id == appointment_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.sent_at.cmp(&a.sent_at));
        Ok(records)
    }

    async fn get_pending_notifications(
        &self,
        limit: usize,
        max_attempts: u32,
        failed_before: DateTime<Utc>,
    ) -> StoreResult<Vec<NotificationRecord>> {
        self.check_available()?;
        let state = self.state.read().await;

        let mut records: Vec<NotificationRecord> = state
            .notifications
            .values()
            .filter(|record| record.is_retryable(max_attempts) && record.sent_at < failed_before)
            .cloned()
            .collect();
        records.sort_by_key(|record| record.sent_at);
        records.truncate(limit);
        Ok(records)
    }

    async fn apply_delivery_status(
        &self,
        provider_message_id: &str,
        status: &NotificationStatus,
        delivered_at: Option<DateTime<Utc>>,
        read_at: Option<DateTime<Utc>>,
    ) -> StoreResult<Option<NotificationRecord>> {
        self.check_available()?;
        let mut state = self.state.write().await;

        let Some(record) = state
            .notifications
            .values_mut()
            .find(|record| record.provider_message_id.as_deref() == Some(provider_message_id))
        else {
            return Ok(None);
        };

        if record.status.can_advance_to(status) {
            record.status = status.clone();
        }
        if record.delivered_at.is_none() {
            record.delivered_at = delivered_at;
        }
        if record.read_at.is_none() {
            record.read_at = read_at;
        }

        Ok(Some(record.clone()))
    }
}

#[async_trait]
impl ContactStore for InMemoryStore {
    async fn get_contact(&self, patient_id: Uuid) -> StoreResult<Option<Contact>> {
        self.check_available()?;
        Ok(self.state.read().await.contacts.get(&patient_id).cloned())
    }
}

#[async_trait]
impl MessagingConfigStore for InMemoryStore {
    async fn get_messaging_config(&self) -> StoreResult<MessagingConfig> {
        self.check_available()?;
        self.state
            .read()
            .await
            .messaging_config
            .clone()
            .ok_or_else(|| StoreError::NotFound("whatsapp_config".to_string()))
    }

    async fn update_messaging_config(
        &self,
        update: &MessagingConfigUpdate,
    ) -> StoreResult<MessagingConfig> {
        self.check_available()?;
        let mut state = self.state.write().await;
        let config = state
            .messaging_config
            .as_mut()
            .ok_or_else(|| StoreError::NotFound("whatsapp_config".to_string()))?;
        update.apply_to(config);
        Ok(config.clone())
    }
}
