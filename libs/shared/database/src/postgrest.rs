use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::{
    Appointment, BusinessHourInterval, Contact, MessagingConfig, MessagingConfigUpdate,
    NotificationRecord, NotificationStatus,
};

use crate::store::{
    AppointmentStore, BusinessHoursStore, ContactStore, MessagingConfigStore, NotificationStore,
    StoreError, StoreResult,
};
use crate::supabase::{merge_duplicates, return_representation, SupabaseClient};

const APPOINTMENT_COLUMNS: &str = "id,patient_id,patient_name,start_time,duration_minutes";

/// Storage backed by Supabase tables through PostgREST.
///
/// The appointments table carries a generated `end_time` column so overlap
/// can be filtered server-side. Closing the gap between validating and
/// inserting an appointment is left to an exclusion constraint on that table.
pub struct SupabaseStore {
    supabase: SupabaseClient,
}

#[derive(Debug, Deserialize)]
struct HoursRow {
    start_time: Option<NaiveTime>,
    end_time: Option<NaiveTime>,
}

#[derive(Debug, Deserialize)]
struct ConfigIdRow {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct PatientRow {
    id: Uuid,
    name: String,
    phone: Option<String>,
}

impl SupabaseStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub fn from_client(supabase: SupabaseClient) -> Self {
        Self { supabase }
    }

    async fn fetch_hours(&self, path: &str) -> StoreResult<Vec<HoursRow>> {
        let rows: Vec<HoursRow> = self.supabase.request(Method::GET, path, None).await?;
        Ok(rows)
    }

    async fn find_by_provider_id(&self, provider_message_id: &str) -> StoreResult<Option<NotificationRecord>> {
        let path = format!(
            "/rest/v1/whatsapp_notifications?whatsapp_msg_id=eq.{}&limit=1",
            urlencoding::encode(provider_message_id)
        );
        let rows: Vec<NotificationRecord> = self.supabase.request(Method::GET, &path, None).await?;
        Ok(rows.into_iter().next())
    }

    async fn patch_notifications(&self, filter: &str, body: Value) -> StoreResult<usize> {
        let path = format!("/rest/v1/whatsapp_notifications?{}", filter);
        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(Method::PATCH, &path, Some(body), Some(return_representation()))
            .await?;
        Ok(rows.len())
    }
}

fn encode_instant(instant: DateTime<Utc>) -> String {
    urlencoding::encode(&instant.to_rfc3339()).into_owned()
}

fn intervals_from_rows(rows: Vec<HoursRow>) -> Vec<BusinessHourInterval> {
    rows.into_iter()
        .filter_map(|row| match (row.start_time, row.end_time) {
            (Some(start), Some(end)) => Some(BusinessHourInterval::new(start, end)),
            _ => None,
        })
        .collect()
}

#[async_trait]
impl AppointmentStore for SupabaseStore {
    async fn list_appointments_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<Appointment>> {
        let path = format!(
            "/rest/v1/appointments?select={}&start_time=gte.{}&start_time=lt.{}&order=start_time.asc",
            APPOINTMENT_COLUMNS,
            encode_instant(start),
            encode_instant(end),
        );

        let appointments: Vec<Appointment> = self.supabase.request(Method::GET, &path, None).await?;
        debug!("Found {} appointments between {} and {}", appointments.len(), start, end);
        Ok(appointments)
    }

    async fn has_overlapping_appointment(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_id: Option<Uuid>,
    ) -> StoreResult<bool> {
        let mut path = format!(
            "/rest/v1/appointments?select=id&start_time=lt.{}&end_time=gt.{}",
            encode_instant(end),
            encode_instant(start),
        );
        if let Some(id) = exclude_id {
            path.push_str(&format!("&id=neq.{}", id));
        }
        path.push_str("&limit=1");

        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, None).await?;
        Ok(!rows.is_empty())
    }

    async fn get_appointment(&self, id: Uuid) -> StoreResult<Option<Appointment>> {
        let path = format!("/rest/v1/appointments?select={}&id=eq.{}", APPOINTMENT_COLUMNS, id);
        let rows: Vec<Appointment> = self.supabase.request(Method::GET, &path, None).await?;
        Ok(rows.into_iter().next())
    }
}

#[async_trait]
impl BusinessHoursStore for SupabaseStore {
    async fn get_business_hours_override(
        &self,
        date: NaiveDate,
    ) -> StoreResult<Option<Vec<BusinessHourInterval>>> {
        let path = format!(
            "/rest/v1/business_hour_overrides?select=start_time,end_time&date=eq.{}&order=start_time.asc",
            date.format("%Y-%m-%d")
        );
        let rows = self.fetch_hours(&path).await?;

        if rows.is_empty() {
            return Ok(None);
        }

        // A row without times marks the whole date closed.
        Ok(Some(intervals_from_rows(rows)))
    }

    async fn get_weekly_business_hours(
        &self,
        iso_weekday: u32,
    ) -> StoreResult<Vec<BusinessHourInterval>> {
        let path = format!(
            "/rest/v1/business_hours?select=start_time,end_time&weekday=eq.{}&order=start_time.asc",
            iso_weekday
        );
        let rows = self.fetch_hours(&path).await?;
        Ok(intervals_from_rows(rows))
    }
}

#[async_trait]
impl NotificationStore for SupabaseStore {
    async fn upsert_notification(&self, record: &NotificationRecord) -> StoreResult<NotificationRecord> {
        let mut body = serde_json::to_value(record)?;
        if let Value::Object(ref mut map) = body {
            // Callback timestamps are owned by apply_delivery_status.
            map.remove("delivered_at");
            map.remove("read_at");
        }

        let rows: Vec<NotificationRecord> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/whatsapp_notifications?on_conflict=appointment_id,message_type",
                Some(body),
                Some(merge_duplicates()),
            )
            .await?;

        rows.into_iter().next().ok_or_else(|| {
            StoreError::Request(format!(
                "upsert of notification {}/{} returned no row",
                record.appointment_id, record.message_type
            ))
        })
    }

    async fn get_notifications_by_appointment(
        &self,
        appointment_id: Uuid,
    ) -> StoreResult<Vec<NotificationRecord>> {
        let path = format!(
            "/rest/v1/whatsapp_notifications?appointment_id=eq.{}&order=sent_at.desc",
            appointment_id
        );
        let records: Vec<NotificationRecord> = self.supabase.request(Method::GET, &path, None).await?;
        Ok(records)
    }

    async fn get_pending_notifications(
        &self,
        limit: usize,
        max_attempts: u32,
        failed_before: DateTime<Utc>,
    ) -> StoreResult<Vec<NotificationRecord>> {
        let path = format!(
            "/rest/v1/whatsapp_notifications?status=eq.failed&attempts=lt.{}&sent_at=lt.{}&order=sent_at.asc&limit={}",
            max_attempts,
            encode_instant(failed_before),
            limit
        );
        let records: Vec<NotificationRecord> = self.supabase.request(Method::GET, &path, None).await?;
        Ok(records)
    }

    async fn apply_delivery_status(
        &self,
        provider_message_id: &str,
        status: &NotificationStatus,
        delivered_at: Option<DateTime<Utc>>,
        read_at: Option<DateTime<Utc>>,
    ) -> StoreResult<Option<NotificationRecord>> {
        let id_filter = format!("whatsapp_msg_id=eq.{}", urlencoding::encode(provider_message_id));

        let superseding: Vec<String> = status
            .superseding_statuses()
            .iter()
            .map(|s| s.as_str().to_string())
            .collect();
        let status_filter = if superseding.is_empty() {
            id_filter.clone()
        } else {
            format!("{}&status=not.in.({})", id_filter, superseding.join(","))
        };
        let updated = self
            .patch_notifications(&status_filter, json!({ "status": status.as_str() }))
            .await?;
        if updated == 0 {
            debug!("Status {} not applied to message {}", status, provider_message_id);
        }

        if let Some(at) = delivered_at {
            self.patch_notifications(
                &format!("{}&delivered_at=is.null", id_filter),
                json!({ "delivered_at": at }),
            )
            .await?;
        }

        if let Some(at) = read_at {
            self.patch_notifications(
                &format!("{}&read_at=is.null", id_filter),
                json!({ "read_at": at }),
            )
            .await?;
        }

        self.find_by_provider_id(provider_message_id).await
    }
}

#[async_trait]
impl ContactStore for SupabaseStore {
    async fn get_contact(&self, patient_id: Uuid) -> StoreResult<Option<Contact>> {
        let path = format!("/rest/v1/patients?select=id,name,phone&id=eq.{}", patient_id);
        let rows: Vec<PatientRow> = self.supabase.request(Method::GET, &path, None).await?;

        Ok(rows.into_iter().next().map(|row| Contact {
            patient_id: row.id,
            name: row.name,
            phone: row.phone.filter(|phone| !phone.trim().is_empty()),
        }))
    }
}

#[async_trait]
impl MessagingConfigStore for SupabaseStore {
    async fn get_messaging_config(&self) -> StoreResult<MessagingConfig> {
        let rows: Vec<MessagingConfig> = self
            .supabase
            .request(Method::GET, "/rest/v1/whatsapp_config?order=id.desc&limit=1", None)
            .await?;

        rows.into_iter().next().ok_or_else(|| {
            warn!("No WhatsApp configuration row found");
            StoreError::NotFound("whatsapp_config".to_string())
        })
    }

    async fn update_messaging_config(
        &self,
        update: &MessagingConfigUpdate,
    ) -> StoreResult<MessagingConfig> {
        let ids: Vec<ConfigIdRow> = self
            .supabase
            .request(Method::GET, "/rest/v1/whatsapp_config?select=id&order=id.desc&limit=1", None)
            .await?;
        let id = ids
            .first()
            .map(|row| row.id)
            .ok_or_else(|| StoreError::NotFound("whatsapp_config".to_string()))?;

        let update = update.without_empty_tokens();
        if update.is_empty() {
            return self.get_messaging_config().await;
        }

        let path = format!("/rest/v1/whatsapp_config?id=eq.{}", id);
        let rows: Vec<MessagingConfig> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(serde_json::to_value(&update)?),
                Some(return_representation()),
            )
            .await?;

        debug!("Updated WhatsApp configuration row {}", id);
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(format!("whatsapp_config {}", id)))
    }
}
