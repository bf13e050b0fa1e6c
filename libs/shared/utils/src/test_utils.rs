use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, Utc};
use serde_json::json;
use uuid::Uuid;

use shared_config::{AppConfig, StorageBackend};
use shared_database::InMemoryStore;
use shared_models::{Appointment, BusinessHourInterval, Contact, MessagingConfig};

pub struct TestConfig {
    pub whatsapp_api_base_url: String,
    pub whatsapp_app_secret: Option<String>,
    pub clinic_utc_offset: FixedOffset,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            whatsapp_api_base_url: "http://localhost:9090".to_string(),
            whatsapp_app_secret: None,
            clinic_utc_offset: FixedOffset::east_opt(0).unwrap(),
        }
    }
}

impl TestConfig {
    pub fn with_provider(base_url: &str) -> Self {
        Self {
            whatsapp_api_base_url: base_url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            storage_backend: StorageBackend::Memory,
            whatsapp_api_base_url: self.whatsapp_api_base_url.clone(),
            whatsapp_app_secret: self.whatsapp_app_secret.clone(),
            clinic_utc_offset: self.clinic_utc_offset,
            reminder_check_interval_seconds: 1,
            reminder_tick_timeout_seconds: 5,
            reminder_retry_delay_seconds: 0,
            ..AppConfig::default()
        }
    }
}

pub struct TestMessaging;

impl TestMessaging {
    /// Active configuration with every reminder kind switched on.
    pub fn config() -> MessagingConfig {
        MessagingConfig {
            phone_number_id: "109876543210".to_string(),
            access_token: "test-access-token".to_string(),
            business_account_id: "200000000000001".to_string(),
            webhook_verify_token: "test-verify-token".to_string(),
            is_active: true,
            reminder_enabled: true,
            reminder_3_days_before: true,
            reminder_1_day_before: true,
            reminder_2_hours_before: true,
            template_name_reminder: "appointment_reminder".to_string(),
            template_lang_code: "es_MX".to_string(),
        }
    }

    pub fn disabled() -> MessagingConfig {
        MessagingConfig {
            reminder_enabled: false,
            ..Self::config()
        }
    }
}

pub struct TestAppointment {
    appointment: Appointment,
}

impl TestAppointment {
    pub fn at(start_time: DateTime<Utc>) -> Self {
        Self {
            appointment: Appointment {
                id: Uuid::new_v4(),
                patient_id: None,
                patient_name: Some("Walk-in".to_string()),
                start_time,
                duration_minutes: 30,
            },
        }
    }

    pub fn in_from(now: DateTime<Utc>, lead: Duration) -> Self {
        Self::at(now + lead)
    }

    pub fn patient(mut self, patient_id: Uuid) -> Self {
        self.appointment.patient_id = Some(patient_id);
        self
    }

    pub fn minutes(mut self, duration_minutes: i64) -> Self {
        self.appointment.duration_minutes = duration_minutes;
        self
    }

    pub fn build(self) -> Appointment {
        self.appointment
    }
}

pub struct TestContact;

impl TestContact {
    pub fn with_phone(phone: &str) -> Contact {
        Contact {
            patient_id: Uuid::new_v4(),
            name: "Lucía Pérez".to_string(),
            phone: Some(phone.to_string()),
        }
    }

    pub fn without_phone() -> Contact {
        Contact {
            phone: None,
            ..Self::with_phone("")
        }
    }
}

pub fn hours(start: (u32, u32), end: (u32, u32)) -> BusinessHourInterval {
    BusinessHourInterval::new(
        NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
        NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
    )
}

/// Store open Monday to Friday 09:00-13:00 and 14:00-18:00, with the
/// default messaging configuration.
pub async fn seeded_store() -> Arc<InMemoryStore> {
    let store = Arc::new(InMemoryStore::new());
    for weekday in 1..=5 {
        store
            .set_weekly_hours(weekday, vec![hours((9, 0), (13, 0)), hours((14, 0), (18, 0))])
            .await;
    }
    store.set_messaging_config(TestMessaging::config()).await;
    store
}

pub struct MockWhatsAppResponses;

impl MockWhatsAppResponses {
    pub fn message_accepted(message_id: &str) -> serde_json::Value {
        json!({
            "messaging_product": "whatsapp",
            "contacts": [{ "input": "+5215512345678", "wa_id": "5215512345678" }],
            "messages": [{ "id": message_id }]
        })
    }

    pub fn error_response(message: &str, code: i64) -> serde_json::Value {
        json!({
            "error": {
                "message": message,
                "type": "OAuthException",
                "code": code,
                "error_subcode": 2494010,
                "fbtrace_id": "AbCdEfGh123"
            }
        })
    }

    pub fn status_webhook(message_id: &str, status: &str, timestamp: i64) -> serde_json::Value {
        json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "id": "200000000000001",
                "changes": [{
                    "field": "messages",
                    "value": {
                        "messaging_product": "whatsapp",
                        "metadata": { "phone_number_id": "109876543210" },
                        "statuses": [{
                            "id": message_id,
                            "status": status,
                            "timestamp": timestamp.to_string(),
                            "recipient_id": "5215512345678"
                        }]
                    }
                }]
            }]
        })
    }
}
