use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use shared_config::AppConfig;
use shared_models::{NotificationRecord, NotificationStatus};

// ==============================================================================
// SCHEDULER SETTINGS
// ==============================================================================

#[derive(Debug, Clone)]
pub struct ReminderSettings {
    pub check_interval: StdDuration,
    pub tick_timeout: StdDuration,
    pub retry_batch_size: usize,
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub dispatch_concurrency: usize,
    pub clinic_offset: FixedOffset,
}

impl ReminderSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            check_interval: StdDuration::from_secs(config.reminder_check_interval_seconds.max(1)),
            tick_timeout: StdDuration::from_secs(config.reminder_tick_timeout_seconds.max(1)),
            retry_batch_size: config.reminder_retry_batch_size,
            max_attempts: config.reminder_max_attempts.max(1),
            retry_delay: Duration::seconds(config.reminder_retry_delay_seconds as i64),
            dispatch_concurrency: config.reminder_dispatch_concurrency.max(1),
            clinic_offset: config.clinic_utc_offset,
        }
    }
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

// ==============================================================================
// TEMPLATE RENDERING
// ==============================================================================

/// Body parameters of the reminder template, in template order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateParams {
    pub patient_name: String,
    /// `dd/mm/YYYY` in the clinic's offset.
    pub appointment_date: String,
    /// `HH:MM` in the clinic's offset.
    pub appointment_time: String,
}

impl TemplateParams {
    pub fn render(patient_name: &str, start_time: DateTime<Utc>, clinic_offset: FixedOffset) -> Self {
        let local = start_time.with_timezone(&clinic_offset);
        Self {
            patient_name: patient_name.to_string(),
            appointment_date: local.format("%d/%m/%Y").to_string(),
            appointment_time: local.format("%H:%M").to_string(),
        }
    }

    pub fn as_list(&self) -> [&str; 3] {
        [
            self.patient_name.as_str(),
            self.appointment_date.as_str(),
            self.appointment_time.as_str(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    pub provider_message_id: String,
}

// ==============================================================================
// WHATSAPP CLOUD API WIRE TYPES
// ==============================================================================

#[derive(Debug, Serialize)]
pub struct TemplateMessageRequest<'a> {
    pub messaging_product: &'static str,
    pub recipient_type: &'static str,
    pub to: &'a str,
    #[serde(rename = "type")]
    pub message_type: &'static str,
    pub template: TemplateBody<'a>,
}

#[derive(Debug, Serialize)]
pub struct TemplateBody<'a> {
    pub name: &'a str,
    pub language: TemplateLanguage<'a>,
    pub components: Vec<TemplateComponent<'a>>,
}

#[derive(Debug, Serialize)]
pub struct TemplateLanguage<'a> {
    pub code: &'a str,
}

#[derive(Debug, Serialize)]
pub struct TemplateComponent<'a> {
    #[serde(rename = "type")]
    pub component_type: &'static str,
    pub parameters: Vec<TemplateParameter<'a>>,
}

#[derive(Debug, Serialize)]
pub struct TemplateParameter<'a> {
    #[serde(rename = "type")]
    pub parameter_type: &'static str,
    pub text: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageResponse {
    #[serde(default)]
    pub messages: Vec<SentMessage>,
}

#[derive(Debug, Deserialize)]
pub struct SentMessage {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct GraphErrorResponse {
    pub error: GraphError,
}

#[derive(Debug, Deserialize)]
pub struct GraphError {
    pub message: String,
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub error_subcode: Option<i64>,
    #[serde(default)]
    pub fbtrace_id: Option<String>,
}

// ==============================================================================
// WEBHOOK PAYLOAD
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct WebhookVerifyQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookChange {
    #[serde(default)]
    pub field: Option<String>,
    pub value: WebhookValue,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookValue {
    #[serde(default)]
    pub statuses: Vec<RawStatus>,
    #[serde(default)]
    pub messages: Vec<RawInboundMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawStatus {
    pub id: String,
    pub status: String,
    pub timestamp: String,
    #[serde(default)]
    pub recipient_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawInboundMessage {
    pub id: String,
    #[serde(default)]
    pub from: String,
}

/// One provider callback about a message this service sent.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookStatusEvent {
    pub provider_message_id: String,
    pub status: NotificationStatus,
    pub timestamp: DateTime<Utc>,
    pub recipient_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WebhookEvent {
    Status(WebhookStatusEvent),
    /// A patient wrote to the clinic number. Not acted on.
    InboundMessage { message_id: String, from: String },
}

impl WebhookPayload {
    /// Flattens the nested payload into events, preserving payload order.
    /// A status whose timestamp cannot be read is stamped with `received_at`.
    pub fn events(&self, received_at: DateTime<Utc>) -> Vec<WebhookEvent> {
        let mut events = Vec::new();

        for change in self.entry.iter().flat_map(|entry| entry.changes.iter()) {
            for status in &change.value.statuses {
                let timestamp = parse_unix_timestamp(&status.timestamp).unwrap_or_else(|| {
                    warn!(
                        "Status for message {} has unreadable timestamp '{}'",
                        status.id, status.timestamp
                    );
                    received_at
                });

                events.push(WebhookEvent::Status(WebhookStatusEvent {
                    provider_message_id: status.id.clone(),
                    status: NotificationStatus::from(status.status.clone()),
                    timestamp,
                    recipient_id: status.recipient_id.clone(),
                }));
            }

            for message in &change.value.messages {
                events.push(WebhookEvent::InboundMessage {
                    message_id: message.id.clone(),
                    from: message.from.clone(),
                });
            }
        }

        events
    }
}

fn parse_unix_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let seconds: i64 = raw.trim().parse().ok()?;
    Utc.timestamp_opt(seconds, 0).single()
}

// ==============================================================================
// REPORTS
// ==============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TickReport {
    /// Messaging was inactive or reminders were switched off.
    pub disabled: bool,
    pub windows_scanned: usize,
    pub window_errors: usize,
    pub candidates: usize,
    pub sent: usize,
    pub skipped: usize,
    pub failed: usize,
    pub retry: RetryReport,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetryReport {
    pub selected: usize,
    pub sent: usize,
    pub failed: usize,
    pub exhausted: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    Applied(NotificationRecord),
    UnknownMessage,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ApplyReport {
    pub applied: usize,
    pub unknown: usize,
    pub failed: usize,
    pub ignored: usize,
}
