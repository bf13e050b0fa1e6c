#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use reminder_cell::{
    MessagingProvider, NotificationDispatcher, ProviderError, ReminderSettings, ReminderStores,
    ReminderWindowScheduler, RetryCoordinator, SchedulerStats, SendReceipt, TemplateParams,
};
use shared_database::{InMemoryStore, NotificationStore};
use shared_models::{MessageType, MessagingConfig, NotificationRecord, NotificationStatus};
use shared_utils::test_utils::{seeded_store, TestConfig};

pub const PATIENT_PHONE: &str = "5215512345678";

/// Provider double that records every send and answers from a script.
#[derive(Default)]
pub struct ScriptedProvider {
    sent: Mutex<Vec<(String, TemplateParams)>>,
    counter: AtomicUsize,
    fail_with: Option<ProviderError>,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    pub fn accepting() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail_with: Some(ProviderError::Api {
                status: 400,
                code: Some(131026),
                message: "Message undeliverable".to_string(),
            }),
            ..Self::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.counter.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<(String, TemplateParams)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessagingProvider for ScriptedProvider {
    async fn send_template_message(
        &self,
        _config: &MessagingConfig,
        to: &str,
        params: &TemplateParams,
    ) -> Result<SendReceipt, ProviderError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.sent.lock().unwrap().push((to.to_string(), params.clone()));

        match &self.fail_with {
            Some(err) => Err(err.clone()),
            None => Ok(SendReceipt {
                provider_message_id: format!("wamid.{}", n),
            }),
        }
    }
}

pub fn test_settings() -> ReminderSettings {
    ReminderSettings::from_config(&TestConfig::default().to_app_config())
}

pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub provider: Arc<ScriptedProvider>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub retry: Arc<RetryCoordinator>,
    pub scheduler: Arc<ReminderWindowScheduler>,
    pub stats: Arc<SchedulerStats>,
    pub settings: ReminderSettings,
}

pub async fn harness(provider: ScriptedProvider, settings: ReminderSettings) -> Harness {
    let store = seeded_store().await;
    let provider = Arc::new(provider);
    let stores = ReminderStores::from_store(store.clone());

    let dispatcher = Arc::new(NotificationDispatcher::new(
        provider.clone(),
        stores.notifications.clone(),
        settings.clinic_offset,
    ));
    let retry = Arc::new(RetryCoordinator::new(stores.clone(), dispatcher.clone(), &settings));
    let stats = Arc::new(SchedulerStats::default());
    let scheduler = Arc::new(ReminderWindowScheduler::new(
        stores,
        dispatcher.clone(),
        retry.clone(),
        settings.clone(),
        stats.clone(),
    ));

    Harness {
        store,
        provider,
        dispatcher,
        retry,
        scheduler,
        stats,
        settings,
    }
}

/// Stores a record as if an earlier attempt had ended with `status`.
pub async fn seed_record(
    store: &InMemoryStore,
    appointment_id: Uuid,
    message_type: MessageType,
    status: NotificationStatus,
    attempts: u32,
    sent_at: DateTime<Utc>,
) -> NotificationRecord {
    let record = NotificationRecord {
        appointment_id,
        message_type,
        patient_id: None,
        phone_number: Some(format!("+{}", PATIENT_PHONE)),
        provider_message_id: match status {
            NotificationStatus::Failed => None,
            _ => Some(format!("wamid.seed.{}", appointment_id.simple())),
        },
        error_message: match status {
            NotificationStatus::Failed => Some("provider unavailable".to_string()),
            _ => None,
        },
        status,
        attempts,
        sent_at,
        delivered_at: None,
        read_at: None,
    };
    store.upsert_notification(&record).await.unwrap()
}
