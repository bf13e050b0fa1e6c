mod common;

use chrono::{Duration, Utc};

use reminder_cell::ReminderSettings;
use shared_models::{MessageType, NotificationStatus};
use shared_utils::test_utils::{TestAppointment, TestContact, TestMessaging};

use common::{harness, seed_record, test_settings, ScriptedProvider, PATIENT_PHONE};

#[tokio::test]
async fn test_retry_resends_failed_reminder() {
    let h = harness(ScriptedProvider::accepting(), test_settings()).await;
    let contact = TestContact::with_phone(PATIENT_PHONE);
    let appointment = TestAppointment::in_from(Utc::now(), Duration::hours(20))
        .patient(contact.patient_id)
        .build();
    h.store.insert_contact(contact).await;
    h.store.insert_appointment(appointment.clone()).await;
    seed_record(
        &h.store,
        appointment.id,
        MessageType::OneDay,
        NotificationStatus::Failed,
        1,
        Utc::now() - Duration::minutes(30),
    )
    .await;

    let report = h
        .retry
        .retry_pending(&TestMessaging::config(), 10, Utc::now())
        .await
        .unwrap();

    assert_eq!(report.selected, 1);
    assert_eq!(report.sent, 1);

    let record = h.store.notification(appointment.id, MessageType::OneDay).await.unwrap();
    assert_eq!(record.status, NotificationStatus::Sent);
    assert_eq!(record.attempts, 2);
    assert!(record.error_message.is_none());
}

#[tokio::test]
async fn test_retry_respects_delay_and_budget() {
    let settings = ReminderSettings {
        retry_delay: Duration::minutes(15),
        ..test_settings()
    };
    let h = harness(ScriptedProvider::accepting(), settings).await;
    let now = Utc::now();

    let appointment = TestAppointment::in_from(now, Duration::hours(20)).build();
    // Too recent.
    seed_record(&h.store, appointment.id, MessageType::OneDay, NotificationStatus::Failed, 1, now - Duration::minutes(5)).await;
    // Out of attempts.
    seed_record(&h.store, appointment.id, MessageType::ThreeDays, NotificationStatus::Failed, 3, now - Duration::hours(2)).await;
    // Succeeded, never retried.
    seed_record(&h.store, appointment.id, MessageType::TwoHours, NotificationStatus::Sent, 1, now - Duration::hours(2)).await;

    let report = h
        .retry
        .retry_pending(&TestMessaging::config(), 10, now)
        .await
        .unwrap();

    assert_eq!(report.selected, 0);
    assert_eq!(h.provider.call_count(), 0);
}

#[tokio::test]
async fn test_retry_batch_is_limited() {
    let h = harness(ScriptedProvider::accepting(), test_settings()).await;
    let now = Utc::now();
    for _ in 0..5 {
        let appointment = TestAppointment::in_from(now, Duration::hours(20)).build();
        seed_record(&h.store, appointment.id, MessageType::OneDay, NotificationStatus::Failed, 1, now - Duration::hours(1)).await;
    }

    let report = h
        .retry
        .retry_pending(&TestMessaging::config(), 2, now)
        .await
        .unwrap();
    assert_eq!(report.selected, 2);

    let none = h
        .retry
        .retry_pending(&TestMessaging::config(), 0, now)
        .await
        .unwrap();
    assert_eq!(none.selected, 0);
}

#[tokio::test]
async fn test_missing_appointment_exhausts_record() {
    let h = harness(ScriptedProvider::accepting(), test_settings()).await;
    let now = Utc::now();
    let orphan = TestAppointment::in_from(now, Duration::hours(20)).build();
    seed_record(&h.store, orphan.id, MessageType::OneDay, NotificationStatus::Failed, 1, now - Duration::hours(1)).await;

    let report = h
        .retry
        .retry_pending(&TestMessaging::config(), 10, now)
        .await
        .unwrap();

    assert_eq!(report.exhausted, 1);
    assert_eq!(h.provider.call_count(), 0);

    let record = h.store.notification(orphan.id, MessageType::OneDay).await.unwrap();
    assert_eq!(record.status, NotificationStatus::Failed);
    assert_eq!(record.attempts, h.settings.max_attempts);
    assert_eq!(record.error_message.as_deref(), Some("appointment no longer exists"));

    let again = h
        .retry
        .retry_pending(&TestMessaging::config(), 10, now)
        .await
        .unwrap();
    assert_eq!(again.selected, 0);
}

#[tokio::test]
async fn test_started_appointment_exhausts_record() {
    let h = harness(ScriptedProvider::accepting(), test_settings()).await;
    let now = Utc::now();
    let contact = TestContact::with_phone(PATIENT_PHONE);
    let appointment = TestAppointment::at(now - Duration::minutes(10))
        .patient(contact.patient_id)
        .build();
    h.store.insert_contact(contact).await;
    h.store.insert_appointment(appointment.clone()).await;
    seed_record(&h.store, appointment.id, MessageType::TwoHours, NotificationStatus::Failed, 2, now - Duration::hours(1)).await;

    let report = h
        .retry
        .retry_pending(&TestMessaging::config(), 10, now)
        .await
        .unwrap();

    assert_eq!(report.exhausted, 1);
    assert_eq!(h.provider.call_count(), 0);
}

#[tokio::test]
async fn test_missing_patient_exhausts_record() {
    let h = harness(ScriptedProvider::accepting(), test_settings()).await;
    let now = Utc::now();
    let contact = TestContact::with_phone(PATIENT_PHONE);
    let appointment = TestAppointment::in_from(now, Duration::hours(20))
        .patient(contact.patient_id)
        .build();
    h.store.insert_appointment(appointment.clone()).await;
    seed_record(&h.store, appointment.id, MessageType::OneDay, NotificationStatus::Failed, 1, now - Duration::hours(1)).await;

    let report = h
        .retry
        .retry_pending(&TestMessaging::config(), 10, now)
        .await
        .unwrap();

    assert_eq!(report.exhausted, 1);
    assert_eq!(h.provider.call_count(), 0);
    let record = h.store.notification(appointment.id, MessageType::OneDay).await.unwrap();
    assert_eq!(record.error_message.as_deref(), Some("patient no longer exists"));
}

#[tokio::test]
async fn test_failed_retry_counts_an_attempt() {
    let h = harness(ScriptedProvider::failing(), test_settings()).await;
    let now = Utc::now();
    let contact = TestContact::with_phone(PATIENT_PHONE);
    let appointment = TestAppointment::in_from(now, Duration::hours(20))
        .patient(contact.patient_id)
        .build();
    h.store.insert_contact(contact).await;
    h.store.insert_appointment(appointment.clone()).await;
    seed_record(&h.store, appointment.id, MessageType::OneDay, NotificationStatus::Failed, 1, now - Duration::hours(1)).await;

    let report = h
        .retry
        .retry_pending(&TestMessaging::config(), 10, now)
        .await
        .unwrap();

    assert_eq!(report.failed, 1);
    let record = h.store.notification(appointment.id, MessageType::OneDay).await.unwrap();
    assert_eq!(record.attempts, 2);
    assert!(record.is_retryable(h.settings.max_attempts));
}

#[tokio::test]
async fn test_disabled_configuration_skips_retries() {
    let h = harness(ScriptedProvider::accepting(), test_settings()).await;
    let now = Utc::now();
    let appointment = TestAppointment::in_from(now, Duration::hours(20)).build();
    seed_record(&h.store, appointment.id, MessageType::OneDay, NotificationStatus::Failed, 1, now - Duration::hours(1)).await;

    let report = h
        .retry
        .retry_pending(&TestMessaging::disabled(), 10, now)
        .await
        .unwrap();

    assert_eq!(report.selected, 0);
}
