use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone, Utc};
use tokio_test::assert_ok;
use uuid::Uuid;

use appointment_cell::{AppointmentConflictValidator, BusinessHoursResolver, SchedulingError};
use shared_database::InMemoryStore;
use shared_models::AppointmentCandidate;
use shared_utils::test_utils::{hours, TestAppointment};

// 2025-03-10 is a Monday.
fn monday(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, hour, minute, 0).unwrap()
}

fn utc_offset() -> FixedOffset {
    FixedOffset::east_opt(0).unwrap()
}

async fn clinic_open_nine_to_five() -> Arc<InMemoryStore> {
    let store = Arc::new(InMemoryStore::new());
    for weekday in 1..=5 {
        store.set_weekly_hours(weekday, vec![hours((9, 0), (17, 0))]).await;
    }
    store
}

fn validator_for(store: Arc<InMemoryStore>, offset: FixedOffset) -> AppointmentConflictValidator {
    let resolver = Arc::new(BusinessHoursResolver::new(store.clone()));
    AppointmentConflictValidator::new(store, resolver, offset)
}

#[tokio::test]
async fn test_appointment_inside_hours_is_valid() {
    let store = clinic_open_nine_to_five().await;
    let validator = validator_for(store, utc_offset());

    let result = validator.validate(monday(10, 0), monday(11, 0), None).await;
    assert!(result.is_ok(), "expected valid, got {:?}", result);
}

#[tokio::test]
async fn test_overlapping_appointment_is_a_conflict() {
    let store = clinic_open_nine_to_five().await;
    store
        .insert_appointment(TestAppointment::at(monday(10, 0)).minutes(60).build())
        .await;
    let validator = validator_for(store, utc_offset());

    let result = validator.validate(monday(10, 30), monday(11, 30), None).await;
    assert_matches!(result, Err(SchedulingError::Conflict { .. }));
}

#[tokio::test]
async fn test_back_to_back_appointments_do_not_conflict() {
    let store = clinic_open_nine_to_five().await;
    store
        .insert_appointment(TestAppointment::at(monday(10, 0)).minutes(60).build())
        .await;
    let validator = validator_for(store, utc_offset());

    assert_ok!(validator.validate(monday(11, 0), monday(12, 0), None).await);
    assert_ok!(validator.validate(monday(9, 0), monday(10, 0), None).await);
}

#[tokio::test]
async fn test_moving_an_appointment_ignores_itself() {
    let store = clinic_open_nine_to_five().await;
    let existing = TestAppointment::at(monday(10, 0)).minutes(60).build();
    store.insert_appointment(existing.clone()).await;
    let validator = validator_for(store, utc_offset());

    let result = validator
        .validate(monday(10, 30), monday(11, 30), Some(existing.id))
        .await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_appointment_after_closing_is_out_of_hours() {
    let store = clinic_open_nine_to_five().await;
    let validator = validator_for(store, utc_offset());

    let result = validator.validate(monday(18, 0), monday(19, 0), None).await;
    assert_matches!(result, Err(SchedulingError::OutOfHours { .. }));
}

#[tokio::test]
async fn test_closed_override_rejects_every_slot() {
    let store = clinic_open_nine_to_five().await;
    let holiday = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
    store.set_date_override(holiday, vec![]).await;
    let validator = validator_for(store, utc_offset());

    for (start, end) in [(9, 10), (10, 11), (16, 17)] {
        let result = validator.validate(monday(start, 0), monday(end, 0), None).await;
        assert_matches!(result, Err(SchedulingError::OutOfHours { .. }));
    }
}

#[tokio::test]
async fn test_conflict_is_reported_before_out_of_hours() {
    let store = clinic_open_nine_to_five().await;
    store
        .insert_appointment(TestAppointment::at(monday(18, 0)).minutes(60).build())
        .await;
    let validator = validator_for(store, utc_offset());

    let result = validator.validate(monday(18, 30), monday(19, 0), None).await;
    assert_matches!(result, Err(SchedulingError::Conflict { .. }));
}

#[tokio::test]
async fn test_empty_or_inverted_range_is_invalid() {
    let store = clinic_open_nine_to_five().await;
    let validator = validator_for(store, utc_offset());

    assert_matches!(
        validator.validate(monday(10, 0), monday(10, 0), None).await,
        Err(SchedulingError::Validation(_))
    );
    assert_matches!(
        validator.validate(monday(11, 0), monday(10, 0), None).await,
        Err(SchedulingError::Validation(_))
    );
}

#[tokio::test]
async fn test_candidate_requires_identity_and_positive_duration() {
    let store = clinic_open_nine_to_five().await;
    let validator = validator_for(store, utc_offset());

    let mut candidate = AppointmentCandidate {
        patient_id: None,
        patient_name: None,
        start_time: monday(10, 0),
        duration_minutes: 30,
        exclude_appointment_id: None,
    };
    assert_matches!(
        validator.validate_candidate(&candidate).await,
        Err(SchedulingError::Validation(_))
    );

    candidate.patient_id = Some(Uuid::new_v4());
    candidate.duration_minutes = 0;
    assert_matches!(
        validator.validate_candidate(&candidate).await,
        Err(SchedulingError::Validation(_))
    );

    candidate.duration_minutes = 45;
    let end = assert_ok!(validator.validate_candidate(&candidate).await);
    assert_eq!(end, monday(10, 45));
}

#[tokio::test]
async fn test_candidate_duration_is_bounded() {
    let store = clinic_open_nine_to_five().await;
    let validator = validator_for(store, utc_offset());

    for duration_minutes in [24 * 60 + 1, 9_000_000_000_000_000, i64::MAX] {
        let candidate = AppointmentCandidate {
            patient_id: Some(Uuid::new_v4()),
            patient_name: None,
            start_time: monday(10, 0),
            duration_minutes,
            exclude_appointment_id: None,
        };
        assert_matches!(
            validator.validate_candidate(&candidate).await,
            Err(SchedulingError::Validation(_))
        );
    }
}

#[tokio::test]
async fn test_business_hours_follow_the_clinic_offset() {
    let store = clinic_open_nine_to_five().await;
    let mexico_city = FixedOffset::west_opt(6 * 3600).unwrap();
    let validator = validator_for(store, mexico_city);

    // 16:00-17:00 UTC is 10:00-11:00 in the clinic.
    assert_ok!(validator.validate(monday(16, 0), monday(17, 0), None).await);
    // 10:00 UTC is 04:00 in the clinic.
    assert_matches!(
        validator.validate(monday(10, 0), monday(11, 0), None).await,
        Err(SchedulingError::OutOfHours { .. })
    );
}

#[tokio::test]
async fn test_storage_failure_is_not_treated_as_open() {
    let store = clinic_open_nine_to_five().await;
    store.set_unavailable(true);
    let validator = validator_for(store, utc_offset());

    let result = validator
        .validate(monday(10, 0), monday(10, 0) + Duration::minutes(30), None)
        .await;
    assert_matches!(result, Err(SchedulingError::Storage(_)));
}
