use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{NaiveDate, NaiveTime};

use appointment_cell::{BusinessHoursResolver, SchedulingError};
use shared_database::InMemoryStore;
use shared_utils::test_utils::{hours, seeded_store};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn test_weekly_hours_by_iso_weekday() {
    let store = seeded_store().await;
    let resolver = BusinessHoursResolver::new(store);

    // Monday
    let monday = resolver.resolve(date(2025, 3, 10)).await.unwrap();
    assert_eq!(monday, vec![hours((9, 0), (13, 0)), hours((14, 0), (18, 0))]);

    // Sunday has no recurring hours.
    let sunday = resolver.resolve(date(2025, 3, 16)).await.unwrap();
    assert!(sunday.is_empty());
}

#[tokio::test]
async fn test_override_replaces_weekly_schedule() {
    let store = seeded_store().await;
    let short_day = date(2025, 3, 11);
    store
        .set_date_override(short_day, vec![hours((10, 0), (12, 0))])
        .await;
    let resolver = BusinessHoursResolver::new(store);

    let resolved = resolver.resolve(short_day).await.unwrap();
    assert_eq!(resolved, vec![hours((10, 0), (12, 0))]);
}

#[tokio::test]
async fn test_override_can_open_a_closed_weekday() {
    let store = seeded_store().await;
    let saturday = date(2025, 3, 15);
    store
        .set_date_override(saturday, vec![hours((9, 0), (12, 0))])
        .await;
    let resolver = BusinessHoursResolver::new(store);

    assert_eq!(resolver.resolve(saturday).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_invalid_intervals_are_skipped_and_result_is_sorted() {
    let store = Arc::new(InMemoryStore::new());
    store
        .set_weekly_hours(
            3,
            vec![
                hours((14, 0), (18, 0)),
                hours((12, 0), (11, 0)),
                hours((10, 0), (10, 0)),
                hours((8, 0), (12, 0)),
            ],
        )
        .await;
    let resolver = BusinessHoursResolver::new(store);

    let resolved = resolver.resolve(date(2025, 3, 12)).await.unwrap();
    assert_eq!(resolved.len(), 2);
    assert_eq!(resolved[0].start, NaiveTime::from_hms_opt(8, 0, 0).unwrap());
    assert_eq!(resolved[1].start, NaiveTime::from_hms_opt(14, 0, 0).unwrap());
}

#[tokio::test]
async fn test_lookup_errors_propagate() {
    let store = seeded_store().await;
    store.set_unavailable(true);
    let resolver = BusinessHoursResolver::new(store);

    assert_matches!(
        resolver.resolve(date(2025, 3, 10)).await,
        Err(SchedulingError::Storage(_))
    );
}
