//! ReservationRepository interface tests.
//!
//! These tests verify the contract of the ReservationRepository trait.
//! Each storage engine should run these tests.

use chrono::{Days, NaiveDate, Utc};
use uuid::Uuid;

use reservation_store::{Reservation, ReservationRepository, StorageError};

/// Hotel id unique to one test, so tests never see each other's rows.
pub fn unique_hotel(name: &str) -> String {
    format!("{}-{}", name, &Uuid::new_v4().simple().to_string()[..8])
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub fn make_reservation(hotel_id: &str, start: NaiveDate, room: i16) -> Reservation {
    let end = start.checked_add_days(Days::new(2)).unwrap_or(start);
    Reservation::new(hotel_id, start, end, room, Uuid::new_v4())
}

fn rooms(reservations: &[Reservation]) -> Vec<i16> {
    reservations.iter().filter_map(|r| r.room_number).collect()
}

// =============================================================================
// Fresh-keyspace tests (must run first)
// =============================================================================

pub async fn test_list_all_on_fresh_keyspace<R: ReservationRepository + ?Sized>(repository: &R) {
    let date = today();
    repository
        .upsert(make_reservation("12345", date, 42))
        .await
        .expect("upsert should succeed");
    repository
        .upsert(make_reservation("12345", date, 43))
        .await
        .expect("upsert should succeed");

    let found = repository
        .find_by_hotel_and_date("12345", date)
        .await
        .expect("query should succeed");
    assert_eq!(rooms(&found), vec![42, 43], "rows ordered by room");

    let all = repository.list_all().await.expect("list_all should succeed");
    assert_eq!(all.len(), 2, "fresh keyspace should hold exactly 2 reservations");
}

// =============================================================================
// Upsert tests
// =============================================================================

pub async fn test_upsert_generates_confirmation_number<R: ReservationRepository + ?Sized>(repository: &R) {
    let reservation = make_reservation(&unique_hotel("upsert"), today(), 1);

    let id = repository
        .upsert(reservation.clone())
        .await
        .expect("upsert should succeed");
    assert!(!id.is_empty(), "generated id should be non-empty");

    assert!(repository.exists(&id).await.expect("exists should succeed"));
    let found = repository
        .find_by_confirmation(&id)
        .await
        .expect("find should succeed")
        .expect("reservation should exist");
    assert_eq!(found, reservation.with_confirmation_number(id));
}

pub async fn test_upsert_overwrites_same_confirmation_number<R: ReservationRepository + ?Sized>(
    repository: &R,
) {
    let hotel = unique_hotel("overwrite");
    let id = repository
        .upsert(make_reservation(&hotel, today(), 1))
        .await
        .expect("upsert should succeed");

    let replacement = make_reservation(&hotel, today(), 1).with_confirmation_number(id.clone());
    let returned = repository
        .upsert(replacement.clone())
        .await
        .expect("second upsert should succeed");
    assert_eq!(returned, id);

    let found = repository
        .find_by_confirmation(&id)
        .await
        .expect("find should succeed");
    assert_eq!(found, Some(replacement.clone()));
    assert_eq!(
        repository
            .find_by_hotel_and_date(&hotel, today())
            .await
            .expect("query should succeed"),
        vec![replacement]
    );
}

pub async fn test_upsert_same_record_twice_without_id<R: ReservationRepository + ?Sized>(repository: &R) {
    let reservation = make_reservation(&unique_hotel("twice"), today(), 5);

    let first = repository
        .upsert(reservation.clone())
        .await
        .expect("upsert should succeed");
    let second = repository
        .upsert(reservation)
        .await
        .expect("upsert should succeed");
    assert_ne!(first, second, "each upsert without id should get a new id");

    let ids: Vec<String> = repository
        .list_all()
        .await
        .expect("list_all should succeed")
        .into_iter()
        .filter_map(|r| r.confirmation_number)
        .collect();
    assert!(ids.contains(&first));
    assert!(ids.contains(&second));
}

pub async fn test_upsert_moving_room_leaves_no_stale_row<R: ReservationRepository + ?Sized>(repository: &R) {
    let hotel = unique_hotel("relocate");
    let id = repository
        .upsert(make_reservation(&hotel, today(), 10))
        .await
        .expect("upsert should succeed");

    let moved = make_reservation(&hotel, today(), 11).with_confirmation_number(id);
    repository
        .upsert(moved.clone())
        .await
        .expect("upsert should succeed");

    assert_eq!(
        repository
            .find_by_hotel_and_date(&hotel, today())
            .await
            .expect("query should succeed"),
        vec![moved]
    );
}

// =============================================================================
// Query tests
// =============================================================================

pub async fn test_hotel_date_query_exact_match_ordered<R: ReservationRepository + ?Sized>(repository: &R) {
    let hotel = unique_hotel("query");
    let other_hotel = unique_hotel("query-other");
    let date = today();
    let next_day = date.checked_add_days(Days::new(1)).unwrap_or(date);

    for room in [3, 1, 2] {
        repository
            .upsert(make_reservation(&hotel, date, room))
            .await
            .expect("upsert should succeed");
    }
    repository
        .upsert(make_reservation(&hotel, next_day, 4))
        .await
        .expect("upsert should succeed");
    repository
        .upsert(make_reservation(&other_hotel, date, 5))
        .await
        .expect("upsert should succeed");

    let found = repository
        .find_by_hotel_and_date(&hotel, date)
        .await
        .expect("query should succeed");
    assert_eq!(rooms(&found), vec![1, 2, 3]);
    assert!(found
        .iter()
        .all(|r| r.hotel_id.as_deref() == Some(hotel.as_str()) && r.start_date == Some(date)));
}

pub async fn test_missing_reservation<R: ReservationRepository + ?Sized>(repository: &R) {
    let id = Uuid::new_v4().to_string();
    assert!(!repository.exists(&id).await.expect("exists should succeed"));
    assert_eq!(
        repository
            .find_by_confirmation(&id)
            .await
            .expect("find should succeed"),
        None
    );
    repository
        .delete(&id)
        .await
        .expect("deleting an unknown reservation is a no-op");
    assert!(repository
        .find_by_hotel_and_date(&unique_hotel("empty"), today())
        .await
        .expect("query should succeed")
        .is_empty());
}

// =============================================================================
// Delete tests
// =============================================================================

pub async fn test_delete_removes_from_every_table<R: ReservationRepository + ?Sized>(repository: &R) {
    let hotel = unique_hotel("delete");
    let id = repository
        .upsert(make_reservation(&hotel, today(), 7))
        .await
        .expect("upsert should succeed");

    repository.delete(&id).await.expect("delete should succeed");

    assert!(!repository.exists(&id).await.expect("exists should succeed"));
    let remaining = repository
        .find_by_hotel_and_date(&hotel, today())
        .await
        .expect("query should succeed");
    assert!(
        remaining
            .iter()
            .all(|r| r.confirmation_number.as_deref() != Some(id.as_str())),
        "deleted id must not be returned by hotel/date query"
    );
}

// =============================================================================
// Validation tests
// =============================================================================

pub async fn test_empty_arguments_rejected<R: ReservationRepository + ?Sized>(repository: &R) {
    assert!(matches!(
        repository.exists("").await,
        Err(StorageError::InvalidArgument(_))
    ));
    assert!(matches!(
        repository.find_by_confirmation("").await,
        Err(StorageError::InvalidArgument(_))
    ));
    assert!(matches!(
        repository.delete("").await,
        Err(StorageError::InvalidArgument(_))
    ));
    assert!(matches!(
        repository.find_by_hotel_and_date("", today()).await,
        Err(StorageError::InvalidArgument(_))
    ));

    let mut no_hotel = make_reservation("ignored", today(), 1);
    no_hotel.hotel_id = None;
    assert!(matches!(
        repository.upsert(no_hotel).await,
        Err(StorageError::InvalidArgument(_))
    ));
}

// =============================================================================
// Test runner macro
// =============================================================================

/// Run all ReservationRepository interface tests against a repository.
///
/// The repository must start on an empty keyspace.
#[macro_export]
macro_rules! run_reservation_repository_tests {
    ($repository:expr) => {
        use $crate::repository::reservation_repository_tests::*;

        test_list_all_on_fresh_keyspace($repository).await;
        println!("  test_list_all_on_fresh_keyspace: PASSED");

        // upsert tests
        test_upsert_generates_confirmation_number($repository).await;
        println!("  test_upsert_generates_confirmation_number: PASSED");

        test_upsert_overwrites_same_confirmation_number($repository).await;
        println!("  test_upsert_overwrites_same_confirmation_number: PASSED");

        test_upsert_same_record_twice_without_id($repository).await;
        println!("  test_upsert_same_record_twice_without_id: PASSED");

        test_upsert_moving_room_leaves_no_stale_row($repository).await;
        println!("  test_upsert_moving_room_leaves_no_stale_row: PASSED");

        // query tests
        test_hotel_date_query_exact_match_ordered($repository).await;
        println!("  test_hotel_date_query_exact_match_ordered: PASSED");

        test_missing_reservation($repository).await;
        println!("  test_missing_reservation: PASSED");

        // delete tests
        test_delete_removes_from_every_table($repository).await;
        println!("  test_delete_removes_from_every_table: PASSED");

        // validation tests
        test_empty_arguments_rejected($repository).await;
        println!("  test_empty_arguments_rejected: PASSED");
    };
}
