use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use uuid::Uuid;

use availability_cell::{AvailabilityChecker, SlotGenerator};
use shared_database::{InMemoryStore, SchedulingStore, SharedStore};
use shared_models::scheduling::{
    AppointmentStatus, NewAppointment, NewAvailabilityException, NewWeeklyAvailability,
};

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()
}

fn labels(slots: &[NaiveTime]) -> Vec<String> {
    slots.iter().map(|s| s.format("%H:%M").to_string()).collect()
}

async fn store_with_monday_morning(doctor_id: Uuid) -> Arc<InMemoryStore> {
    let store = Arc::new(InMemoryStore::new());
    store.register_doctor(doctor_id).await;
    store
        .replace_weekly_availability(
            doctor_id,
            vec![NewWeeklyAvailability {
                day_of_week: 1,
                start_time: t(8, 0),
                end_time: t(10, 0),
                interval_minutes: 30,
            }],
        )
        .await
        .unwrap();
    store
}

async fn add_exception(
    store: &InMemoryStore,
    doctor_id: Uuid,
    is_available: bool,
    window: Option<(NaiveTime, NaiveTime)>,
) {
    store
        .insert_exception(NewAvailabilityException {
            doctor_id,
            date: monday(),
            is_available,
            start_time: window.map(|(start, _)| start),
            end_time: window.map(|(_, end)| end),
            reason: None,
        })
        .await
        .unwrap();
}

async fn book(store: &InMemoryStore, doctor_id: Uuid, time: NaiveTime) -> Uuid {
    store
        .insert_appointment(NewAppointment {
            doctor_id,
            patient_id: Uuid::new_v4(),
            service_id: Uuid::new_v4(),
            date: monday(),
            time,
            notes: None,
        })
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn test_no_rules_and_no_exception_yields_nothing() {
    let doctor_id = Uuid::new_v4();
    let store: SharedStore = Arc::new(InMemoryStore::permissive());

    let slots = SlotGenerator::new(store).generate_slots(doctor_id, monday()).await.unwrap();
    assert!(slots.is_empty());
}

#[tokio::test]
async fn test_weekly_rule_expands_at_interval() {
    let doctor_id = Uuid::new_v4();
    let store = store_with_monday_morning(doctor_id).await;

    let slots = SlotGenerator::new(store).generate_slots(doctor_id, monday()).await.unwrap();
    assert_eq!(labels(&slots), vec!["08:00", "08:30", "09:00", "09:30"]);
}

#[tokio::test]
async fn test_rules_for_other_weekdays_are_ignored() {
    let doctor_id = Uuid::new_v4();
    let store = store_with_monday_morning(doctor_id).await;
    let tuesday = NaiveDate::from_ymd_opt(2025, 3, 4).unwrap();

    let slots = SlotGenerator::new(store).generate_slots(doctor_id, tuesday).await.unwrap();
    assert!(slots.is_empty());
}

#[tokio::test]
async fn test_booking_removes_slot_and_cancelling_restores_it() {
    let doctor_id = Uuid::new_v4();
    let store = store_with_monday_morning(doctor_id).await;
    let generator = SlotGenerator::new(store.clone());

    let appointment_id = book(&store, doctor_id, t(8, 30)).await;
    let slots = generator.generate_slots(doctor_id, monday()).await.unwrap();
    assert_eq!(labels(&slots), vec!["08:00", "09:00", "09:30"]);

    store
        .update_appointment_status(appointment_id, AppointmentStatus::Cancelled)
        .await
        .unwrap();
    let slots = generator.generate_slots(doctor_id, monday()).await.unwrap();
    assert_eq!(labels(&slots), vec!["08:00", "08:30", "09:00", "09:30"]);
}

#[tokio::test]
async fn test_whole_day_blackout_empties_the_day() {
    let doctor_id = Uuid::new_v4();
    let store = store_with_monday_morning(doctor_id).await;
    add_exception(&store, doctor_id, false, None).await;

    let slots = SlotGenerator::new(store).generate_slots(doctor_id, monday()).await.unwrap();
    assert!(slots.is_empty());
}

#[tokio::test]
async fn test_partial_blackout_removes_window() {
    let doctor_id = Uuid::new_v4();
    let store = store_with_monday_morning(doctor_id).await;
    add_exception(&store, doctor_id, false, Some((t(9, 0), t(10, 0)))).await;

    let slots = SlotGenerator::new(store).generate_slots(doctor_id, monday()).await.unwrap();
    assert_eq!(labels(&slots), vec!["08:00", "08:30"]);
}

#[tokio::test]
async fn test_partial_override_replaces_weekly_rules() {
    let doctor_id = Uuid::new_v4();
    let store = store_with_monday_morning(doctor_id).await;
    add_exception(&store, doctor_id, true, Some((t(14, 0), t(15, 0)))).await;

    let slots = SlotGenerator::new(store).generate_slots(doctor_id, monday()).await.unwrap();
    assert_eq!(labels(&slots), vec!["14:00", "14:30"]);
}

#[tokio::test]
async fn test_partial_override_without_rules_opens_window() {
    let doctor_id = Uuid::new_v4();
    let store = Arc::new(InMemoryStore::permissive());
    add_exception(&store, doctor_id, true, Some((t(14, 0), t(15, 0)))).await;
    book(&store, doctor_id, t(14, 30)).await;

    let slots = SlotGenerator::new(store).generate_slots(doctor_id, monday()).await.unwrap();
    assert_eq!(labels(&slots), vec!["14:00"]);
}

#[tokio::test]
async fn test_newest_exception_wins() {
    let doctor_id = Uuid::new_v4();
    let store = store_with_monday_morning(doctor_id).await;
    add_exception(&store, doctor_id, false, None).await;
    add_exception(&store, doctor_id, false, Some((t(8, 0), t(9, 0)))).await;

    let slots = SlotGenerator::new(store).generate_slots(doctor_id, monday()).await.unwrap();
    assert_eq!(labels(&slots), vec!["09:00", "09:30"]);
}

#[tokio::test]
async fn test_overlapping_rules_keep_duplicates_sorted() {
    let doctor_id = Uuid::new_v4();
    let store = Arc::new(InMemoryStore::permissive());
    store
        .replace_weekly_availability(
            doctor_id,
            vec![
                NewWeeklyAvailability {
                    day_of_week: 1,
                    start_time: t(9, 0),
                    end_time: t(10, 0),
                    interval_minutes: 30,
                },
                NewWeeklyAvailability {
                    day_of_week: 1,
                    start_time: t(8, 0),
                    end_time: t(9, 30),
                    interval_minutes: 30,
                },
            ],
        )
        .await
        .unwrap();

    let slots = SlotGenerator::new(store).generate_slots(doctor_id, monday()).await.unwrap();
    assert_eq!(labels(&slots), vec!["08:00", "08:30", "09:00", "09:00", "09:30"]);
}

#[tokio::test]
async fn test_generation_is_idempotent() {
    let doctor_id = Uuid::new_v4();
    let store = store_with_monday_morning(doctor_id).await;
    add_exception(&store, doctor_id, false, Some((t(8, 30), t(9, 0)))).await;
    book(&store, doctor_id, t(9, 30)).await;
    let generator = SlotGenerator::new(store);

    let first = generator.generate_slots(doctor_id, monday()).await.unwrap();
    let second = generator.generate_slots(doctor_id, monday()).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_every_generated_slot_checks_bookable() {
    let doctor_id = Uuid::new_v4();
    let store = store_with_monday_morning(doctor_id).await;
    add_exception(&store, doctor_id, false, Some((t(9, 0), t(9, 30)))).await;
    book(&store, doctor_id, t(8, 0)).await;

    let slots = SlotGenerator::new(store.clone())
        .generate_slots(doctor_id, monday())
        .await
        .unwrap();
    assert!(!slots.is_empty());

    let checker = AvailabilityChecker::new(store);
    for slot in slots {
        let check = checker.check_availability(doctor_id, monday(), slot).await.unwrap();
        assert!(check.bookable, "{} should be bookable, got {:?}", slot, check.reason);
    }
}
