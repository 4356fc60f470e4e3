use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{NaiveDate, NaiveTime};
use uuid::Uuid;

use appointment_cell::{BookingError, BookingService, SlotLocks};
use availability_cell::{AvailabilityReason, SlotGenerator};
use shared_database::{InMemoryStore, SchedulingStore};
use shared_models::scheduling::{
    AppointmentFilter, AppointmentStatus, NewAppointment, NewAvailabilityException,
    NewWeeklyAvailability,
};

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()
}

struct Fixture {
    doctor_id: Uuid,
    store: Arc<InMemoryStore>,
    service: Arc<BookingService>,
}

impl Fixture {
    async fn new() -> Self {
        let doctor_id = Uuid::new_v4();
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

        let service = Arc::new(BookingService::new(store.clone(), Arc::new(SlotLocks::new())));
        Self { doctor_id, store, service }
    }

    fn request(&self, time: NaiveTime) -> NewAppointment {
        NewAppointment {
            doctor_id: self.doctor_id,
            patient_id: Uuid::new_v4(),
            service_id: Uuid::new_v4(),
            date: monday(),
            time,
            notes: None,
        }
    }

    async fn free_slots(&self) -> Vec<NaiveTime> {
        SlotGenerator::new(self.store.clone())
            .generate_slots(self.doctor_id, monday())
            .await
            .unwrap()
    }
}

#[tokio::test]
async fn test_booking_creates_pending_appointment() {
    let fixture = Fixture::new().await;

    let appointment = fixture.service.book(fixture.request(t(8, 30))).await.unwrap();

    assert_eq!(appointment.status, AppointmentStatus::Pending);
    assert_eq!(fixture.free_slots().await, vec![t(8, 0), t(9, 0), t(9, 30)]);
}

#[tokio::test]
async fn test_booking_outside_schedule_is_rejected_with_reason() {
    let fixture = Fixture::new().await;

    let result = fixture.service.book(fixture.request(t(12, 0))).await;

    assert_matches!(result, Err(BookingError::Unavailable(AvailabilityReason::OutsideSchedule)));
}

#[tokio::test]
async fn test_booking_blacked_out_day_is_rejected() {
    let fixture = Fixture::new().await;
    fixture
        .store
        .insert_exception(NewAvailabilityException {
            doctor_id: fixture.doctor_id,
            date: monday(),
            is_available: false,
            start_time: None,
            end_time: None,
            reason: Some("Conference".to_string()),
        })
        .await
        .unwrap();

    let result = fixture.service.book(fixture.request(t(8, 0))).await;

    assert_matches!(result, Err(BookingError::Unavailable(AvailabilityReason::UnavailableOnDate)));
}

#[tokio::test]
async fn test_unknown_doctor_is_not_found() {
    let fixture = Fixture::new().await;
    let mut request = fixture.request(t(8, 0));
    request.doctor_id = Uuid::new_v4();

    assert_matches!(fixture.service.book(request).await, Err(BookingError::DoctorNotFound(_)));
}

#[tokio::test]
async fn test_second_booking_of_same_slot_fails() {
    let fixture = Fixture::new().await;
    fixture.service.book(fixture.request(t(9, 0))).await.unwrap();

    let result = fixture.service.book(fixture.request(t(9, 0))).await;

    assert_matches!(result, Err(BookingError::Unavailable(AvailabilityReason::SlotAlreadyBooked)));
}

#[tokio::test]
async fn test_concurrent_bookings_of_one_slot_admit_exactly_one() {
    let fixture = Fixture::new().await;

    let attempts = (0..8).map(|_| {
        let service = fixture.service.clone();
        let request = fixture.request(t(8, 0));
        tokio::spawn(async move { service.book(request).await })
    });
    let results: Vec<_> = futures::future::join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let booked = results.iter().filter(|result| result.is_ok()).count();
    assert_eq!(booked, 1);
    for result in results.iter().filter(|result| result.is_err()) {
        assert_matches!(
            result,
            Err(BookingError::Unavailable(AvailabilityReason::SlotAlreadyBooked))
                | Err(BookingError::SlotTaken)
        );
    }

    let active = fixture
        .service
        .list(AppointmentFilter {
            doctor_id: Some(fixture.doctor_id),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(active.len(), 1);
}

#[tokio::test]
async fn test_store_uniqueness_backs_up_a_separate_lock_registry() {
    let fixture = Fixture::new().await;
    // A second service instance does not share the first one's locks.
    let other = BookingService::new(fixture.store.clone(), Arc::new(SlotLocks::new()));

    let (first, second) = tokio::join!(
        fixture.service.book(fixture.request(t(9, 30))),
        other.book(fixture.request(t(9, 30)))
    );

    assert_eq!(usize::from(first.is_ok()) + usize::from(second.is_ok()), 1);
}

#[tokio::test]
async fn test_cancel_releases_slot() {
    let fixture = Fixture::new().await;
    let appointment = fixture.service.book(fixture.request(t(8, 30))).await.unwrap();

    let cancelled = fixture.service.cancel(appointment.id).await.unwrap();

    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
    assert_eq!(fixture.free_slots().await, vec![t(8, 0), t(8, 30), t(9, 0), t(9, 30)]);
    assert!(fixture.service.book(fixture.request(t(8, 30))).await.is_ok());
}

#[tokio::test]
async fn test_status_follows_lifecycle() {
    let fixture = Fixture::new().await;
    let appointment = fixture.service.book(fixture.request(t(8, 0))).await.unwrap();

    assert_matches!(
        fixture.service.transition(appointment.id, AppointmentStatus::Completed).await,
        Err(BookingError::InvalidStatusTransition { .. })
    );

    fixture
        .service
        .transition(appointment.id, AppointmentStatus::Confirmed)
        .await
        .unwrap();
    let completed = fixture
        .service
        .transition(appointment.id, AppointmentStatus::Completed)
        .await
        .unwrap();
    assert_eq!(completed.status, AppointmentStatus::Completed);

    assert_matches!(
        fixture.service.cancel(appointment.id).await,
        Err(BookingError::InvalidStatusTransition { .. })
    );
}

#[tokio::test]
async fn test_reschedule_moves_slot() {
    let fixture = Fixture::new().await;
    let appointment = fixture.service.book(fixture.request(t(8, 0))).await.unwrap();

    let moved = fixture
        .service
        .reschedule(appointment.id, monday(), t(9, 30))
        .await
        .unwrap();

    assert_eq!(moved.time, t(9, 30));
    assert_eq!(fixture.free_slots().await, vec![t(8, 0), t(8, 30), t(9, 0)]);
}

#[tokio::test]
async fn test_reschedule_to_same_slot_is_a_no_op() {
    let fixture = Fixture::new().await;
    let appointment = fixture.service.book(fixture.request(t(8, 0))).await.unwrap();

    let unchanged = fixture
        .service
        .reschedule(appointment.id, monday(), t(8, 0))
        .await
        .unwrap();

    assert_eq!(unchanged, appointment);
}

#[tokio::test]
async fn test_reschedule_onto_booked_slot_fails() {
    let fixture = Fixture::new().await;
    let first = fixture.service.book(fixture.request(t(8, 0))).await.unwrap();
    fixture.service.book(fixture.request(t(8, 30))).await.unwrap();

    assert_matches!(
        fixture.service.reschedule(first.id, monday(), t(8, 30)).await,
        Err(BookingError::Unavailable(AvailabilityReason::SlotAlreadyBooked))
    );
}

#[tokio::test]
async fn test_cancelled_appointment_cannot_be_rescheduled() {
    let fixture = Fixture::new().await;
    let appointment = fixture.service.book(fixture.request(t(8, 0))).await.unwrap();
    fixture.service.cancel(appointment.id).await.unwrap();

    assert_matches!(
        fixture.service.reschedule(appointment.id, monday(), t(9, 0)).await,
        Err(BookingError::Closed(AppointmentStatus::Cancelled))
    );
}

#[tokio::test]
async fn test_missing_appointment_is_not_found() {
    let fixture = Fixture::new().await;
    assert_matches!(
        fixture.service.cancel(Uuid::new_v4()).await,
        Err(BookingError::NotFound(_))
    );
}
