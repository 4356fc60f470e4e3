use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

use availability_cell::AvailabilityChecker;
use shared_database::{SharedStore, StoreError};
use shared_models::scheduling::{Appointment, AppointmentFilter, AppointmentStatus, NewAppointment};

use crate::models::BookingError;
use crate::services::lifecycle::AppointmentLifecycleService;

/// Per-(doctor, date) async locks serialising check-then-write within this process.
#[derive(Debug, Default)]
pub struct SlotLocks {
    locks: Mutex<HashMap<(Uuid, NaiveDate), Arc<Mutex<()>>>>,
}

impl SlotLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, doctor_id: Uuid, date: NaiveDate) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            // Entries only referenced by the map are idle.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry((doctor_id, date)).or_default().clone()
        };
        lock.lock_owned().await
    }

    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

pub struct BookingService {
    store: SharedStore,
    locks: Arc<SlotLocks>,
    checker: AvailabilityChecker,
    lifecycle: AppointmentLifecycleService,
}

impl BookingService {
    pub fn new(store: SharedStore, locks: Arc<SlotLocks>) -> Self {
        Self {
            checker: AvailabilityChecker::new(store.clone()),
            lifecycle: AppointmentLifecycleService::new(),
            store,
            locks,
        }
    }

    /// Books a pending appointment if the slot is bookable right now.
    pub async fn book(&self, appointment: NewAppointment) -> Result<Appointment, BookingError> {
        let (doctor_id, date, time) = (appointment.doctor_id, appointment.date, appointment.time);
        debug!("Booking doctor {} on {} at {}", doctor_id, date, time);

        if !self.store.doctor_exists(doctor_id).await? {
            return Err(BookingError::DoctorNotFound(doctor_id));
        }

        let _guard = self.locks.acquire(doctor_id, date).await;
        self.ensure_bookable(doctor_id, date, time).await?;

        let created = self
            .store
            .insert_appointment(appointment)
            .await
            .map_err(slot_taken)?;

        info!(
            "Booked appointment {} for patient {} with doctor {} on {} at {}",
            created.id, created.patient_id, doctor_id, date, time
        );
        Ok(created)
    }

    /// Moves a live appointment to another slot of the same doctor.
    pub async fn reschedule(
        &self,
        appointment_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<Appointment, BookingError> {
        let current = self.get(appointment_id).await?;

        if current.status.is_terminal() {
            warn!("Refusing to reschedule {} appointment {}", current.status, appointment_id);
            return Err(BookingError::Closed(current.status));
        }

        if current.date == date && current.time == time {
            debug!("Appointment {} already at {} {}", appointment_id, date, time);
            return Ok(current);
        }

        let _guard = self.locks.acquire(current.doctor_id, date).await;
        self.ensure_bookable(current.doctor_id, date, time).await?;

        let moved = self
            .store
            .update_appointment_slot(appointment_id, date, time)
            .await
            .map_err(slot_taken)?
            .ok_or(BookingError::NotFound(appointment_id))?;

        info!(
            "Rescheduled appointment {} from {} {} to {} {}",
            appointment_id, current.date, current.time, date, time
        );
        Ok(moved)
    }

    pub async fn transition(
        &self,
        appointment_id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Appointment, BookingError> {
        let current = self.get(appointment_id).await?;
        self.lifecycle.validate_status_transition(current.status, status)?;

        let updated = self
            .store
            .update_appointment_status(appointment_id, status)
            .await?
            .ok_or(BookingError::NotFound(appointment_id))?;

        info!("Appointment {} moved from {} to {}", appointment_id, current.status, status);
        Ok(updated)
    }

    /// Soft cancel: the row stays, the slot is released.
    pub async fn cancel(&self, appointment_id: Uuid) -> Result<Appointment, BookingError> {
        self.transition(appointment_id, AppointmentStatus::Cancelled).await
    }

    pub async fn get(&self, appointment_id: Uuid) -> Result<Appointment, BookingError> {
        self.store
            .get_appointment(appointment_id)
            .await?
            .ok_or(BookingError::NotFound(appointment_id))
    }

    pub async fn list(&self, filter: AppointmentFilter) -> Result<Vec<Appointment>, BookingError> {
        debug!("Listing appointments with {:?}", filter);
        Ok(self.store.list_appointments(filter).await?)
    }

    async fn ensure_bookable(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<(), BookingError> {
        let check = self.checker.check_availability(doctor_id, date, time).await?;
        if !check.bookable {
            warn!(
                "Doctor {} not bookable on {} at {}: {}",
                doctor_id, date, time, check.message
            );
            return Err(BookingError::Unavailable(check.reason));
        }
        Ok(())
    }
}

fn slot_taken(err: StoreError) -> BookingError {
    match err {
        StoreError::UniqueViolation(detail) => {
            warn!("Slot taken by a concurrent write: {}", detail);
            BookingError::SlotTaken
        }
        other => BookingError::Store(other),
    }
}
