use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use uuid::Uuid;

use shared_models::scheduling::{
    Appointment, AppointmentFilter, AppointmentStatus, AvailabilityException, DateRange,
    NewAppointment, NewAvailabilityException, NewWeeklyAvailability, WeeklyAvailability,
};

use crate::error::StoreError;

pub type SharedStore = Arc<dyn SchedulingStore>;

/// Persistence seam for everything the scheduling cells read and write.
///
/// Implementations must uphold two guarantees the cells rely on:
/// `find_exception` returns the most recently created exception when several
/// exist for the same date, and the appointment writes fail with
/// [`StoreError::UniqueViolation`] rather than leave a second non-cancelled
/// appointment for the same doctor, date and time.
#[async_trait]
pub trait SchedulingStore: Send + Sync {
    async fn doctor_exists(&self, doctor_id: Uuid) -> Result<bool, StoreError>;

    /// Active rules for one weekday, ordered by start time.
    async fn find_weekly_availability(
        &self,
        doctor_id: Uuid,
        day_of_week: u8,
    ) -> Result<Vec<WeeklyAvailability>, StoreError>;

    /// Active rules for every weekday, ordered by weekday then start time.
    async fn list_weekly_availability(
        &self,
        doctor_id: Uuid,
    ) -> Result<Vec<WeeklyAvailability>, StoreError>;

    /// Deactivates every active rule of the doctor and inserts `rules`.
    async fn replace_weekly_availability(
        &self,
        doctor_id: Uuid,
        rules: Vec<NewWeeklyAvailability>,
    ) -> Result<Vec<WeeklyAvailability>, StoreError>;

    async fn find_exception(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<AvailabilityException>, StoreError>;

    /// Ordered by date ascending.
    async fn list_exceptions(
        &self,
        doctor_id: Uuid,
        range: DateRange,
    ) -> Result<Vec<AvailabilityException>, StoreError>;

    async fn get_exception(
        &self,
        exception_id: Uuid,
    ) -> Result<Option<AvailabilityException>, StoreError>;

    async fn insert_exception(
        &self,
        exception: NewAvailabilityException,
    ) -> Result<AvailabilityException, StoreError>;

    /// Returns whether a row was removed.
    async fn delete_exception(&self, exception_id: Uuid) -> Result<bool, StoreError>;

    /// Non-cancelled appointments only.
    async fn find_booked_appointments(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, StoreError>;

    async fn find_booked_appointment(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<Option<Appointment>, StoreError>;

    async fn insert_appointment(
        &self,
        appointment: NewAppointment,
    ) -> Result<Appointment, StoreError>;

    async fn get_appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, StoreError>;

    /// Ordered by date then time.
    async fn list_appointments(
        &self,
        filter: AppointmentFilter,
    ) -> Result<Vec<Appointment>, StoreError>;

    async fn update_appointment_status(
        &self,
        appointment_id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Option<Appointment>, StoreError>;

    async fn update_appointment_slot(
        &self,
        appointment_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<Option<Appointment>, StoreError>;
}
