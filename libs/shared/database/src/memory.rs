use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_models::scheduling::{
    Appointment, AppointmentFilter, AppointmentStatus, AvailabilityException, DateRange,
    NewAppointment, NewAvailabilityException, NewWeeklyAvailability, WeeklyAvailability,
};

use crate::error::StoreError;
use crate::store::SchedulingStore;

#[derive(Default)]
struct Tables {
    weekly: Vec<WeeklyAvailability>,
    exceptions: Vec<AvailabilityException>,
    appointments: Vec<Appointment>,
}

impl Tables {
    fn slot_taken(&self, doctor_id: Uuid, date: NaiveDate, time: NaiveTime, except: Option<Uuid>) -> bool {
        self.appointments.iter().any(|apt| {
            Some(apt.id) != except
                && apt.doctor_id == doctor_id
                && apt.date == date
                && apt.time == time
                && apt.status.occupies_slot()
        })
    }
}

/// Process-local store used for development runs and tests.
///
/// Enforces the same one-active-appointment-per-slot rule as the SQL schema's
/// partial unique index.
pub struct InMemoryStore {
    doctors: RwLock<Option<HashSet<Uuid>>>,
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    /// Only doctors added through [`InMemoryStore::register_doctor`] exist.
    pub fn new() -> Self {
        Self {
            doctors: RwLock::new(Some(HashSet::new())),
            tables: RwLock::new(Tables::default()),
        }
    }

    /// Every doctor id is treated as existing; user management lives elsewhere.
    pub fn permissive() -> Self {
        Self {
            doctors: RwLock::new(None),
            tables: RwLock::new(Tables::default()),
        }
    }

    pub async fn register_doctor(&self, doctor_id: Uuid) {
        let mut doctors = self.doctors.write().await;
        doctors.get_or_insert_with(HashSet::new).insert(doctor_id);
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SchedulingStore for InMemoryStore {
    async fn doctor_exists(&self, doctor_id: Uuid) -> Result<bool, StoreError> {
        let doctors = self.doctors.read().await;
        Ok(doctors.as_ref().map_or(true, |known| known.contains(&doctor_id)))
    }

    async fn find_weekly_availability(
        &self,
        doctor_id: Uuid,
        day_of_week: u8,
    ) -> Result<Vec<WeeklyAvailability>, StoreError> {
        let tables = self.tables.read().await;
        let mut rules: Vec<WeeklyAvailability> = tables
            .weekly
            .iter()
            .filter(|rule| rule.doctor_id == doctor_id && rule.day_of_week == day_of_week && rule.active)
            .cloned()
            .collect();
        rules.sort_by_key(|rule| rule.start_time);
        Ok(rules)
    }

    async fn list_weekly_availability(
        &self,
        doctor_id: Uuid,
    ) -> Result<Vec<WeeklyAvailability>, StoreError> {
        let tables = self.tables.read().await;
        let mut rules: Vec<WeeklyAvailability> = tables
            .weekly
            .iter()
            .filter(|rule| rule.doctor_id == doctor_id && rule.active)
            .cloned()
            .collect();
        rules.sort_by_key(|rule| (rule.day_of_week, rule.start_time));
        Ok(rules)
    }

    async fn replace_weekly_availability(
        &self,
        doctor_id: Uuid,
        rules: Vec<NewWeeklyAvailability>,
    ) -> Result<Vec<WeeklyAvailability>, StoreError> {
        let mut tables = self.tables.write().await;

        let mut deactivated = 0usize;
        for rule in tables.weekly.iter_mut().filter(|r| r.doctor_id == doctor_id && r.active) {
            rule.active = false;
            deactivated += 1;
        }

        let now = Utc::now();
        let inserted: Vec<WeeklyAvailability> = rules
            .into_iter()
            .map(|rule| WeeklyAvailability {
                id: Uuid::new_v4(),
                doctor_id,
                day_of_week: rule.day_of_week,
                start_time: rule.start_time,
                end_time: rule.end_time,
                interval_minutes: rule.interval_minutes,
                active: true,
                created_at: now,
            })
            .collect();
        tables.weekly.extend(inserted.iter().cloned());

        debug!(
            "Replaced weekly schedule for doctor {}: {} deactivated, {} inserted",
            doctor_id,
            deactivated,
            inserted.len()
        );
        Ok(inserted)
    }

    async fn find_exception(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<AvailabilityException>, StoreError> {
        let tables = self.tables.read().await;
        // max_by_key keeps the last of equal keys, so same-instant inserts resolve to the newest row.
        Ok(tables
            .exceptions
            .iter()
            .filter(|exc| exc.doctor_id == doctor_id && exc.date == date)
            .max_by_key(|exc| exc.created_at)
            .cloned())
    }

    async fn list_exceptions(
        &self,
        doctor_id: Uuid,
        range: DateRange,
    ) -> Result<Vec<AvailabilityException>, StoreError> {
        let tables = self.tables.read().await;
        let mut exceptions: Vec<AvailabilityException> = tables
            .exceptions
            .iter()
            .filter(|exc| exc.doctor_id == doctor_id && range.contains(exc.date))
            .cloned()
            .collect();
        exceptions.sort_by_key(|exc| exc.date);
        Ok(exceptions)
    }

    async fn get_exception(
        &self,
        exception_id: Uuid,
    ) -> Result<Option<AvailabilityException>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.exceptions.iter().find(|exc| exc.id == exception_id).cloned())
    }

    async fn insert_exception(
        &self,
        exception: NewAvailabilityException,
    ) -> Result<AvailabilityException, StoreError> {
        let mut tables = self.tables.write().await;
        let created = AvailabilityException {
            id: Uuid::new_v4(),
            doctor_id: exception.doctor_id,
            date: exception.date,
            is_available: exception.is_available,
            start_time: exception.start_time,
            end_time: exception.end_time,
            reason: exception.reason,
            created_at: Utc::now(),
        };
        tables.exceptions.push(created.clone());
        Ok(created)
    }

    async fn delete_exception(&self, exception_id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let before = tables.exceptions.len();
        tables.exceptions.retain(|exc| exc.id != exception_id);
        Ok(tables.exceptions.len() != before)
    }

    async fn find_booked_appointments(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, StoreError> {
        let tables = self.tables.read().await;
        let mut booked: Vec<Appointment> = tables
            .appointments
            .iter()
            .filter(|apt| apt.doctor_id == doctor_id && apt.date == date && apt.status.occupies_slot())
            .cloned()
            .collect();
        booked.sort_by_key(|apt| apt.time);
        Ok(booked)
    }

    async fn find_booked_appointment(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<Option<Appointment>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .appointments
            .iter()
            .find(|apt| {
                apt.doctor_id == doctor_id
                    && apt.date == date
                    && apt.time == time
                    && apt.status.occupies_slot()
            })
            .cloned())
    }

    async fn insert_appointment(
        &self,
        appointment: NewAppointment,
    ) -> Result<Appointment, StoreError> {
        let mut tables = self.tables.write().await;

        if tables.slot_taken(appointment.doctor_id, appointment.date, appointment.time, None) {
            return Err(StoreError::UniqueViolation(format!(
                "doctor {} already has an active appointment on {} at {}",
                appointment.doctor_id,
                appointment.date,
                appointment.time.format("%H:%M")
            )));
        }

        let now = Utc::now();
        let created = Appointment {
            id: Uuid::new_v4(),
            doctor_id: appointment.doctor_id,
            patient_id: appointment.patient_id,
            service_id: appointment.service_id,
            date: appointment.date,
            time: appointment.time,
            status: AppointmentStatus::Pending,
            notes: appointment.notes,
            created_at: now,
            updated_at: now,
        };
        tables.appointments.push(created.clone());
        Ok(created)
    }

    async fn get_appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.appointments.iter().find(|apt| apt.id == appointment_id).cloned())
    }

    async fn list_appointments(
        &self,
        filter: AppointmentFilter,
    ) -> Result<Vec<Appointment>, StoreError> {
        let tables = self.tables.read().await;
        let mut appointments: Vec<Appointment> = tables
            .appointments
            .iter()
            .filter(|apt| filter.matches(apt))
            .cloned()
            .collect();
        appointments.sort_by_key(|apt| (apt.date, apt.time));
        Ok(appointments)
    }

    async fn update_appointment_status(
        &self,
        appointment_id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Option<Appointment>, StoreError> {
        let mut tables = self.tables.write().await;

        let Some(index) = tables.appointments.iter().position(|apt| apt.id == appointment_id) else {
            return Ok(None);
        };

        // Same rule as the partial unique index on the SQL side.
        let current = &tables.appointments[index];
        if status.occupies_slot()
            && !current.status.occupies_slot()
            && tables.slot_taken(current.doctor_id, current.date, current.time, Some(appointment_id))
        {
            return Err(StoreError::UniqueViolation(format!(
                "slot of appointment {} has been booked again",
                appointment_id
            )));
        }

        let appointment = &mut tables.appointments[index];
        appointment.status = status;
        appointment.updated_at = Utc::now();
        Ok(Some(appointment.clone()))
    }

    async fn update_appointment_slot(
        &self,
        appointment_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<Option<Appointment>, StoreError> {
        let mut tables = self.tables.write().await;

        let Some(index) = tables.appointments.iter().position(|apt| apt.id == appointment_id) else {
            return Ok(None);
        };

        let doctor_id = tables.appointments[index].doctor_id;
        if tables.slot_taken(doctor_id, date, time, Some(appointment_id)) {
            return Err(StoreError::UniqueViolation(format!(
                "doctor {} already has an active appointment on {} at {}",
                doctor_id,
                date,
                time.format("%H:%M")
            )));
        }

        let appointment = &mut tables.appointments[index];
        appointment.date = date;
        appointment.time = time;
        appointment.updated_at = Utc::now();
        Ok(Some(appointment.clone()))
    }
}
