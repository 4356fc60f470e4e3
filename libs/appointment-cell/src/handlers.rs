use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use shared_models::auth::{Role, User};
use shared_models::error::AppError;
use shared_models::scheduling::{Appointment, AppointmentFilter, AppointmentStatus, NewAppointment};

use crate::models::{
    AppointmentQueryParams, AppointmentState, BookAppointmentRequest, RescheduleRequest,
    StatusUpdateRequest,
};
use crate::services::BookingService;

fn booking_service(state: &AppointmentState) -> BookingService {
    BookingService::new(state.store.clone(), state.locks.clone())
}

fn ensure_participant(user: &User, appointment: &Appointment) -> Result<(), AppError> {
    if user.is_admin() || appointment.involves(user.id) {
        Ok(())
    } else {
        warn!("User {} denied access to appointment {}", user.id, appointment.id);
        Err(AppError::Forbidden(
            "Not authorized to access this appointment".to_string(),
        ))
    }
}

// ==============================================================================
// BOOKING
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let patient_id = match user.role {
        Role::Patient => user.id,
        Role::Doctor if request.doctor_id != user.id => {
            return Err(AppError::Forbidden(
                "Doctors can only book on their own schedule".to_string(),
            ));
        }
        Role::Doctor | Role::Admin => request.patient_id.ok_or_else(|| {
            AppError::ValidationError("patient_id is required".to_string())
        })?,
    };

    let notes = request
        .notes
        .map(|notes| notes.trim().to_string())
        .filter(|notes| !notes.is_empty());

    let appointment = booking_service(&state)
        .book(NewAppointment {
            doctor_id: request.doctor_id,
            patient_id,
            service_id: request.service_id,
            date: request.date,
            time: request.time,
            notes,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Appointment booked",
            "appointment": appointment,
        })),
    ))
}

// ==============================================================================
// QUERIES
// ==============================================================================

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Query(params): Query<AppointmentQueryParams>,
) -> Result<Json<Value>, AppError> {
    let mut filter = AppointmentFilter::from(params);
    match user.role {
        Role::Patient => filter.patient_id = Some(user.id),
        Role::Doctor => filter.doctor_id = Some(user.id),
        Role::Admin => {}
    }

    let appointments = booking_service(&state).list(filter).await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len(),
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = booking_service(&state).get(appointment_id).await?;
    ensure_participant(&user, &appointment)?;

    Ok(Json(json!(appointment)))
}

// ==============================================================================
// CHANGES
// ==============================================================================

#[axum::debug_handler]
pub async fn update_appointment_status(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<StatusUpdateRequest>,
) -> Result<Json<Value>, AppError> {
    let service = booking_service(&state);
    let appointment = service.get(appointment_id).await?;
    ensure_participant(&user, &appointment)?;

    // Patients may only cancel; confirming and completing belong to the doctor.
    if request.status != AppointmentStatus::Cancelled && !user.can_manage_doctor(appointment.doctor_id) {
        return Err(AppError::Forbidden(format!(
            "Only the doctor or an administrator can mark an appointment {}",
            request.status
        )));
    }

    let updated = service.transition(appointment_id, request.status).await?;

    Ok(Json(json!({
        "message": format!("Appointment {}", updated.status),
        "appointment": updated,
    })))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<RescheduleRequest>,
) -> Result<Json<Value>, AppError> {
    let service = booking_service(&state);
    let appointment = service.get(appointment_id).await?;
    ensure_participant(&user, &appointment)?;

    let moved = service
        .reschedule(appointment_id, request.date, request.time)
        .await?;

    Ok(Json(json!({
        "message": "Appointment rescheduled",
        "appointment": moved,
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = booking_service(&state);
    let appointment = service.get(appointment_id).await?;
    ensure_participant(&user, &appointment)?;

    let cancelled = service.cancel(appointment_id).await?;

    Ok(Json(json!({
        "message": "Appointment cancelled",
        "appointment": cancelled,
    })))
}
