use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use shared_database::SharedStore;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_models::scheduling::DateRange;
use shared_models::time::format_time_of_day;

use crate::models::{
    AvailabilityState, AvailableSlotsResponse, CheckQuery, CreateExceptionRequest,
    ExceptionsQuery, ReplaceScheduleRequest, SlotsQuery,
};
use crate::services::{AvailabilityChecker, ScheduleService, SlotGenerator};

async fn ensure_doctor_exists(store: &SharedStore, doctor_id: Uuid) -> Result<(), AppError> {
    if store.doctor_exists(doctor_id).await? {
        Ok(())
    } else {
        Err(AppError::NotFound(format!("Doctor {} not found", doctor_id)))
    }
}

fn ensure_can_manage(user: &User, doctor_id: Uuid) -> Result<(), AppError> {
    if user.can_manage_doctor(doctor_id) {
        Ok(())
    } else {
        warn!("User {} ({}) denied access to doctor {} schedule", user.id, user.role, doctor_id);
        Err(AppError::Forbidden(
            "Only the doctor or an administrator can manage this schedule".to_string(),
        ))
    }
}

// ==============================================================================
// PUBLIC HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_weekly_schedule(
    State(state): State<AvailabilityState>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    ensure_doctor_exists(&state.store, doctor_id).await?;

    let availability = ScheduleService::new(state.store.clone())
        .weekly_schedule(doctor_id)
        .await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "availability": availability,
    })))
}

#[axum::debug_handler]
pub async fn list_exceptions(
    State(state): State<AvailabilityState>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<ExceptionsQuery>,
) -> Result<Json<Value>, AppError> {
    ensure_doctor_exists(&state.store, doctor_id).await?;

    let range = DateRange {
        from: query.from,
        to: query.to,
    };
    let exceptions = ScheduleService::new(state.store.clone())
        .list_exceptions(doctor_id, range)
        .await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "exceptions": exceptions,
        "total": exceptions.len(),
    })))
}

#[axum::debug_handler]
pub async fn get_available_slots(
    State(state): State<AvailabilityState>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<SlotsQuery>,
) -> Result<Json<AvailableSlotsResponse>, AppError> {
    ensure_doctor_exists(&state.store, doctor_id).await?;

    let slots: Vec<String> = SlotGenerator::new(state.store.clone())
        .generate_slots(doctor_id, query.date)
        .await?
        .into_iter()
        .map(format_time_of_day)
        .collect();

    Ok(Json(AvailableSlotsResponse {
        doctor_id,
        date: query.date,
        total_slots: slots.len(),
        slots,
    }))
}

#[axum::debug_handler]
pub async fn check_availability(
    State(state): State<AvailabilityState>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<CheckQuery>,
) -> Result<Json<Value>, AppError> {
    ensure_doctor_exists(&state.store, doctor_id).await?;

    let check = AvailabilityChecker::new(state.store.clone())
        .check_availability(doctor_id, query.date, query.time)
        .await?;

    Ok(Json(json!(check)))
}

// ==============================================================================
// PROTECTED HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn replace_weekly_schedule(
    State(state): State<AvailabilityState>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<Uuid>,
    Json(request): Json<ReplaceScheduleRequest>,
) -> Result<Json<Value>, AppError> {
    ensure_can_manage(&user, doctor_id)?;
    ensure_doctor_exists(&state.store, doctor_id).await?;

    let availability = ScheduleService::new(state.store.clone())
        .replace_weekly_schedule(doctor_id, request.availability)
        .await?;

    Ok(Json(json!({
        "message": "Weekly schedule updated",
        "doctor_id": doctor_id,
        "availability": availability,
    })))
}

#[axum::debug_handler]
pub async fn create_exception(
    State(state): State<AvailabilityState>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<Uuid>,
    Json(request): Json<CreateExceptionRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    ensure_can_manage(&user, doctor_id)?;
    ensure_doctor_exists(&state.store, doctor_id).await?;

    let exception = ScheduleService::new(state.store.clone())
        .create_exception(doctor_id, request)
        .await?;

    Ok((StatusCode::CREATED, Json(json!(exception))))
}

#[axum::debug_handler]
pub async fn delete_exception(
    State(state): State<AvailabilityState>,
    Extension(user): Extension<User>,
    Path(exception_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = ScheduleService::new(state.store.clone());

    let exception = service.get_exception(exception_id).await?;
    ensure_can_manage(&user, exception.doctor_id)?;

    service.delete_exception(exception_id).await?;

    Ok(Json(json!({
        "message": "Availability exception deleted",
        "id": exception_id,
    })))
}
