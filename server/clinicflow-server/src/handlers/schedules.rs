use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use database_layer::{Appointment, NewSchedule, Schedule};
use wallet_service::ScheduleCancellationReport;

use crate::error::{api_success, ApiError, ApiResponse};
use crate::server::ClinicFlowServer;

#[derive(Debug, Deserialize)]
pub struct ScheduleListParams {
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct CancelScheduleRequest {
    pub reason: String,
}

/// Create a consultation schedule for a doctor at a clinic.
pub async fn create_schedule(
    State(server): State<ClinicFlowServer>,
    Json(request): Json<NewSchedule>,
) -> Result<Json<ApiResponse<Schedule>>, ApiError> {
    if request.start_time >= request.end_time {
        return Err(ApiError::BadRequest(
            "start_time must be before end_time".to_string(),
        ));
    }
    if request.max_tokens < 0 {
        return Err(ApiError::BadRequest(
            "max_tokens must be zero or positive".to_string(),
        ));
    }

    let schedule = server.store.create_schedule(request).await?;
    Ok(Json(api_success(schedule)))
}

pub async fn get_schedule(
    State(server): State<ClinicFlowServer>,
    Path(schedule_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Schedule>>, ApiError> {
    match server.store.schedule(schedule_id).await? {
        Some(schedule) => Ok(Json(api_success(schedule))),
        None => Err(ApiError::NotFound(format!(
            "schedule {schedule_id} not found"
        ))),
    }
}

pub async fn list_doctor_schedules(
    State(server): State<ClinicFlowServer>,
    Path(doctor_id): Path<Uuid>,
    Query(params): Query<ScheduleListParams>,
) -> Result<Json<ApiResponse<Vec<Schedule>>>, ApiError> {
    let schedules = server
        .store
        .schedules_for_doctor(doctor_id, params.date)
        .await?;
    Ok(Json(api_success(schedules)))
}

/// All tokens on one schedule, in token-number order.
pub async fn list_schedule_appointments(
    State(server): State<ClinicFlowServer>,
    Path(schedule_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<Appointment>>>, ApiError> {
    let appointments = server.store.appointments_for_schedule(schedule_id).await?;
    Ok(Json(api_success(appointments)))
}

/// Cancel a schedule (doctor leave, clinic closure) and refund every
/// eligible token on it. Returns the per-appointment outcome report.
pub async fn cancel_schedule(
    State(server): State<ClinicFlowServer>,
    Path(schedule_id): Path<Uuid>,
    Json(request): Json<CancelScheduleRequest>,
) -> Result<Json<ApiResponse<ScheduleCancellationReport>>, ApiError> {
    if request.reason.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "a cancellation reason is required".to_string(),
        ));
    }

    let report = server
        .refunds
        .cancel_schedule_with_refunds(schedule_id, &request.reason)
        .await?;
    Ok(Json(api_success(report)))
}
