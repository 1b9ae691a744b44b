use axum::extract::{Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use appointment_service::DoctorDayStats;
use database_layer::{Appointment, ReportQuery};

use crate::error::{api_success, ApiError, ApiResponse};
use crate::server::ClinicFlowServer;

#[derive(Debug, Deserialize)]
pub struct DayStatsParams {
    pub doctor_id: Uuid,
    pub clinic_id: Uuid,
    pub date: NaiveDate,
}

/// Appointment rows for the export collaborator, filtered by schedule,
/// doctor, clinic or date range.
pub async fn appointments_report(
    State(server): State<ClinicFlowServer>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<ApiResponse<Vec<Appointment>>>, ApiError> {
    let appointments = server.reports.appointments(&query).await?;
    Ok(Json(api_success(appointments)))
}

/// Per-doctor/day roll-up for staff dashboards.
pub async fn doctor_day_report(
    State(server): State<ClinicFlowServer>,
    Query(params): Query<DayStatsParams>,
) -> Result<Json<ApiResponse<DoctorDayStats>>, ApiError> {
    let stats = server
        .reports
        .doctor_day_stats(params.doctor_id, params.clinic_id, params.date)
        .await?;
    Ok(Json(api_success(stats)))
}
