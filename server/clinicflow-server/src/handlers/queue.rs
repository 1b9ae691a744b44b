use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;

use appointment_service::{QueueProgress, TokensAhead};

use crate::error::{api_success, ApiError, ApiResponse};
use crate::server::ClinicFlowServer;

#[derive(Debug, Deserialize)]
pub struct QueueParams {
    pub doctor_id: Uuid,
    pub clinic_id: Uuid,
    /// Defaults to today when omitted.
    pub date: Option<NaiveDate>,
}

/// Live queue position for one doctor/clinic pair, polled by patients.
pub async fn queue_progress(
    State(server): State<ClinicFlowServer>,
    Query(params): Query<QueueParams>,
) -> Result<Json<ApiResponse<QueueProgress>>, ApiError> {
    let date = params.date.unwrap_or_else(|| Utc::now().date_naive());
    let progress = server
        .queue
        .progress(params.doctor_id, params.clinic_id, date)
        .await?;
    Ok(Json(api_success(progress)))
}

/// How many unresolved tokens stand before this appointment.
pub async fn tokens_ahead(
    State(server): State<ClinicFlowServer>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<ApiResponse<TokensAhead>>, ApiError> {
    let ahead = server.queue.tokens_ahead(appointment_id).await?;
    Ok(Json(api_success(ahead)))
}
