use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use appointment_service::{AllocateTokenRequest, TransitionRequest};
use database_layer::{Appointment, WalletTransaction};

use crate::error::{api_success, ApiError, ApiResponse};
use crate::server::ClinicFlowServer;

#[derive(Debug, Deserialize)]
pub struct RefundRequest {
    pub reason: String,
}

/// Book a token for a registered patient or a walk-in guest.
pub async fn book_appointment(
    State(server): State<ClinicFlowServer>,
    Json(request): Json<AllocateTokenRequest>,
) -> Result<Json<ApiResponse<Appointment>>, ApiError> {
    let appointment = server.allocator.allocate(request).await?;
    Ok(Json(api_success(appointment)))
}

pub async fn get_appointment(
    State(server): State<ClinicFlowServer>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Appointment>>, ApiError> {
    match server.store.appointment(appointment_id).await? {
        Some(appointment) => Ok(Json(api_success(appointment))),
        None => Err(ApiError::NotFound(format!(
            "appointment {appointment_id} not found"
        ))),
    }
}

/// Move an appointment through the status graph.
pub async fn update_appointment_status(
    State(server): State<ClinicFlowServer>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<TransitionRequest>,
) -> Result<Json<ApiResponse<Appointment>>, ApiError> {
    let appointment = server.lifecycle.transition(appointment_id, request).await?;
    Ok(Json(api_success(appointment)))
}

/// Refund one cancelled appointment to the patient's wallet.
pub async fn refund_appointment(
    State(server): State<ClinicFlowServer>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<RefundRequest>,
) -> Result<Json<ApiResponse<WalletTransaction>>, ApiError> {
    let entry = server
        .refunds
        .refund_appointment(appointment_id, &request.reason)
        .await?;
    Ok(Json(api_success(entry)))
}
