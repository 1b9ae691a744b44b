use axum::extract::{Path, State};
use axum::Json;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use database_layer::{Wallet, WalletTransaction};
use wallet_service::LedgerVerification;

use crate::error::{api_success, ApiError, ApiResponse};
use crate::server::ClinicFlowServer;

#[derive(Debug, Deserialize)]
pub struct DebitRequest {
    pub amount: Decimal,
    pub description: String,
    pub related_appointment_id: Option<Uuid>,
}

pub async fn get_wallet(
    State(server): State<ClinicFlowServer>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Wallet>>, ApiError> {
    let wallet = server.ledger.wallet(patient_id).await?;
    Ok(Json(api_success(wallet)))
}

/// Full transaction history, oldest first.
pub async fn wallet_history(
    State(server): State<ClinicFlowServer>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<WalletTransaction>>>, ApiError> {
    let history = server.ledger.history(patient_id).await?;
    Ok(Json(api_success(history)))
}

/// Spend wallet balance, e.g. toward a future consultation fee.
pub async fn debit_wallet(
    State(server): State<ClinicFlowServer>,
    Path(patient_id): Path<Uuid>,
    Json(request): Json<DebitRequest>,
) -> Result<Json<ApiResponse<WalletTransaction>>, ApiError> {
    if request.amount <= Decimal::ZERO {
        return Err(ApiError::BadRequest(
            "debit amount must be positive".to_string(),
        ));
    }

    let entry = server
        .ledger
        .debit(
            patient_id,
            request.amount,
            &request.description,
            request.related_appointment_id,
        )
        .await?;
    Ok(Json(api_success(entry)))
}

/// Admin consistency check: replay the ledger against the stored balance.
pub async fn verify_wallet(
    State(server): State<ClinicFlowServer>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<ApiResponse<LedgerVerification>>, ApiError> {
    let verification = server.ledger.verify(patient_id).await?;
    Ok(Json(api_success(verification)))
}
