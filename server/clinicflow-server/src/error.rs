use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use appointment_service::AppointmentError;
use database_layer::StoreError;
use wallet_service::WalletError;

/// Standard success envelope for every JSON endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

pub fn api_success<T>(data: T) -> ApiResponse<T> {
    ApiResponse {
        success: true,
        data,
    }
}

/// HTTP-facing error. Domain errors map onto it via `From` so handlers can
/// use `?` directly on service calls.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unprocessable(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code for API clients.
    fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::Unprocessable(_) => "unprocessable",
            ApiError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Internal details stay in the logs, never in the response body.
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self, "Internal server error");
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = Json(json!({
            "success": false,
            "error": {
                "code": self.code(),
                "message": message,
            },
        }));
        (status, body).into_response()
    }
}

impl From<AppointmentError> for ApiError {
    fn from(err: AppointmentError) -> Self {
        match &err {
            AppointmentError::Validation(_) => ApiError::BadRequest(err.to_string()),
            AppointmentError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            AppointmentError::ScheduleClosed { .. }
            | AppointmentError::DuplicateBooking { .. }
            | AppointmentError::ConcurrencyConflict(_) => ApiError::Conflict(err.to_string()),
            AppointmentError::InvalidTransition { .. } => ApiError::Unprocessable(err.to_string()),
            AppointmentError::Store(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<WalletError> for ApiError {
    fn from(err: WalletError) -> Self {
        match &err {
            WalletError::NotFound { .. } | WalletError::WalletMissing { .. } => {
                ApiError::NotFound(err.to_string())
            }
            WalletError::AlreadyRefunded { .. } => ApiError::Conflict(err.to_string()),
            WalletError::NotEligible { .. }
            | WalletError::WalkInNotRefundable { .. }
            | WalletError::WalletInactive { .. }
            | WalletError::InsufficientBalance { .. } => ApiError::Unprocessable(err.to_string()),
            WalletError::Store(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match &err {
            StoreError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            StoreError::ScheduleClosed { .. }
            | StoreError::ScheduleFull { .. }
            | StoreError::DuplicateBooking { .. }
            | StoreError::AlreadyRefunded { .. }
            | StoreError::ConcurrencyConflict(_) => ApiError::Conflict(err.to_string()),
            StoreError::NotEligible { .. }
            | StoreError::WalletMissing { .. }
            | StoreError::WalletInactive { .. }
            | StoreError::InsufficientBalance { .. } => ApiError::Unprocessable(err.to_string()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}
