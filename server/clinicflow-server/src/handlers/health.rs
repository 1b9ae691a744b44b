use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::collections::HashMap;

use crate::error::{api_success, ApiError, ApiResponse};
use crate::server::ClinicFlowServer;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub version: String,
    pub checks: HashMap<String, String>,
}

/// Health check handler
pub async fn health_check(
    State(server): State<ClinicFlowServer>,
) -> Result<Json<ApiResponse<HealthResponse>>, ApiError> {
    let database_healthy = server.is_database_healthy().await;

    let mut checks = HashMap::new();
    checks.insert(
        "database".to_string(),
        if database_healthy { "healthy" } else { "unhealthy" }.to_string(),
    );

    let response = HealthResponse {
        status: if database_healthy { "healthy" } else { "degraded" }.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks,
    };

    Ok(Json(api_success(response)))
}
