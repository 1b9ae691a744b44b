use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::{appointments, health, queue, reports, schedules, wallets};
use crate::server::ClinicFlowServer;

/// Create health check routes
pub fn health_routes() -> Router<ClinicFlowServer> {
    Router::new().route("/health", get(health::health_check))
}

/// Create schedule management routes
pub fn schedule_routes() -> Router<ClinicFlowServer> {
    Router::new()
        .route("/schedules", post(schedules::create_schedule))
        .route("/schedules/:id", get(schedules::get_schedule))
        .route(
            "/schedules/:id/appointments",
            get(schedules::list_schedule_appointments),
        )
        .route("/schedules/:id/cancel", post(schedules::cancel_schedule))
        .route(
            "/doctors/:id/schedules",
            get(schedules::list_doctor_schedules),
        )
}

/// Create appointment booking and lifecycle routes
pub fn appointment_routes() -> Router<ClinicFlowServer> {
    Router::new()
        .route("/appointments", post(appointments::book_appointment))
        .route("/appointments/:id", get(appointments::get_appointment))
        .route(
            "/appointments/:id/status",
            put(appointments::update_appointment_status),
        )
        .route(
            "/appointments/:id/refund",
            post(appointments::refund_appointment),
        )
        .route("/appointments/:id/tokens-ahead", get(queue::tokens_ahead))
}

/// Create patient-facing queue routes
pub fn queue_routes() -> Router<ClinicFlowServer> {
    Router::new().route("/queue/progress", get(queue::queue_progress))
}

/// Create wallet routes
pub fn wallet_routes() -> Router<ClinicFlowServer> {
    Router::new()
        .route("/wallets/:patient_id", get(wallets::get_wallet))
        .route(
            "/wallets/:patient_id/transactions",
            get(wallets::wallet_history),
        )
        .route("/wallets/:patient_id/debit", post(wallets::debit_wallet))
        .route("/wallets/:patient_id/verify", get(wallets::verify_wallet))
}

/// Create report routes
pub fn report_routes() -> Router<ClinicFlowServer> {
    Router::new()
        .route("/reports/appointments", get(reports::appointments_report))
        .route("/reports/doctor-day", get(reports::doctor_day_report))
}

/// Create API v1 routes
pub fn api_v1_routes() -> Router<ClinicFlowServer> {
    Router::new()
        .merge(schedule_routes())
        .merge(appointment_routes())
        .merge(queue_routes())
        .merge(wallet_routes())
        .merge(report_routes())
}

/// Create all application routes
pub fn create_routes() -> Router<ClinicFlowServer> {
    Router::new()
        .merge(health_routes())
        .nest("/api/v1", api_v1_routes())
}
