//! ClinicFlow Server - HTTP API for the appointment booking engine
//!
//! Exposes token allocation, appointment lifecycle transitions, wallet
//! refunds, queue progress and reporting over a JSON REST surface.

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;

// Re-export commonly used types
pub use config::ServerConfig;
pub use error::{api_success, ApiError, ApiResponse};
pub use server::ClinicFlowServer;

use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// CORS policy for the booking frontends.
fn create_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Create the main application router with all routes and middleware
pub fn create_app(server: ClinicFlowServer) -> Router {
    routes::create_routes()
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer()),
        )
        .with_state(server)
}
