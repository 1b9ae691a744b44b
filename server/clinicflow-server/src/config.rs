use rust_decimal::Decimal;
use std::str::FromStr;

/// Server configuration, read from the environment at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server name reported by the health endpoints.
    pub name: String,
    /// Address the HTTP listener binds to.
    pub bind_addr: String,
    /// Postgres connection string. Absent means the server cannot start
    /// against a real database (the in-memory store is for tests only).
    pub database_url: Option<String>,
    /// Maximum connections in the database pool.
    pub max_db_connections: u32,
    /// Refund credited when an appointment carries no usable fee.
    pub default_consultation_fee: Decimal,
    /// Capacity of the in-process domain event channel.
    pub event_channel_capacity: usize,
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to
    /// development defaults for everything except `DATABASE_URL`.
    pub fn from_env() -> Self {
        Self {
            name: std::env::var("CLINICFLOW_SERVER_NAME")
                .unwrap_or_else(|_| "ClinicFlow Engine".to_string()),
            bind_addr: std::env::var("CLINICFLOW_BIND_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            database_url: std::env::var("DATABASE_URL").ok(),
            max_db_connections: std::env::var("CLINICFLOW_MAX_DB_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(20),
            default_consultation_fee: std::env::var("CLINICFLOW_DEFAULT_CONSULTATION_FEE")
                .ok()
                .and_then(|s| Decimal::from_str(&s).ok())
                .unwrap_or_else(|| Decimal::new(300, 0)),
            event_channel_capacity: std::env::var("CLINICFLOW_EVENT_CHANNEL_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(256),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "ClinicFlow Engine".to_string(),
            bind_addr: "0.0.0.0:8080".to_string(),
            database_url: None,
            max_db_connections: 20,
            default_consultation_fee: Decimal::new(300, 0),
            event_channel_capacity: 256,
        }
    }
}
