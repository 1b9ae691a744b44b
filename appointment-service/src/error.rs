use database_layer::{AppointmentStatus, StoreError};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("schedule {schedule_id} is closed or full")]
    ScheduleClosed { schedule_id: Uuid },

    #[error("patient {patient_id} already holds a live token on schedule {schedule_id}")]
    DuplicateBooking {
        schedule_id: Uuid,
        patient_id: Uuid,
    },

    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("operation lost a concurrent update race: {0}")]
    ConcurrencyConflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for AppointmentError {
    fn from(err: StoreError) -> Self {
        match err {
            // A full schedule surfaces to callers the same way as a closed
            // one: the token cannot be issued, try another schedule.
            StoreError::ScheduleClosed { schedule_id }
            | StoreError::ScheduleFull { schedule_id, .. } => {
                AppointmentError::ScheduleClosed { schedule_id }
            }
            StoreError::DuplicateBooking {
                schedule_id,
                patient_id,
            } => AppointmentError::DuplicateBooking {
                schedule_id,
                patient_id,
            },
            StoreError::NotFound { entity, id } => AppointmentError::NotFound { entity, id },
            StoreError::ConcurrencyConflict(msg) => AppointmentError::ConcurrencyConflict(msg),
            other => AppointmentError::Store(other),
        }
    }
}

pub type AppointmentResult<T> = Result<T, AppointmentError>;
