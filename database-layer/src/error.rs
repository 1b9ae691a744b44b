use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by [`crate::store::BookingStore`] implementations.
///
/// The domain variants are part of the store contract: conditions such as
/// `AlreadyRefunded` or `ScheduleFull` are detected inside the same atomic
/// unit that would have performed the mutation, never by a separate
/// read-then-write pass.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("schedule {schedule_id} is closed and no longer accepts tokens")]
    ScheduleClosed { schedule_id: Uuid },

    #[error("schedule {schedule_id} is full ({max_tokens} tokens)")]
    ScheduleFull { schedule_id: Uuid, max_tokens: i32 },

    #[error("patient {patient_id} already holds a live token on schedule {schedule_id}")]
    DuplicateBooking {
        schedule_id: Uuid,
        patient_id: Uuid,
    },

    #[error("appointment {appointment_id} has already been refunded")]
    AlreadyRefunded { appointment_id: Uuid },

    #[error("appointment {appointment_id} is not eligible for a refund")]
    NotEligible { appointment_id: Uuid },

    #[error("no wallet exists for patient {patient_id}")]
    WalletMissing { patient_id: Uuid },

    #[error("wallet for patient {patient_id} is inactive")]
    WalletInactive { patient_id: Uuid },

    #[error("wallet {wallet_id} balance {balance} cannot cover debit of {amount}")]
    InsufficientBalance {
        wallet_id: Uuid,
        balance: Decimal,
        amount: Decimal,
    },

    #[error("concurrent update conflict: {0}")]
    ConcurrencyConflict(String),

    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;
