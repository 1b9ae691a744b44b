use database_layer::StoreError;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum WalletError {
    #[error("appointment {appointment_id} has already been refunded")]
    AlreadyRefunded { appointment_id: Uuid },

    #[error("appointment {appointment_id} is not eligible for a refund")]
    NotEligible { appointment_id: Uuid },

    #[error("appointment {appointment_id} is a walk-in booking with no wallet")]
    WalkInNotRefundable { appointment_id: Uuid },

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

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("Storage error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for WalletError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AlreadyRefunded { appointment_id } => {
                WalletError::AlreadyRefunded { appointment_id }
            }
            StoreError::NotEligible { appointment_id } => {
                WalletError::NotEligible { appointment_id }
            }
            StoreError::WalletMissing { patient_id } => WalletError::WalletMissing { patient_id },
            StoreError::WalletInactive { patient_id } => {
                WalletError::WalletInactive { patient_id }
            }
            StoreError::InsufficientBalance {
                wallet_id,
                balance,
                amount,
            } => WalletError::InsufficientBalance {
                wallet_id,
                balance,
                amount,
            },
            StoreError::NotFound { entity, id } => WalletError::NotFound { entity, id },
            other => WalletError::Store(other),
        }
    }
}

pub type WalletResult<T> = Result<T, WalletError>;
