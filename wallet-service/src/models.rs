use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One appointment skipped during a bulk cancellation, with a
/// human-readable reason for the staff dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedRefund {
    pub appointment_id: Uuid,
    pub reason: String,
}

/// Aggregate result of `cancel_schedule_with_refunds`. One appointment's
/// failure never aborts the rest; failures land in `skipped` and the
/// aggregate still reports every refund that committed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleCancellationReport {
    pub schedule_id: Uuid,
    pub refunded_appointments: i64,
    pub total_refund_amount: Decimal,
    pub skipped: Vec<SkippedRefund>,
}

/// Result of replaying a wallet's transaction log against its balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerVerification {
    pub wallet_id: Uuid,
    pub transactions_replayed: usize,
    pub consistent: bool,
    pub issues: Vec<String>,
}
