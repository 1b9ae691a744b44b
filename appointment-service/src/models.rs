use chrono::NaiveDate;
use database_layer::AppointmentStatus;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Booking request for one token. `patient_id` for registered patients,
/// `guest_name` for walk-ins; exactly one must be present. Payment
/// confirmation (`is_paid`, `consultation_fee`) comes from the upstream
/// payment collaborator and is trusted as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocateTokenRequest {
    pub schedule_id: Uuid,
    pub patient_id: Option<Uuid>,
    pub guest_name: Option<String>,
    pub consultation_fee: Decimal,
    pub is_paid: bool,
}

/// Status change request for one appointment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRequest {
    pub status: AppointmentStatus,
    pub notes: Option<String>,
}

/// Patient-facing queue snapshot for one doctor/clinic pair on one day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueProgress {
    /// Token currently in `start`, or the highest completed token if no
    /// consultation is running. `None` before the first consultation.
    pub current_token: Option<i32>,
    /// Status of the appointment holding `current_token`.
    pub status: Option<AppointmentStatus>,
    /// Walk-in tokens still waiting today, tracked separately from the
    /// registered queue.
    pub walk_in_patients: i64,
}

/// How many tokens stand between the serving position and one patient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokensAhead {
    pub current_token: Option<i32>,
    pub patient_token: i32,
    /// Unresolved tokens (scheduled, hold or pause) strictly between the
    /// current token and the patient's. Held and paused tokens stay in the
    /// count until they resolve.
    pub tokens_ahead: i64,
    pub walk_ins_waiting: i64,
}

/// Per-doctor/day roll-up for staff dashboards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorDayStats {
    pub doctor_id: Uuid,
    pub clinic_id: Uuid,
    pub date: NaiveDate,
    pub total_tokens: i64,
    pub completed: i64,
    pub cancelled: i64,
    pub no_show: i64,
    pub walk_ins: i64,
    pub refunded: i64,
    pub total_refunded_amount: Decimal,
    /// Fees of completed consultations.
    pub revenue: Decimal,
}
