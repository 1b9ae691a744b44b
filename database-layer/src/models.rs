use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A bounded consultation window for one doctor at one clinic on one date.
///
/// Once `cancel_reason` is set the schedule is terminal: `is_active` is
/// false and no new tokens may be allocated against it. Schedules that have
/// appointments are never physically deleted.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Schedule {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub clinic_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    /// Capacity limit; 0 means unlimited.
    pub max_tokens: i32,
    pub is_active: bool,
    pub cancel_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Schedule {
    /// A schedule accepts new tokens only while active and not cancelled.
    pub fn is_open(&self) -> bool {
        self.is_active && self.cancel_reason.is_none()
    }
}

/// Input for creating a schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSchedule {
    pub doctor_id: Uuid,
    pub clinic_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub max_tokens: i32,
}

/// Lifecycle states of an appointment token.
///
/// `Completed`, `Cancel` and `NoShow` are terminal. The wire names match
/// the upstream booking data model (`start`, `cancel`, `no_show`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "appointment_status", rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Start,
    Hold,
    Pause,
    Completed,
    Cancel,
    NoShow,
}

impl AppointmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Cancel | AppointmentStatus::NoShow
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Start => "start",
            AppointmentStatus::Hold => "hold",
            AppointmentStatus::Pause => "pause",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancel => "cancel",
            AppointmentStatus::NoShow => "no_show",
        };
        write!(f, "{s}")
    }
}

impl FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(AppointmentStatus::Scheduled),
            "start" => Ok(AppointmentStatus::Start),
            "hold" => Ok(AppointmentStatus::Hold),
            "pause" => Ok(AppointmentStatus::Pause),
            "completed" => Ok(AppointmentStatus::Completed),
            "cancel" => Ok(AppointmentStatus::Cancel),
            "no_show" => Ok(AppointmentStatus::NoShow),
            other => Err(format!("unknown appointment status: {other}")),
        }
    }
}

/// One booked consultation token within a schedule.
///
/// `token_number` is unique and strictly increasing within the schedule,
/// assigned at creation and never reused or renumbered.
/// `patient_id == None` marks a walk-in guest; walk-ins can never receive a
/// wallet refund. `has_been_refunded == true` implies `refund_amount` is set
/// and `is_eligible_for_refund` is false from then on.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Appointment {
    pub id: Uuid,
    pub schedule_id: Uuid,
    pub doctor_id: Uuid,
    pub clinic_id: Uuid,
    pub patient_id: Option<Uuid>,
    pub guest_name: Option<String>,
    pub token_number: i32,
    pub status: AppointmentStatus,
    pub status_notes: Option<String>,
    pub consultation_fee: Decimal,
    pub is_paid: bool,
    pub is_walk_in: bool,
    pub has_been_refunded: bool,
    pub refund_amount: Option<Decimal>,
    pub is_eligible_for_refund: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for allocating a token. Exactly one of `patient_id` / `guest_name`
/// identifies the holder; payment confirmation is supplied by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAppointment {
    pub schedule_id: Uuid,
    pub patient_id: Option<Uuid>,
    pub guest_name: Option<String>,
    pub consultation_fee: Decimal,
    pub is_paid: bool,
}

/// Fields applied by a status compare-and-set.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub status: AppointmentStatus,
    pub status_notes: Option<String>,
    /// When `Some`, overwrites the refund-eligibility flag in the same
    /// atomic update as the status change.
    pub is_eligible_for_refund: Option<bool>,
}

/// Per-patient internal balance used for platform-fee refunds.
///
/// `balance == total_earned - total_spent` holds at all times; debits are
/// validated against the current balance before commit.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Wallet {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub balance: Decimal,
    pub total_earned: Decimal,
    pub total_spent: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Kind of money movement recorded in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "wallet_transaction_type", rename_all = "snake_case")]
pub enum TransactionType {
    Refund,
    Debit,
}

/// Append-only wallet ledger entry. Entries are written in their final
/// state and never edited retroactively.
///
/// `new_balance` is the wallet balance immediately after this entry was
/// applied; entries ordered by `created_at` form a consistent running total.
/// `related_appointment_id` links refunds to appointments and enforces at
/// most one refund entry per appointment.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct WalletTransaction {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub is_credit: bool,
    pub new_balance: Decimal,
    pub description: String,
    pub related_appointment_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Read filter for the export/report collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportQuery {
    pub schedule_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub clinic_id: Option<Uuid>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
}
