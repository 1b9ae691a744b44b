// The persistence contract every booking operation runs against.
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::StoreResult;
use crate::models::{
    Appointment, NewAppointment, NewSchedule, ReportQuery, Schedule, StatusUpdate, Wallet,
    WalletTransaction,
};

/// Atomic persistence operations for schedules, appointments and wallets.
///
/// Implementations must scope their serialisation to the affected rows only:
/// the schedule row for token allocation, the appointment + wallet pair for
/// refunds. Unrelated schedules and wallets never block each other.
#[async_trait]
pub trait BookingStore: Send + Sync {
    // ------------------------------------------------------------------
    // Schedules
    // ------------------------------------------------------------------

    async fn create_schedule(&self, new: NewSchedule) -> StoreResult<Schedule>;

    async fn schedule(&self, id: Uuid) -> StoreResult<Option<Schedule>>;

    async fn schedules_for_doctor(
        &self,
        doctor_id: Uuid,
        date: Option<NaiveDate>,
    ) -> StoreResult<Vec<Schedule>>;

    /// Mark a schedule terminal: `is_active = false` with the given cancel
    /// reason. Idempotent; an already-closed schedule keeps its original
    /// reason and is returned unchanged.
    async fn close_schedule(&self, id: Uuid, cancel_reason: &str) -> StoreResult<Schedule>;

    // ------------------------------------------------------------------
    // Appointments
    // ------------------------------------------------------------------

    /// Allocate the next sequential token on a schedule.
    ///
    /// Serialises on the schedule so concurrent calls never produce the same
    /// `token_number`, and enforces inside the same unit: the schedule is
    /// open, capacity is not exhausted (`max_tokens > 0`), and a registered
    /// patient does not already hold a live (non-cancelled) token on the
    /// schedule.
    async fn allocate_token(&self, new: NewAppointment) -> StoreResult<Appointment>;

    async fn appointment(&self, id: Uuid) -> StoreResult<Option<Appointment>>;

    async fn appointments_for_schedule(&self, schedule_id: Uuid) -> StoreResult<Vec<Appointment>>;

    /// All appointments for one doctor/clinic pair on one date, ordered by
    /// token number. Backs the queue progress projection.
    async fn appointments_for_day(
        &self,
        doctor_id: Uuid,
        clinic_id: Uuid,
        date: NaiveDate,
    ) -> StoreResult<Vec<Appointment>>;

    /// Read-only query for the export/report collaborator.
    async fn appointments_in_range(&self, query: &ReportQuery) -> StoreResult<Vec<Appointment>>;

    /// Compare-and-set status update. Applies `update` only if the row's
    /// current status equals `expected`; otherwise fails with
    /// `ConcurrencyConflict` so the caller can re-read and re-validate.
    async fn update_status(
        &self,
        id: Uuid,
        expected: crate::models::AppointmentStatus,
        update: StatusUpdate,
    ) -> StoreResult<Appointment>;

    // ------------------------------------------------------------------
    // Wallets and the refund ledger
    // ------------------------------------------------------------------

    async fn wallet_for_patient(&self, patient_id: Uuid) -> StoreResult<Option<Wallet>>;

    async fn wallet_transactions(&self, wallet_id: Uuid) -> StoreResult<Vec<WalletTransaction>>;

    /// Credit a refund for an appointment, all-or-nothing.
    ///
    /// In one atomic unit: flips `has_been_refunded false -> true` (aborting
    /// with `AlreadyRefunded` if it was already true, `NotEligible` if the
    /// eligibility flag is unset or the token belongs to a guest), records
    /// `refund_amount`, clears `is_eligible_for_refund`, credits the
    /// patient's wallet and appends the ledger entry with the resulting
    /// balance. The wallet is created on first credit; an inactive wallet
    /// aborts with `WalletInactive` and leaves the appointment untouched.
    async fn apply_refund(
        &self,
        appointment_id: Uuid,
        amount: Decimal,
        description: &str,
    ) -> StoreResult<WalletTransaction>;

    /// Debit a patient's wallet, validating the balance in the same unit so
    /// it can never go negative.
    async fn debit_wallet(
        &self,
        patient_id: Uuid,
        amount: Decimal,
        description: &str,
        related_appointment_id: Option<Uuid>,
    ) -> StoreResult<WalletTransaction>;
}
