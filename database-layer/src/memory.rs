// In-memory implementation of the BookingStore contract.
//
// Used by tests and local development. Serialisation mirrors the Postgres
// backend at the same granularity: a mutex per schedule for allocation and
// a mutex per patient wallet for ledger writes, never a store-wide lock
// around unrelated rows. No lock is ever held across an await point.
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::models::{
    Appointment, AppointmentStatus, NewAppointment, NewSchedule, ReportQuery, Schedule,
    StatusUpdate, TransactionType, Wallet, WalletTransaction,
};
use crate::store::BookingStore;

#[derive(Default)]
pub struct MemoryStore {
    schedules: RwLock<HashMap<Uuid, Schedule>>,
    appointments: RwLock<HashMap<Uuid, Appointment>>,
    wallets: RwLock<HashMap<Uuid, Wallet>>,
    /// patient_id -> wallet_id
    wallet_ids: RwLock<HashMap<Uuid, Uuid>>,
    transactions: RwLock<Vec<WalletTransaction>>,
    schedule_locks: DashMap<Uuid, Arc<Mutex<()>>>,
    wallet_locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn schedule_lock(&self, schedule_id: Uuid) -> Arc<Mutex<()>> {
        self.schedule_locks
            .entry(schedule_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn wallet_lock(&self, patient_id: Uuid) -> Arc<Mutex<()>> {
        self.wallet_locks
            .entry(patient_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Fetch or lazily create the wallet for a patient. Callers must hold
    /// the patient's wallet lock.
    fn wallet_for_patient_locked(&self, patient_id: Uuid) -> Wallet {
        if let Some(wallet_id) = self.wallet_ids.read().get(&patient_id) {
            if let Some(wallet) = self.wallets.read().get(wallet_id) {
                return wallet.clone();
            }
        }

        let now = Utc::now();
        let wallet = Wallet {
            id: Uuid::new_v4(),
            patient_id,
            balance: Decimal::ZERO,
            total_earned: Decimal::ZERO,
            total_spent: Decimal::ZERO,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.wallet_ids.write().insert(patient_id, wallet.id);
        self.wallets.write().insert(wallet.id, wallet.clone());
        debug!(patient_id = %patient_id, wallet_id = %wallet.id, "Created wallet on first credit");
        wallet
    }

    /// Toggle a wallet active/inactive. Test and operations hook; the
    /// booking engine itself never deactivates wallets.
    pub fn set_wallet_active(&self, patient_id: Uuid, is_active: bool) -> StoreResult<()> {
        let wallet_id = self
            .wallet_ids
            .read()
            .get(&patient_id)
            .copied()
            .ok_or(StoreError::WalletMissing { patient_id })?;
        let mut wallets = self.wallets.write();
        let wallet = wallets
            .get_mut(&wallet_id)
            .ok_or(StoreError::WalletMissing { patient_id })?;
        wallet.is_active = is_active;
        wallet.updated_at = Utc::now();
        Ok(())
    }

    /// Pre-provision a wallet, e.g. when registering a patient.
    pub fn provision_wallet(&self, patient_id: Uuid) -> Wallet {
        let lock = self.wallet_lock(patient_id);
        let _guard = lock.lock();
        self.wallet_for_patient_locked(patient_id)
    }

    fn append_transaction(
        &self,
        wallet_id: Uuid,
        transaction_type: TransactionType,
        amount: Decimal,
        is_credit: bool,
        new_balance: Decimal,
        description: &str,
        related_appointment_id: Option<Uuid>,
    ) -> WalletTransaction {
        let entry = WalletTransaction {
            id: Uuid::new_v4(),
            wallet_id,
            transaction_type,
            amount,
            is_credit,
            new_balance,
            description: description.to_string(),
            related_appointment_id,
            created_at: Utc::now(),
        };
        self.transactions.write().push(entry.clone());
        entry
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn create_schedule(&self, new: NewSchedule) -> StoreResult<Schedule> {
        let schedule = Schedule {
            id: Uuid::new_v4(),
            doctor_id: new.doctor_id,
            clinic_id: new.clinic_id,
            date: new.date,
            start_time: new.start_time,
            end_time: new.end_time,
            max_tokens: new.max_tokens,
            is_active: true,
            cancel_reason: None,
            created_at: Utc::now(),
        };
        self.schedules.write().insert(schedule.id, schedule.clone());
        Ok(schedule)
    }

    async fn schedule(&self, id: Uuid) -> StoreResult<Option<Schedule>> {
        Ok(self.schedules.read().get(&id).cloned())
    }

    async fn schedules_for_doctor(
        &self,
        doctor_id: Uuid,
        date: Option<NaiveDate>,
    ) -> StoreResult<Vec<Schedule>> {
        let mut schedules: Vec<Schedule> = self
            .schedules
            .read()
            .values()
            .filter(|s| s.doctor_id == doctor_id && date.map_or(true, |d| s.date == d))
            .cloned()
            .collect();
        schedules.sort_by_key(|s| (s.date, s.start_time));
        Ok(schedules)
    }

    async fn close_schedule(&self, id: Uuid, cancel_reason: &str) -> StoreResult<Schedule> {
        let mut schedules = self.schedules.write();
        let schedule = schedules.get_mut(&id).ok_or(StoreError::NotFound {
            entity: "schedule",
            id,
        })?;
        if schedule.cancel_reason.is_none() {
            schedule.is_active = false;
            schedule.cancel_reason = Some(cancel_reason.to_string());
        }
        Ok(schedule.clone())
    }

    async fn allocate_token(&self, new: NewAppointment) -> StoreResult<Appointment> {
        let lock = self.schedule_lock(new.schedule_id);
        let _guard = lock.lock();

        let schedule = self
            .schedules
            .read()
            .get(&new.schedule_id)
            .cloned()
            .ok_or(StoreError::NotFound {
                entity: "schedule",
                id: new.schedule_id,
            })?;

        if !schedule.is_open() {
            return Err(StoreError::ScheduleClosed {
                schedule_id: schedule.id,
            });
        }

        let appointments = self.appointments.read();
        let issued = appointments
            .values()
            .filter(|a| a.schedule_id == schedule.id)
            .count() as i32;

        if schedule.max_tokens > 0 && issued >= schedule.max_tokens {
            return Err(StoreError::ScheduleFull {
                schedule_id: schedule.id,
                max_tokens: schedule.max_tokens,
            });
        }

        if let Some(patient_id) = new.patient_id {
            let duplicate = appointments.values().any(|a| {
                a.schedule_id == schedule.id
                    && a.patient_id == Some(patient_id)
                    && a.status != AppointmentStatus::Cancel
            });
            if duplicate {
                return Err(StoreError::DuplicateBooking {
                    schedule_id: schedule.id,
                    patient_id,
                });
            }
        }

        let next_token = appointments
            .values()
            .filter(|a| a.schedule_id == schedule.id)
            .map(|a| a.token_number)
            .max()
            .unwrap_or(0)
            + 1;
        drop(appointments);

        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            schedule_id: schedule.id,
            doctor_id: schedule.doctor_id,
            clinic_id: schedule.clinic_id,
            patient_id: new.patient_id,
            guest_name: new.guest_name,
            token_number: next_token,
            status: AppointmentStatus::Scheduled,
            status_notes: None,
            consultation_fee: new.consultation_fee,
            is_paid: new.is_paid,
            is_walk_in: new.patient_id.is_none(),
            has_been_refunded: false,
            refund_amount: None,
            is_eligible_for_refund: false,
            created_at: now,
            updated_at: now,
        };
        self.appointments
            .write()
            .insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn appointment(&self, id: Uuid) -> StoreResult<Option<Appointment>> {
        Ok(self.appointments.read().get(&id).cloned())
    }

    async fn appointments_for_schedule(&self, schedule_id: Uuid) -> StoreResult<Vec<Appointment>> {
        let mut appointments: Vec<Appointment> = self
            .appointments
            .read()
            .values()
            .filter(|a| a.schedule_id == schedule_id)
            .cloned()
            .collect();
        appointments.sort_by_key(|a| a.token_number);
        Ok(appointments)
    }

    async fn appointments_for_day(
        &self,
        doctor_id: Uuid,
        clinic_id: Uuid,
        date: NaiveDate,
    ) -> StoreResult<Vec<Appointment>> {
        let schedule_ids: Vec<Uuid> = self
            .schedules
            .read()
            .values()
            .filter(|s| s.date == date)
            .map(|s| s.id)
            .collect();

        let mut appointments: Vec<Appointment> = self
            .appointments
            .read()
            .values()
            .filter(|a| {
                a.doctor_id == doctor_id
                    && a.clinic_id == clinic_id
                    && schedule_ids.contains(&a.schedule_id)
            })
            .cloned()
            .collect();
        appointments.sort_by_key(|a| a.token_number);
        Ok(appointments)
    }

    async fn appointments_in_range(&self, query: &ReportQuery) -> StoreResult<Vec<Appointment>> {
        let schedule_dates: HashMap<Uuid, NaiveDate> = self
            .schedules
            .read()
            .values()
            .map(|s| (s.id, s.date))
            .collect();

        let mut appointments: Vec<Appointment> = self
            .appointments
            .read()
            .values()
            .filter(|a| {
                let date = schedule_dates.get(&a.schedule_id).copied();
                query.schedule_id.map_or(true, |id| a.schedule_id == id)
                    && query.doctor_id.map_or(true, |id| a.doctor_id == id)
                    && query.clinic_id.map_or(true, |id| a.clinic_id == id)
                    && query
                        .from_date
                        .map_or(true, |from| date.map_or(false, |d| d >= from))
                    && query
                        .to_date
                        .map_or(true, |to| date.map_or(false, |d| d <= to))
            })
            .cloned()
            .collect();
        appointments.sort_by_key(|a| {
            (
                schedule_dates.get(&a.schedule_id).copied(),
                a.schedule_id,
                a.token_number,
            )
        });
        Ok(appointments)
    }

    async fn update_status(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        update: StatusUpdate,
    ) -> StoreResult<Appointment> {
        let mut appointments = self.appointments.write();
        let appointment = appointments.get_mut(&id).ok_or(StoreError::NotFound {
            entity: "appointment",
            id,
        })?;

        if appointment.status != expected {
            return Err(StoreError::ConcurrencyConflict(format!(
                "appointment {id} moved from {expected} to {} during update",
                appointment.status
            )));
        }

        appointment.status = update.status;
        if update.status_notes.is_some() {
            appointment.status_notes = update.status_notes;
        }
        if let Some(eligible) = update.is_eligible_for_refund {
            appointment.is_eligible_for_refund = eligible;
        }
        appointment.updated_at = Utc::now();
        Ok(appointment.clone())
    }

    async fn wallet_for_patient(&self, patient_id: Uuid) -> StoreResult<Option<Wallet>> {
        let wallet_id = match self.wallet_ids.read().get(&patient_id) {
            Some(id) => *id,
            None => return Ok(None),
        };
        Ok(self.wallets.read().get(&wallet_id).cloned())
    }

    async fn wallet_transactions(&self, wallet_id: Uuid) -> StoreResult<Vec<WalletTransaction>> {
        Ok(self
            .transactions
            .read()
            .iter()
            .filter(|t| t.wallet_id == wallet_id)
            .cloned()
            .collect())
    }

    async fn apply_refund(
        &self,
        appointment_id: Uuid,
        amount: Decimal,
        description: &str,
    ) -> StoreResult<WalletTransaction> {
        let patient_id = {
            let appointments = self.appointments.read();
            let appointment =
                appointments
                    .get(&appointment_id)
                    .ok_or(StoreError::NotFound {
                        entity: "appointment",
                        id: appointment_id,
                    })?;
            if appointment.has_been_refunded {
                return Err(StoreError::AlreadyRefunded { appointment_id });
            }
            match appointment.patient_id {
                Some(patient_id) if appointment.is_eligible_for_refund => patient_id,
                _ => return Err(StoreError::NotEligible { appointment_id }),
            }
        };

        // Wallet lock held for the whole flip + credit + append sequence so
        // concurrent refunds to the same wallet keep a consistent running
        // balance in the ledger.
        let lock = self.wallet_lock(patient_id);
        let _guard = lock.lock();

        let wallet = self.wallet_for_patient_locked(patient_id);
        if !wallet.is_active {
            return Err(StoreError::WalletInactive { patient_id });
        }

        // Conditional flip under the table write lock: exactly one caller
        // ever sees has_been_refunded == false.
        {
            let mut appointments = self.appointments.write();
            let appointment =
                appointments
                    .get_mut(&appointment_id)
                    .ok_or(StoreError::NotFound {
                        entity: "appointment",
                        id: appointment_id,
                    })?;
            if appointment.has_been_refunded {
                return Err(StoreError::AlreadyRefunded { appointment_id });
            }
            if !appointment.is_eligible_for_refund {
                return Err(StoreError::NotEligible { appointment_id });
            }
            appointment.has_been_refunded = true;
            appointment.refund_amount = Some(amount);
            appointment.is_eligible_for_refund = false;
            appointment.updated_at = Utc::now();
        }

        let new_balance = {
            let mut wallets = self.wallets.write();
            let wallet = wallets
                .get_mut(&wallet.id)
                .ok_or(StoreError::WalletMissing { patient_id })?;
            wallet.balance += amount;
            wallet.total_earned += amount;
            wallet.updated_at = Utc::now();
            wallet.balance
        };

        Ok(self.append_transaction(
            wallet.id,
            TransactionType::Refund,
            amount,
            true,
            new_balance,
            description,
            Some(appointment_id),
        ))
    }

    async fn debit_wallet(
        &self,
        patient_id: Uuid,
        amount: Decimal,
        description: &str,
        related_appointment_id: Option<Uuid>,
    ) -> StoreResult<WalletTransaction> {
        let lock = self.wallet_lock(patient_id);
        let _guard = lock.lock();

        let wallet_id = self
            .wallet_ids
            .read()
            .get(&patient_id)
            .copied()
            .ok_or(StoreError::WalletMissing { patient_id })?;

        let new_balance = {
            let mut wallets = self.wallets.write();
            let wallet = wallets
                .get_mut(&wallet_id)
                .ok_or(StoreError::WalletMissing { patient_id })?;
            if !wallet.is_active {
                return Err(StoreError::WalletInactive { patient_id });
            }
            if wallet.balance < amount {
                return Err(StoreError::InsufficientBalance {
                    wallet_id,
                    balance: wallet.balance,
                    amount,
                });
            }
            wallet.balance -= amount;
            wallet.total_spent += amount;
            wallet.updated_at = Utc::now();
            wallet.balance
        };

        Ok(self.append_transaction(
            wallet_id,
            TransactionType::Debit,
            amount,
            false,
            new_balance,
            description,
            related_appointment_id,
        ))
    }
}
