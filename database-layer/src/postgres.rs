// PostgreSQL implementation of the BookingStore contract.
//
// Every mutating operation is a single transaction scoped to the affected
// rows: token allocation locks the schedule row (SELECT ... FOR UPDATE),
// refunds pair a conditional appointment update with a locked wallet row.
// Unrelated schedules and wallets never contend.
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use crate::connection::DatabasePool;
use crate::error::{StoreError, StoreResult};
use crate::models::{
    Appointment, AppointmentStatus, NewAppointment, NewSchedule, ReportQuery, Schedule,
    StatusUpdate, TransactionType, Wallet, WalletTransaction,
};
use crate::store::BookingStore;

#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn from_database_pool(pool: &DatabasePool) -> Self {
        Self {
            pool: pool.pool().clone(),
        }
    }

    /// Lock the wallet row for a patient, creating an active wallet on
    /// first use. Runs inside the caller's transaction.
    async fn wallet_for_update(
        tx: &mut Transaction<'_, Postgres>,
        patient_id: Uuid,
    ) -> StoreResult<Wallet> {
        let existing = sqlx::query_as::<_, Wallet>(
            "SELECT * FROM wallets WHERE patient_id = $1 FOR UPDATE",
        )
        .bind(patient_id)
        .fetch_optional(&mut **tx)
        .await?;

        if let Some(wallet) = existing {
            return Ok(wallet);
        }

        let wallet = sqlx::query_as::<_, Wallet>(
            r#"
            INSERT INTO wallets (id, patient_id, balance, total_earned, total_spent, is_active, created_at, updated_at)
            VALUES ($1, $2, 0, 0, 0, true, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(patient_id)
        .fetch_one(&mut **tx)
        .await?;

        debug!(patient_id = %patient_id, wallet_id = %wallet.id, "Created wallet on first credit");
        Ok(wallet)
    }

    /// Append a ledger entry and return it. Runs inside the caller's
    /// transaction so the entry commits together with the balance update.
    #[allow(clippy::too_many_arguments)]
    async fn append_transaction(
        tx: &mut Transaction<'_, Postgres>,
        wallet_id: Uuid,
        transaction_type: TransactionType,
        amount: Decimal,
        is_credit: bool,
        new_balance: Decimal,
        description: &str,
        related_appointment_id: Option<Uuid>,
    ) -> StoreResult<WalletTransaction> {
        let entry = sqlx::query_as::<_, WalletTransaction>(
            r#"
            INSERT INTO wallet_transactions
                (id, wallet_id, transaction_type, amount, is_credit, new_balance,
                 description, related_appointment_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(wallet_id)
        .bind(transaction_type)
        .bind(amount)
        .bind(is_credit)
        .bind(new_balance)
        .bind(description)
        .bind(related_appointment_id)
        .fetch_one(&mut **tx)
        .await?;

        Ok(entry)
    }
}

#[async_trait]
impl BookingStore for PostgresStore {
    async fn create_schedule(&self, new: NewSchedule) -> StoreResult<Schedule> {
        let schedule = sqlx::query_as::<_, Schedule>(
            r#"
            INSERT INTO schedules
                (id, doctor_id, clinic_id, date, start_time, end_time,
                 max_tokens, is_active, cancel_reason, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, true, NULL, NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.doctor_id)
        .bind(new.clinic_id)
        .bind(new.date)
        .bind(new.start_time)
        .bind(new.end_time)
        .bind(new.max_tokens)
        .fetch_one(&self.pool)
        .await?;

        info!(schedule_id = %schedule.id, doctor_id = %schedule.doctor_id, "Schedule created");
        Ok(schedule)
    }

    async fn schedule(&self, id: Uuid) -> StoreResult<Option<Schedule>> {
        let schedule = sqlx::query_as::<_, Schedule>("SELECT * FROM schedules WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(schedule)
    }

    async fn schedules_for_doctor(
        &self,
        doctor_id: Uuid,
        date: Option<NaiveDate>,
    ) -> StoreResult<Vec<Schedule>> {
        let schedules = sqlx::query_as::<_, Schedule>(
            r#"
            SELECT * FROM schedules
            WHERE doctor_id = $1 AND ($2::date IS NULL OR date = $2)
            ORDER BY date, start_time
            "#,
        )
        .bind(doctor_id)
        .bind(date)
        .fetch_all(&self.pool)
        .await?;
        Ok(schedules)
    }

    async fn close_schedule(&self, id: Uuid, cancel_reason: &str) -> StoreResult<Schedule> {
        // Conditional update keeps the first cancel reason; re-runs are no-ops.
        let closed = sqlx::query_as::<_, Schedule>(
            r#"
            UPDATE schedules
            SET is_active = false, cancel_reason = $2
            WHERE id = $1 AND cancel_reason IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(cancel_reason)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(schedule) = closed {
            info!(schedule_id = %id, reason = cancel_reason, "Schedule closed");
            return Ok(schedule);
        }

        self.schedule(id).await?.ok_or(StoreError::NotFound {
            entity: "schedule",
            id,
        })
    }

    async fn allocate_token(&self, new: NewAppointment) -> StoreResult<Appointment> {
        let mut tx = self.pool.begin().await?;

        // Serialise all allocation for this schedule on its row lock.
        let schedule = sqlx::query_as::<_, Schedule>(
            "SELECT * FROM schedules WHERE id = $1 FOR UPDATE",
        )
        .bind(new.schedule_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::NotFound {
            entity: "schedule",
            id: new.schedule_id,
        })?;

        if !schedule.is_open() {
            return Err(StoreError::ScheduleClosed {
                schedule_id: schedule.id,
            });
        }

        let issued: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM appointments WHERE schedule_id = $1",
        )
        .bind(schedule.id)
        .fetch_one(&mut *tx)
        .await?;

        if schedule.max_tokens > 0 && issued >= i64::from(schedule.max_tokens) {
            return Err(StoreError::ScheduleFull {
                schedule_id: schedule.id,
                max_tokens: schedule.max_tokens,
            });
        }

        if let Some(patient_id) = new.patient_id {
            let duplicate: bool = sqlx::query_scalar(
                r#"
                SELECT EXISTS(
                    SELECT 1 FROM appointments
                    WHERE schedule_id = $1 AND patient_id = $2 AND status <> $3
                )
                "#,
            )
            .bind(schedule.id)
            .bind(patient_id)
            .bind(AppointmentStatus::Cancel)
            .fetch_one(&mut *tx)
            .await?;

            if duplicate {
                return Err(StoreError::DuplicateBooking {
                    schedule_id: schedule.id,
                    patient_id,
                });
            }
        }

        let next_token: i32 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(token_number), 0) + 1 FROM appointments WHERE schedule_id = $1",
        )
        .bind(schedule.id)
        .fetch_one(&mut *tx)
        .await?;

        let is_walk_in = new.patient_id.is_none();
        let appointment = sqlx::query_as::<_, Appointment>(
            r#"
            INSERT INTO appointments
                (id, schedule_id, doctor_id, clinic_id, patient_id, guest_name,
                 token_number, status, status_notes, consultation_fee, is_paid,
                 is_walk_in, has_been_refunded, refund_amount, is_eligible_for_refund,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NULL, $9, $10, $11,
                    false, NULL, false, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(schedule.id)
        .bind(schedule.doctor_id)
        .bind(schedule.clinic_id)
        .bind(new.patient_id)
        .bind(new.guest_name.as_deref())
        .bind(next_token)
        .bind(AppointmentStatus::Scheduled)
        .bind(new.consultation_fee)
        .bind(new.is_paid)
        .bind(is_walk_in)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            appointment_id = %appointment.id,
            schedule_id = %schedule.id,
            token_number = appointment.token_number,
            is_walk_in,
            "Token allocated"
        );
        Ok(appointment)
    }

    async fn appointment(&self, id: Uuid) -> StoreResult<Option<Appointment>> {
        let appointment =
            sqlx::query_as::<_, Appointment>("SELECT * FROM appointments WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(appointment)
    }

    async fn appointments_for_schedule(&self, schedule_id: Uuid) -> StoreResult<Vec<Appointment>> {
        let appointments = sqlx::query_as::<_, Appointment>(
            "SELECT * FROM appointments WHERE schedule_id = $1 ORDER BY token_number",
        )
        .bind(schedule_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(appointments)
    }

    async fn appointments_for_day(
        &self,
        doctor_id: Uuid,
        clinic_id: Uuid,
        date: NaiveDate,
    ) -> StoreResult<Vec<Appointment>> {
        let appointments = sqlx::query_as::<_, Appointment>(
            r#"
            SELECT a.* FROM appointments a
            JOIN schedules s ON s.id = a.schedule_id
            WHERE a.doctor_id = $1 AND a.clinic_id = $2 AND s.date = $3
            ORDER BY a.token_number
            "#,
        )
        .bind(doctor_id)
        .bind(clinic_id)
        .bind(date)
        .fetch_all(&self.pool)
        .await?;
        Ok(appointments)
    }

    async fn appointments_in_range(&self, query: &ReportQuery) -> StoreResult<Vec<Appointment>> {
        let appointments = sqlx::query_as::<_, Appointment>(
            r#"
            SELECT a.* FROM appointments a
            JOIN schedules s ON s.id = a.schedule_id
            WHERE ($1::uuid IS NULL OR a.schedule_id = $1)
              AND ($2::uuid IS NULL OR a.doctor_id = $2)
              AND ($3::uuid IS NULL OR a.clinic_id = $3)
              AND ($4::date IS NULL OR s.date >= $4)
              AND ($5::date IS NULL OR s.date <= $5)
            ORDER BY s.date, a.schedule_id, a.token_number
            "#,
        )
        .bind(query.schedule_id)
        .bind(query.doctor_id)
        .bind(query.clinic_id)
        .bind(query.from_date)
        .bind(query.to_date)
        .fetch_all(&self.pool)
        .await?;
        Ok(appointments)
    }

    async fn update_status(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        update: StatusUpdate,
    ) -> StoreResult<Appointment> {
        let updated = sqlx::query_as::<_, Appointment>(
            r#"
            UPDATE appointments
            SET status = $2,
                status_notes = COALESCE($3, status_notes),
                is_eligible_for_refund = COALESCE($4, is_eligible_for_refund),
                updated_at = NOW()
            WHERE id = $1 AND status = $5
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(update.status)
        .bind(update.status_notes.as_deref())
        .bind(update.is_eligible_for_refund)
        .bind(expected)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(appointment) => Ok(appointment),
            None => {
                let current = self.appointment(id).await?.ok_or(StoreError::NotFound {
                    entity: "appointment",
                    id,
                })?;
                Err(StoreError::ConcurrencyConflict(format!(
                    "appointment {id} moved from {expected} to {} during update",
                    current.status
                )))
            }
        }
    }

    async fn wallet_for_patient(&self, patient_id: Uuid) -> StoreResult<Option<Wallet>> {
        let wallet = sqlx::query_as::<_, Wallet>("SELECT * FROM wallets WHERE patient_id = $1")
            .bind(patient_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(wallet)
    }

    async fn wallet_transactions(&self, wallet_id: Uuid) -> StoreResult<Vec<WalletTransaction>> {
        let entries = sqlx::query_as::<_, WalletTransaction>(
            "SELECT * FROM wallet_transactions WHERE wallet_id = $1 ORDER BY created_at, id",
        )
        .bind(wallet_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    async fn apply_refund(
        &self,
        appointment_id: Uuid,
        amount: Decimal,
        description: &str,
    ) -> StoreResult<WalletTransaction> {
        let mut tx = self.pool.begin().await?;

        // Idempotence guard: the flip succeeds for exactly one caller. The
        // refund flag, eligibility and amount change in the same statement
        // that filters on them, so a lost race is a clean zero-row update.
        let flipped = sqlx::query_as::<_, Appointment>(
            r#"
            UPDATE appointments
            SET has_been_refunded = true,
                refund_amount = $2,
                is_eligible_for_refund = false,
                updated_at = NOW()
            WHERE id = $1
              AND has_been_refunded = false
              AND is_eligible_for_refund = true
              AND patient_id IS NOT NULL
            RETURNING *
            "#,
        )
        .bind(appointment_id)
        .bind(amount)
        .fetch_optional(&mut *tx)
        .await?;

        let appointment = match flipped {
            Some(appointment) => appointment,
            None => {
                let current = sqlx::query_as::<_, Appointment>(
                    "SELECT * FROM appointments WHERE id = $1",
                )
                .bind(appointment_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(StoreError::NotFound {
                    entity: "appointment",
                    id: appointment_id,
                })?;

                return Err(if current.has_been_refunded {
                    StoreError::AlreadyRefunded { appointment_id }
                } else {
                    StoreError::NotEligible { appointment_id }
                });
            }
        };

        let patient_id = appointment.patient_id.ok_or(StoreError::NotEligible {
            appointment_id,
        })?;

        let wallet = Self::wallet_for_update(&mut tx, patient_id).await?;
        if !wallet.is_active {
            // Dropping the transaction rolls back the refund flip.
            return Err(StoreError::WalletInactive { patient_id });
        }

        let new_balance = wallet.balance + amount;
        sqlx::query(
            r#"
            UPDATE wallets
            SET balance = $2, total_earned = total_earned + $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(wallet.id)
        .bind(new_balance)
        .bind(amount)
        .execute(&mut *tx)
        .await?;

        let entry = Self::append_transaction(
            &mut tx,
            wallet.id,
            TransactionType::Refund,
            amount,
            true,
            new_balance,
            description,
            Some(appointment_id),
        )
        .await?;

        tx.commit().await?;

        info!(
            appointment_id = %appointment_id,
            wallet_id = %wallet.id,
            %amount,
            "Refund credited"
        );
        Ok(entry)
    }

    async fn debit_wallet(
        &self,
        patient_id: Uuid,
        amount: Decimal,
        description: &str,
        related_appointment_id: Option<Uuid>,
    ) -> StoreResult<WalletTransaction> {
        let mut tx = self.pool.begin().await?;

        let wallet = sqlx::query_as::<_, Wallet>(
            "SELECT * FROM wallets WHERE patient_id = $1 FOR UPDATE",
        )
        .bind(patient_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::WalletMissing { patient_id })?;

        if !wallet.is_active {
            return Err(StoreError::WalletInactive { patient_id });
        }
        if wallet.balance < amount {
            return Err(StoreError::InsufficientBalance {
                wallet_id: wallet.id,
                balance: wallet.balance,
                amount,
            });
        }

        let new_balance = wallet.balance - amount;
        sqlx::query(
            r#"
            UPDATE wallets
            SET balance = $2, total_spent = total_spent + $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(wallet.id)
        .bind(new_balance)
        .bind(amount)
        .execute(&mut *tx)
        .await?;

        let entry = Self::append_transaction(
            &mut tx,
            wallet.id,
            TransactionType::Debit,
            amount,
            false,
            new_balance,
            description,
            related_appointment_id,
        )
        .await?;

        tx.commit().await?;
        Ok(entry)
    }
}
