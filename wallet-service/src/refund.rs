use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use appointment_service::{
    AppointmentLifecycle, DomainEvent, EventPublisher, TransitionRequest,
};
use database_layer::{Appointment, AppointmentStatus, BookingStore, WalletTransaction};

use crate::error::{WalletError, WalletResult};
use crate::models::{ScheduleCancellationReport, SkippedRefund};

/// Skip reasons reported to staff during bulk cancellation.
const SKIP_COMPLETED: &str = "completed - service delivered";
const SKIP_WALK_IN: &str = "walk-in - no wallet";
const SKIP_NO_SHOW: &str = "no-show - not refundable";
const SKIP_ALREADY_REFUNDED: &str = "already refunded";
const SKIP_NOT_ELIGIBLE: &str = "not eligible for refund";

/// Refund engine configuration.
#[derive(Debug, Clone)]
pub struct RefundConfig {
    /// Credited when an appointment carries no usable consultation fee.
    pub default_consultation_fee: Decimal,
}

impl Default for RefundConfig {
    fn default() -> Self {
        Self {
            default_consultation_fee: dec!(300.00),
        }
    }
}

/// Computes refund eligibility and drives credits against the wallet
/// ledger, marking each appointment as refunded exactly once.
pub struct RefundEngine {
    store: Arc<dyn BookingStore>,
    events: Arc<dyn EventPublisher>,
    lifecycle: Arc<AppointmentLifecycle>,
    config: RefundConfig,
}

impl RefundEngine {
    pub fn new(
        store: Arc<dyn BookingStore>,
        events: Arc<dyn EventPublisher>,
        lifecycle: Arc<AppointmentLifecycle>,
        config: RefundConfig,
    ) -> Self {
        Self {
            store,
            events,
            lifecycle,
            config,
        }
    }

    /// Credit the refund for one cancelled appointment.
    ///
    /// The eligibility check and the refund flip run in the same atomic
    /// store operation, so calling this twice (even concurrently) produces
    /// exactly one ledger entry; the loser observes `AlreadyRefunded` and
    /// mutates nothing. Never retried internally: a retry would have to
    /// pass the idempotence guard again anyway.
    pub async fn refund_appointment(
        &self,
        appointment_id: Uuid,
        reason: &str,
    ) -> WalletResult<WalletTransaction> {
        let appointment = self
            .store
            .appointment(appointment_id)
            .await
            .map_err(WalletError::from)?
            .ok_or(WalletError::NotFound {
                entity: "appointment",
                id: appointment_id,
            })?;

        if appointment.is_walk_in {
            return Err(WalletError::WalkInNotRefundable { appointment_id });
        }

        let amount = self.refund_amount(&appointment);
        let description = format!(
            "Refund for token #{}: {}",
            appointment.token_number, reason
        );

        let entry = self
            .store
            .apply_refund(appointment_id, amount, &description)
            .await
            .map_err(WalletError::from)?;

        info!(
            appointment_id = %appointment_id,
            wallet_id = %entry.wallet_id,
            amount = %entry.amount,
            "Refund issued"
        );

        self.events
            .publish(DomainEvent::new(
                appointment_id,
                DomainEvent::REFUND_ISSUED,
                json!({
                    "amount": entry.amount,
                    "wallet_id": entry.wallet_id,
                    "transaction_id": entry.id,
                    "reason": reason,
                }),
            ))
            .await;

        Ok(entry)
    }

    /// Cancel a whole schedule and refund every eligible appointment on it.
    ///
    /// The schedule is closed first (terminal; allocation stops
    /// immediately), then each non-terminal appointment is cancelled through
    /// the state machine and refunded through the single-refund contract.
    /// Failures are per-appointment: they land in `skipped` and never abort
    /// the rest of the batch. Safe to re-run; already-refunded appointments
    /// are skipped by the idempotence guard, never double-credited.
    pub async fn cancel_schedule_with_refunds(
        &self,
        schedule_id: Uuid,
        cancel_reason: &str,
    ) -> WalletResult<ScheduleCancellationReport> {
        let schedule = self
            .store
            .close_schedule(schedule_id, cancel_reason)
            .await
            .map_err(WalletError::from)?;

        info!(
            schedule_id = %schedule.id,
            reason = cancel_reason,
            "Schedule cancelled, processing refunds"
        );

        let appointments = self
            .store
            .appointments_for_schedule(schedule_id)
            .await
            .map_err(WalletError::from)?;

        let mut report = ScheduleCancellationReport {
            schedule_id,
            refunded_appointments: 0,
            total_refund_amount: Decimal::ZERO,
            skipped: Vec::new(),
        };

        for appointment in appointments {
            match appointment.status {
                AppointmentStatus::Completed => {
                    report.skipped.push(SkippedRefund {
                        appointment_id: appointment.id,
                        reason: SKIP_COMPLETED.to_string(),
                    });
                }
                AppointmentStatus::NoShow => {
                    report.skipped.push(SkippedRefund {
                        appointment_id: appointment.id,
                        reason: SKIP_NO_SHOW.to_string(),
                    });
                }
                AppointmentStatus::Cancel => {
                    // Left over from an interrupted earlier run; only the
                    // refund may still be outstanding.
                    self.try_refund(&appointment, cancel_reason, &mut report)
                        .await;
                }
                _ => {
                    match self
                        .lifecycle
                        .transition(
                            appointment.id,
                            TransitionRequest {
                                status: AppointmentStatus::Cancel,
                                notes: Some(cancel_reason.to_string()),
                            },
                        )
                        .await
                    {
                        Ok(cancelled) => {
                            self.try_refund(&cancelled, cancel_reason, &mut report).await;
                        }
                        Err(err) => {
                            warn!(
                                appointment_id = %appointment.id,
                                error = %err,
                                "Bulk cancellation could not cancel appointment"
                            );
                            report.skipped.push(SkippedRefund {
                                appointment_id: appointment.id,
                                reason: format!("cancellation failed: {err}"),
                            });
                        }
                    }
                }
            }
        }

        info!(
            schedule_id = %schedule_id,
            refunded = report.refunded_appointments,
            total = %report.total_refund_amount,
            skipped = report.skipped.len(),
            "Bulk cancellation finished"
        );
        Ok(report)
    }

    /// Attempt one refund inside a bulk run, folding the outcome into the
    /// report instead of propagating it.
    async fn try_refund(
        &self,
        appointment: &Appointment,
        reason: &str,
        report: &mut ScheduleCancellationReport,
    ) {
        if appointment.is_walk_in {
            report.skipped.push(SkippedRefund {
                appointment_id: appointment.id,
                reason: SKIP_WALK_IN.to_string(),
            });
            return;
        }
        if appointment.has_been_refunded {
            report.skipped.push(SkippedRefund {
                appointment_id: appointment.id,
                reason: SKIP_ALREADY_REFUNDED.to_string(),
            });
            return;
        }
        if !appointment.is_eligible_for_refund {
            report.skipped.push(SkippedRefund {
                appointment_id: appointment.id,
                reason: SKIP_NOT_ELIGIBLE.to_string(),
            });
            return;
        }

        match self.refund_appointment(appointment.id, reason).await {
            Ok(entry) => {
                report.refunded_appointments += 1;
                report.total_refund_amount += entry.amount;
            }
            Err(WalletError::AlreadyRefunded { .. }) => {
                // Benign: a concurrent caller credited it first.
                report.skipped.push(SkippedRefund {
                    appointment_id: appointment.id,
                    reason: SKIP_ALREADY_REFUNDED.to_string(),
                });
            }
            Err(err) => {
                warn!(
                    appointment_id = %appointment.id,
                    error = %err,
                    "Refund skipped during bulk cancellation"
                );
                report.skipped.push(SkippedRefund {
                    appointment_id: appointment.id,
                    reason: err.to_string(),
                });
            }
        }
    }

    /// Refund amount: the recorded consultation fee, falling back to the
    /// configured default when the fee is absent or zero.
    fn refund_amount(&self, appointment: &Appointment) -> Decimal {
        if appointment.consultation_fee > Decimal::ZERO {
            appointment.consultation_fee
        } else {
            self.config.default_consultation_fee
        }
    }
}
