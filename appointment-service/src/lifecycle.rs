use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use database_layer::{Appointment, AppointmentStatus, BookingStore, StatusUpdate, StoreError};

use crate::error::{AppointmentError, AppointmentResult};
use crate::events::{DomainEvent, EventPublisher};
use crate::models::TransitionRequest;

/// Transitions that lost a compare-and-set race are retried this many
/// times before surfacing `ConcurrencyConflict`.
const MAX_TRANSITION_ATTEMPTS: u32 = 3;

/// Owns appointment status transitions and their side effects.
///
/// The graph: `scheduled -> start -> {hold, pause} -> start -> completed`;
/// any non-terminal state may cancel; `no_show` is reachable only from
/// `scheduled` and only for registered patients. `completed`, `cancel` and
/// `no_show` are terminal.
pub struct AppointmentLifecycle {
    store: Arc<dyn BookingStore>,
    events: Arc<dyn EventPublisher>,
}

impl AppointmentLifecycle {
    pub fn new(store: Arc<dyn BookingStore>, events: Arc<dyn EventPublisher>) -> Self {
        Self { store, events }
    }

    /// All statuses reachable from `current` for the given appointment.
    pub fn valid_transitions(
        current: AppointmentStatus,
        is_walk_in: bool,
    ) -> Vec<AppointmentStatus> {
        match current {
            AppointmentStatus::Scheduled => {
                let mut next = vec![AppointmentStatus::Start, AppointmentStatus::Cancel];
                // Guests are turned away at the desk, never marked no-show.
                if !is_walk_in {
                    next.push(AppointmentStatus::NoShow);
                }
                next
            }
            AppointmentStatus::Start => vec![
                AppointmentStatus::Hold,
                AppointmentStatus::Pause,
                AppointmentStatus::Completed,
                AppointmentStatus::Cancel,
            ],
            AppointmentStatus::Hold | AppointmentStatus::Pause => {
                vec![AppointmentStatus::Start, AppointmentStatus::Cancel]
            }
            // Terminal states
            AppointmentStatus::Completed
            | AppointmentStatus::Cancel
            | AppointmentStatus::NoShow => vec![],
        }
    }

    /// Apply a status transition, retrying a bounded number of times when a
    /// concurrent staff action moves the appointment first. Each retry
    /// re-reads and re-validates against the fresh state, so a transition
    /// that became invalid mid-race fails with `InvalidTransition` rather
    /// than being silently coerced.
    pub async fn transition(
        &self,
        appointment_id: Uuid,
        request: TransitionRequest,
    ) -> AppointmentResult<Appointment> {
        let mut last_conflict = String::new();

        for attempt in 1..=MAX_TRANSITION_ATTEMPTS {
            let current = self
                .store
                .appointment(appointment_id)
                .await?
                .ok_or(AppointmentError::NotFound {
                    entity: "appointment",
                    id: appointment_id,
                })?;

            if !Self::valid_transitions(current.status, current.is_walk_in)
                .contains(&request.status)
            {
                warn!(
                    appointment_id = %appointment_id,
                    from = %current.status,
                    to = %request.status,
                    "Invalid status transition attempted"
                );
                return Err(AppointmentError::InvalidTransition {
                    from: current.status,
                    to: request.status,
                });
            }

            let eligibility = Self::eligibility_after(&current, request.status);
            let update = StatusUpdate {
                status: request.status,
                status_notes: request.notes.clone(),
                is_eligible_for_refund: eligibility,
            };

            match self
                .store
                .update_status(appointment_id, current.status, update)
                .await
            {
                Ok(updated) => {
                    info!(
                        appointment_id = %appointment_id,
                        from = %current.status,
                        to = %updated.status,
                        eligible_for_refund = updated.is_eligible_for_refund,
                        "Status transition applied"
                    );
                    self.events
                        .publish(DomainEvent::new(
                            appointment_id,
                            DomainEvent::STATUS_CHANGED,
                            json!({
                                "from": current.status,
                                "to": updated.status,
                                "notes": updated.status_notes,
                            }),
                        ))
                        .await;
                    return Ok(updated);
                }
                Err(StoreError::ConcurrencyConflict(msg)) => {
                    debug!(
                        appointment_id = %appointment_id,
                        attempt,
                        "Transition lost update race, retrying"
                    );
                    last_conflict = msg;
                }
                Err(other) => return Err(other.into()),
            }
        }

        Err(AppointmentError::ConcurrencyConflict(last_conflict))
    }

    /// Refund-eligibility flag written atomically with the status change.
    ///
    /// Cancellation before completion keeps a paid, registered token
    /// refundable; no-shows are policy-fixed to never be refundable, and a
    /// completed consultation was delivered so nothing is owed.
    fn eligibility_after(current: &Appointment, next: AppointmentStatus) -> Option<bool> {
        match next {
            AppointmentStatus::Cancel => {
                Some(!current.is_walk_in && !current.has_been_refunded)
            }
            AppointmentStatus::NoShow | AppointmentStatus::Completed => Some(false),
            _ => None,
        }
    }
}
