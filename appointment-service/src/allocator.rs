use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

use database_layer::{Appointment, BookingStore, NewAppointment};

use crate::error::{AppointmentError, AppointmentResult};
use crate::events::{DomainEvent, EventPublisher};
use crate::models::AllocateTokenRequest;

/// Assigns the next sequential token number within a schedule.
///
/// The allocator validates the request shape; capacity, schedule state,
/// duplicate-booking and number assignment are enforced inside the store's
/// per-schedule atomic unit, so two concurrent requests can never receive
/// the same token number.
pub struct TokenAllocator {
    store: Arc<dyn BookingStore>,
    events: Arc<dyn EventPublisher>,
}

impl TokenAllocator {
    pub fn new(store: Arc<dyn BookingStore>, events: Arc<dyn EventPublisher>) -> Self {
        Self { store, events }
    }

    /// Allocate a token on a schedule for a registered patient or a
    /// walk-in guest.
    pub async fn allocate(&self, request: AllocateTokenRequest) -> AppointmentResult<Appointment> {
        self.validate(&request)?;

        debug!(
            schedule_id = %request.schedule_id,
            is_walk_in = request.patient_id.is_none(),
            "Allocating token"
        );

        let appointment = self
            .store
            .allocate_token(NewAppointment {
                schedule_id: request.schedule_id,
                patient_id: request.patient_id,
                guest_name: request.guest_name,
                consultation_fee: request.consultation_fee,
                is_paid: request.is_paid,
            })
            .await
            .map_err(|err| {
                warn!(schedule_id = %request.schedule_id, error = %err, "Token allocation refused");
                AppointmentError::from(err)
            })?;

        info!(
            appointment_id = %appointment.id,
            schedule_id = %appointment.schedule_id,
            token_number = appointment.token_number,
            "Token allocated"
        );

        self.events
            .publish(DomainEvent::new(
                appointment.id,
                DomainEvent::STATUS_CHANGED,
                json!({
                    "status": appointment.status,
                    "token_number": appointment.token_number,
                    "schedule_id": appointment.schedule_id,
                }),
            ))
            .await;

        Ok(appointment)
    }

    fn validate(&self, request: &AllocateTokenRequest) -> AppointmentResult<()> {
        match (&request.patient_id, &request.guest_name) {
            (None, None) => Err(AppointmentError::Validation(
                "either patient_id or guest_name is required".to_string(),
            )),
            (Some(_), Some(_)) => Err(AppointmentError::Validation(
                "patient_id and guest_name are mutually exclusive".to_string(),
            )),
            (None, Some(name)) if name.trim().is_empty() => Err(AppointmentError::Validation(
                "guest_name must not be empty".to_string(),
            )),
            _ => Ok(()),
        }
    }
}
