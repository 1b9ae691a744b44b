use chrono::NaiveDate;
use std::sync::Arc;
use uuid::Uuid;

use database_layer::{Appointment, AppointmentStatus, BookingStore};

use crate::error::{AppointmentError, AppointmentResult};
use crate::models::{QueueProgress, TokensAhead};

/// Read-only projection answering "what token is being served now, how many
/// are ahead of me". Recomputed on every read; staleness is bounded only by
/// how often the caller polls.
pub struct QueueReporter {
    store: Arc<dyn BookingStore>,
}

impl QueueReporter {
    pub fn new(store: Arc<dyn BookingStore>) -> Self {
        Self { store }
    }

    /// Queue snapshot for one doctor/clinic pair on `date`.
    pub async fn progress(
        &self,
        doctor_id: Uuid,
        clinic_id: Uuid,
        date: NaiveDate,
    ) -> AppointmentResult<QueueProgress> {
        let appointments = self
            .store
            .appointments_for_day(doctor_id, clinic_id, date)
            .await?;

        let (current_token, status) = Self::current_position(&appointments);
        let walk_in_patients = appointments
            .iter()
            .filter(|a| a.is_walk_in && !a.status.is_terminal())
            .count() as i64;

        Ok(QueueProgress {
            current_token,
            status,
            walk_in_patients,
        })
    }

    /// How many unresolved tokens stand before one patient's token.
    ///
    /// Held and paused tokens are still ahead: they occupy their queue slot
    /// until they resume or cancel, so later tokens do not leapfrog them.
    pub async fn tokens_ahead(&self, appointment_id: Uuid) -> AppointmentResult<TokensAhead> {
        let appointment = self
            .store
            .appointment(appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound {
                entity: "appointment",
                id: appointment_id,
            })?;

        let schedule = self
            .store
            .schedule(appointment.schedule_id)
            .await?
            .ok_or(AppointmentError::NotFound {
                entity: "schedule",
                id: appointment.schedule_id,
            })?;

        let appointments = self
            .store
            .appointments_for_day(appointment.doctor_id, appointment.clinic_id, schedule.date)
            .await?;

        let (current_token, _) = Self::current_position(&appointments);
        let floor = current_token.unwrap_or(0);

        let waiting: Vec<&Appointment> = appointments
            .iter()
            .filter(|a| {
                Self::occupies_queue(a.status)
                    && a.token_number > floor
                    && a.token_number < appointment.token_number
            })
            .collect();

        Ok(TokensAhead {
            current_token,
            patient_token: appointment.token_number,
            tokens_ahead: waiting.len() as i64,
            walk_ins_waiting: waiting.iter().filter(|a| a.is_walk_in).count() as i64,
        })
    }

    /// Token currently in `start`, falling back to the highest completed
    /// token between consultations.
    fn current_position(
        appointments: &[Appointment],
    ) -> (Option<i32>, Option<AppointmentStatus>) {
        if let Some(active) = appointments
            .iter()
            .find(|a| a.status == AppointmentStatus::Start)
        {
            return (Some(active.token_number), Some(active.status));
        }

        appointments
            .iter()
            .filter(|a| a.status == AppointmentStatus::Completed)
            .max_by_key(|a| a.token_number)
            .map_or((None, None), |done| {
                (Some(done.token_number), Some(done.status))
            })
    }

    /// Whether a token still holds its place in the queue.
    fn occupies_queue(status: AppointmentStatus) -> bool {
        matches!(
            status,
            AppointmentStatus::Scheduled | AppointmentStatus::Hold | AppointmentStatus::Pause
        )
    }
}
