use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use database_layer::{Appointment, AppointmentStatus, BookingStore, ReportQuery};

use crate::error::AppointmentResult;
use crate::models::DoctorDayStats;

/// Stable read queries for the export/report collaborator. The spreadsheet
/// itself is built externally; this service only exposes the rows.
pub struct ReportService {
    store: Arc<dyn BookingStore>,
}

impl ReportService {
    pub fn new(store: Arc<dyn BookingStore>) -> Self {
        Self { store }
    }

    /// Appointments matching the filter, ordered by date, schedule and
    /// token number.
    pub async fn appointments(&self, query: &ReportQuery) -> AppointmentResult<Vec<Appointment>> {
        Ok(self.store.appointments_in_range(query).await?)
    }

    /// Per-doctor/day roll-up for staff dashboards.
    pub async fn doctor_day_stats(
        &self,
        doctor_id: Uuid,
        clinic_id: Uuid,
        date: NaiveDate,
    ) -> AppointmentResult<DoctorDayStats> {
        let appointments = self
            .store
            .appointments_for_day(doctor_id, clinic_id, date)
            .await?;

        let count_status = |status: AppointmentStatus| {
            appointments.iter().filter(|a| a.status == status).count() as i64
        };

        let total_refunded_amount = appointments
            .iter()
            .filter_map(|a| a.refund_amount)
            .sum::<Decimal>();

        let revenue = appointments
            .iter()
            .filter(|a| a.status == AppointmentStatus::Completed)
            .map(|a| a.consultation_fee)
            .sum::<Decimal>();

        Ok(DoctorDayStats {
            doctor_id,
            clinic_id,
            date,
            total_tokens: appointments.len() as i64,
            completed: count_status(AppointmentStatus::Completed),
            cancelled: count_status(AppointmentStatus::Cancel),
            no_show: count_status(AppointmentStatus::NoShow),
            walk_ins: appointments.iter().filter(|a| a.is_walk_in).count() as i64,
            refunded: appointments.iter().filter(|a| a.has_been_refunded).count() as i64,
            total_refunded_amount,
            revenue,
        })
    }
}
