#![allow(clippy::unwrap_used)]

use chrono::{NaiveDate, NaiveTime};
use rust_decimal_macros::dec;
use uuid::Uuid;

use database_layer::{
    Appointment, AppointmentStatus, BookingStore, MemoryStore, NewAppointment, NewSchedule,
    ReportQuery, Schedule, StatusUpdate, StoreError,
};

async fn schedule_on(store: &MemoryStore, date: NaiveDate) -> Schedule {
    store
        .create_schedule(NewSchedule {
            doctor_id: Uuid::new_v4(),
            clinic_id: Uuid::new_v4(),
            date,
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(13, 0, 0).unwrap(),
            max_tokens: 0,
        })
        .await
        .unwrap()
}

async fn book(store: &MemoryStore, schedule_id: Uuid) -> Appointment {
    store
        .allocate_token(NewAppointment {
            schedule_id,
            patient_id: Some(Uuid::new_v4()),
            guest_name: None,
            consultation_fee: dec!(500.00),
            is_paid: true,
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn status_update_is_compare_and_set() {
    let store = MemoryStore::new();
    let date = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
    let schedule = schedule_on(&store, date).await;
    let appointment = book(&store, schedule.id).await;

    let update = StatusUpdate {
        status: AppointmentStatus::Start,
        status_notes: None,
        is_eligible_for_refund: None,
    };

    store
        .update_status(appointment.id, AppointmentStatus::Scheduled, update.clone())
        .await
        .unwrap();

    // The second caller still expects `scheduled` and must lose.
    let err = store
        .update_status(appointment.id, AppointmentStatus::Scheduled, update)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::ConcurrencyConflict(_)));
}

#[tokio::test]
async fn refund_guard_flips_exactly_once_at_the_store_level() {
    let store = MemoryStore::new();
    let date = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
    let schedule = schedule_on(&store, date).await;
    let appointment = book(&store, schedule.id).await;

    store
        .update_status(
            appointment.id,
            AppointmentStatus::Scheduled,
            StatusUpdate {
                status: AppointmentStatus::Cancel,
                status_notes: None,
                is_eligible_for_refund: Some(true),
            },
        )
        .await
        .unwrap();

    store
        .apply_refund(appointment.id, dec!(500.00), "first")
        .await
        .unwrap();
    let err = store
        .apply_refund(appointment.id, dec!(500.00), "second")
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::AlreadyRefunded { .. }));
}

#[tokio::test]
async fn ineligible_refund_never_creates_a_wallet() {
    let store = MemoryStore::new();
    let date = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
    let schedule = schedule_on(&store, date).await;
    let appointment = book(&store, schedule.id).await;

    let err = store
        .apply_refund(appointment.id, dec!(500.00), "too early")
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotEligible { .. }));

    let wallet = store
        .wallet_for_patient(appointment.patient_id.unwrap())
        .await
        .unwrap();
    assert!(wallet.is_none());
}

#[tokio::test]
async fn report_queries_filter_by_date_range_and_doctor() {
    let store = MemoryStore::new();
    let march = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
    let april = NaiveDate::from_ymd_opt(2026, 4, 2).unwrap();

    let early = schedule_on(&store, march).await;
    let late = schedule_on(&store, april).await;
    book(&store, early.id).await;
    book(&store, early.id).await;
    book(&store, late.id).await;

    let march_only = store
        .appointments_in_range(&ReportQuery {
            from_date: Some(march),
            to_date: Some(march),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(march_only.len(), 2);

    let by_doctor = store
        .appointments_in_range(&ReportQuery {
            doctor_id: Some(late.doctor_id),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_doctor.len(), 1);
    assert_eq!(by_doctor[0].schedule_id, late.id);
}

#[tokio::test]
async fn closing_a_schedule_is_idempotent_and_keeps_the_first_reason() {
    let store = MemoryStore::new();
    let date = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
    let schedule = schedule_on(&store, date).await;

    let closed = store
        .close_schedule(schedule.id, "doctor on leave")
        .await
        .unwrap();
    assert!(!closed.is_open());

    let reclosed = store
        .close_schedule(schedule.id, "different reason")
        .await
        .unwrap();
    assert_eq!(reclosed.cancel_reason.as_deref(), Some("doctor on leave"));
}
