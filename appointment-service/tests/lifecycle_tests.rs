#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use rust_decimal_macros::dec;
use uuid::Uuid;

use appointment_service::{
    AppointmentError, AppointmentLifecycle, BroadcastPublisher, DomainEvent, TracingPublisher,
    TransitionRequest,
};
use database_layer::{
    Appointment, AppointmentStatus, BookingStore, MemoryStore, NewAppointment, NewSchedule,
};

struct Fixture {
    store: Arc<MemoryStore>,
    lifecycle: AppointmentLifecycle,
    schedule_id: Uuid,
}

async fn fixture() -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let schedule = store
        .create_schedule(NewSchedule {
            doctor_id: Uuid::new_v4(),
            clinic_id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(13, 0, 0).unwrap(),
            max_tokens: 0,
        })
        .await
        .unwrap();
    let lifecycle = AppointmentLifecycle::new(store.clone(), Arc::new(TracingPublisher));
    Fixture {
        store,
        lifecycle,
        schedule_id: schedule.id,
    }
}

impl Fixture {
    async fn book_patient(&self) -> Appointment {
        self.store
            .allocate_token(NewAppointment {
                schedule_id: self.schedule_id,
                patient_id: Some(Uuid::new_v4()),
                guest_name: None,
                consultation_fee: dec!(500.00),
                is_paid: true,
            })
            .await
            .unwrap()
    }

    async fn book_walk_in(&self) -> Appointment {
        self.store
            .allocate_token(NewAppointment {
                schedule_id: self.schedule_id,
                patient_id: None,
                guest_name: Some("Asha".to_string()),
                consultation_fee: dec!(500.00),
                is_paid: true,
            })
            .await
            .unwrap()
    }

    async fn transition(
        &self,
        id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Appointment, AppointmentError> {
        self.lifecycle
            .transition(
                id,
                TransitionRequest {
                    status,
                    notes: None,
                },
            )
            .await
    }
}

#[tokio::test]
async fn consultation_happy_path() {
    let fx = fixture().await;
    let appointment = fx.book_patient().await;

    let started = fx
        .transition(appointment.id, AppointmentStatus::Start)
        .await
        .unwrap();
    assert_eq!(started.status, AppointmentStatus::Start);

    let completed = fx
        .transition(appointment.id, AppointmentStatus::Completed)
        .await
        .unwrap();
    assert_eq!(completed.status, AppointmentStatus::Completed);
    assert!(!completed.is_eligible_for_refund);
}

#[tokio::test]
async fn hold_and_pause_resume_into_start() {
    let fx = fixture().await;

    for interruption in [AppointmentStatus::Hold, AppointmentStatus::Pause] {
        let appointment = fx.book_patient().await;
        fx.transition(appointment.id, AppointmentStatus::Start)
            .await
            .unwrap();
        let interrupted = fx.transition(appointment.id, interruption).await.unwrap();
        assert_eq!(interrupted.status, interruption);

        let resumed = fx
            .transition(appointment.id, AppointmentStatus::Start)
            .await
            .unwrap();
        assert_eq!(resumed.status, AppointmentStatus::Start);

        fx.transition(appointment.id, AppointmentStatus::Completed)
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn completion_requires_a_running_consultation() {
    let fx = fixture().await;
    let appointment = fx.book_patient().await;

    let err = fx
        .transition(appointment.id, AppointmentStatus::Completed)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppointmentError::InvalidTransition {
            from: AppointmentStatus::Scheduled,
            to: AppointmentStatus::Completed,
        }
    ));
}

#[tokio::test]
async fn terminal_states_reject_every_transition() {
    let fx = fixture().await;

    let completed = fx.book_patient().await;
    fx.transition(completed.id, AppointmentStatus::Start)
        .await
        .unwrap();
    fx.transition(completed.id, AppointmentStatus::Completed)
        .await
        .unwrap();

    let cancelled = fx.book_patient().await;
    fx.transition(cancelled.id, AppointmentStatus::Cancel)
        .await
        .unwrap();

    for id in [completed.id, cancelled.id] {
        for next in [
            AppointmentStatus::Start,
            AppointmentStatus::Cancel,
            AppointmentStatus::Scheduled,
        ] {
            let err = fx.transition(id, next).await.unwrap_err();
            assert!(matches!(err, AppointmentError::InvalidTransition { .. }));
        }
    }
}

#[tokio::test]
async fn no_show_is_only_reachable_from_scheduled() {
    let fx = fixture().await;

    let marked = fx.book_patient().await;
    let no_show = fx
        .transition(marked.id, AppointmentStatus::NoShow)
        .await
        .unwrap();
    assert_eq!(no_show.status, AppointmentStatus::NoShow);
    assert!(!no_show.is_eligible_for_refund);

    let started = fx.book_patient().await;
    fx.transition(started.id, AppointmentStatus::Start)
        .await
        .unwrap();
    let err = fx
        .transition(started.id, AppointmentStatus::NoShow)
        .await
        .unwrap_err();
    assert!(matches!(err, AppointmentError::InvalidTransition { .. }));
}

#[tokio::test]
async fn walk_ins_are_never_marked_no_show() {
    let fx = fixture().await;
    let guest = fx.book_walk_in().await;

    let err = fx
        .transition(guest.id, AppointmentStatus::NoShow)
        .await
        .unwrap_err();
    assert!(matches!(err, AppointmentError::InvalidTransition { .. }));
}

#[tokio::test]
async fn cancelling_a_registered_token_makes_it_refundable() {
    let fx = fixture().await;
    let appointment = fx.book_patient().await;

    let cancelled = fx
        .transition(appointment.id, AppointmentStatus::Cancel)
        .await
        .unwrap();
    assert_eq!(cancelled.status, AppointmentStatus::Cancel);
    assert!(cancelled.is_eligible_for_refund);
}

#[tokio::test]
async fn cancelling_a_walk_in_is_never_refundable() {
    let fx = fixture().await;
    let guest = fx.book_walk_in().await;

    let cancelled = fx
        .transition(guest.id, AppointmentStatus::Cancel)
        .await
        .unwrap();
    assert_eq!(cancelled.status, AppointmentStatus::Cancel);
    assert!(!cancelled.is_eligible_for_refund);
}

#[tokio::test]
async fn cancellation_is_allowed_mid_consultation() {
    let fx = fixture().await;

    let appointment = fx.book_patient().await;
    fx.transition(appointment.id, AppointmentStatus::Start)
        .await
        .unwrap();
    fx.transition(appointment.id, AppointmentStatus::Hold)
        .await
        .unwrap();

    let cancelled = fx
        .transition(appointment.id, AppointmentStatus::Cancel)
        .await
        .unwrap();
    assert_eq!(cancelled.status, AppointmentStatus::Cancel);
    assert!(cancelled.is_eligible_for_refund);
}

#[tokio::test]
async fn transition_notes_are_recorded() {
    let fx = fixture().await;
    let appointment = fx.book_patient().await;

    let cancelled = fx
        .lifecycle
        .transition(
            appointment.id,
            TransitionRequest {
                status: AppointmentStatus::Cancel,
                notes: Some("patient called to cancel".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(
        cancelled.status_notes.as_deref(),
        Some("patient called to cancel")
    );
}

#[tokio::test]
async fn unknown_appointment_is_not_found() {
    let fx = fixture().await;
    let err = fx
        .transition(Uuid::new_v4(), AppointmentStatus::Start)
        .await
        .unwrap_err();
    assert!(matches!(err, AppointmentError::NotFound { .. }));
}

#[tokio::test]
async fn transitions_reach_broadcast_subscribers() {
    let store = Arc::new(MemoryStore::new());
    let schedule = store
        .create_schedule(NewSchedule {
            doctor_id: Uuid::new_v4(),
            clinic_id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(13, 0, 0).unwrap(),
            max_tokens: 0,
        })
        .await
        .unwrap();
    let events = Arc::new(BroadcastPublisher::new(8));
    let lifecycle = AppointmentLifecycle::new(store.clone(), events.clone());
    let appointment = store
        .allocate_token(NewAppointment {
            schedule_id: schedule.id,
            patient_id: Some(Uuid::new_v4()),
            guest_name: None,
            consultation_fee: dec!(500.00),
            is_paid: true,
        })
        .await
        .unwrap();

    // Subscribe before acting; broadcast delivery starts at subscription.
    let mut rx = events.subscribe();
    lifecycle
        .transition(
            appointment.id,
            TransitionRequest {
                status: AppointmentStatus::Start,
                notes: None,
            },
        )
        .await
        .unwrap();

    let event = rx.recv().await.unwrap();
    assert_eq!(event.event_type, DomainEvent::STATUS_CHANGED);
    assert_eq!(event.appointment_id, appointment.id);
    assert_eq!(event.payload["from"], "scheduled");
    assert_eq!(event.payload["to"], "start");
}
