#![allow(clippy::unwrap_used, clippy::panic)]

use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use appointment_service::{
    AppointmentLifecycle, BroadcastPublisher, DomainEvent, TracingPublisher, TransitionRequest,
};
use database_layer::{
    Appointment, AppointmentStatus, BookingStore, MemoryStore, NewAppointment, NewSchedule,
    TransactionType,
};
use wallet_service::{RefundConfig, RefundEngine, WalletError, WalletLedger};

struct Fixture {
    store: Arc<MemoryStore>,
    lifecycle: Arc<AppointmentLifecycle>,
    engine: Arc<RefundEngine>,
    ledger: WalletLedger,
}

fn fixture() -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let events = Arc::new(TracingPublisher);
    let lifecycle = Arc::new(AppointmentLifecycle::new(store.clone(), events.clone()));
    let engine = Arc::new(RefundEngine::new(
        store.clone(),
        events,
        lifecycle.clone(),
        RefundConfig::default(),
    ));
    let ledger = WalletLedger::new(store.clone());
    Fixture {
        store,
        lifecycle,
        engine,
        ledger,
    }
}

impl Fixture {
    async fn schedule(&self) -> Uuid {
        self.store
            .create_schedule(NewSchedule {
                doctor_id: Uuid::new_v4(),
                clinic_id: Uuid::new_v4(),
                date: NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
                start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                end_time: NaiveTime::from_hms_opt(13, 0, 0).unwrap(),
                max_tokens: 0,
            })
            .await
            .unwrap()
            .id
    }

    async fn book(
        &self,
        schedule_id: Uuid,
        patient_id: Option<Uuid>,
        fee: Decimal,
    ) -> Appointment {
        self.store
            .allocate_token(NewAppointment {
                schedule_id,
                patient_id,
                guest_name: if patient_id.is_none() {
                    Some("Asha".to_string())
                } else {
                    None
                },
                consultation_fee: fee,
                is_paid: true,
            })
            .await
            .unwrap()
    }

    async fn move_to(&self, id: Uuid, path: &[AppointmentStatus]) {
        for status in path {
            self.lifecycle
                .transition(
                    id,
                    TransitionRequest {
                        status: *status,
                        notes: None,
                    },
                )
                .await
                .unwrap();
        }
    }

    /// Book for a registered patient and cancel, leaving the token
    /// refund-eligible.
    async fn cancelled_booking(&self, patient_id: Uuid, fee: Decimal) -> Appointment {
        let schedule_id = self.schedule().await;
        let appointment = self.book(schedule_id, Some(patient_id), fee).await;
        self.move_to(appointment.id, &[AppointmentStatus::Cancel])
            .await;
        appointment
    }
}

#[tokio::test]
async fn refund_after_cancellation_credits_the_wallet() {
    let fx = fixture();
    let patient_id = Uuid::new_v4();
    let appointment = fx.cancelled_booking(patient_id, dec!(500.00)).await;

    let entry = fx
        .engine
        .refund_appointment(appointment.id, "patient cancelled")
        .await
        .unwrap();
    assert_eq!(entry.amount, dec!(500.00));
    assert!(entry.is_credit);
    assert_eq!(entry.transaction_type, TransactionType::Refund);
    assert_eq!(entry.related_appointment_id, Some(appointment.id));
    assert_eq!(entry.new_balance, dec!(500.00));

    let wallet = fx.ledger.wallet(patient_id).await.unwrap();
    assert_eq!(wallet.balance, dec!(500.00));
    assert_eq!(wallet.total_earned, dec!(500.00));

    let refreshed = fx.store.appointment(appointment.id).await.unwrap().unwrap();
    assert!(refreshed.has_been_refunded);
    assert_eq!(refreshed.refund_amount, Some(dec!(500.00)));
    assert!(!refreshed.is_eligible_for_refund);
}

#[tokio::test]
async fn second_refund_is_rejected_and_changes_nothing() {
    let fx = fixture();
    let patient_id = Uuid::new_v4();
    let appointment = fx.cancelled_booking(patient_id, dec!(500.00)).await;

    fx.engine
        .refund_appointment(appointment.id, "patient cancelled")
        .await
        .unwrap();
    let err = fx
        .engine
        .refund_appointment(appointment.id, "retry")
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::AlreadyRefunded { .. }));

    let wallet = fx.ledger.wallet(patient_id).await.unwrap();
    assert_eq!(wallet.balance, dec!(500.00));
    assert_eq!(fx.ledger.history(patient_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn concurrent_refunds_credit_exactly_once() {
    let fx = fixture();
    let patient_id = Uuid::new_v4();
    let appointment = fx.cancelled_booking(patient_id, dec!(500.00)).await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let engine = fx.engine.clone();
        let id = appointment.id;
        handles.push(tokio::spawn(async move {
            engine.refund_appointment(id, "race").await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(WalletError::AlreadyRefunded { .. }) => {}
            Err(other) => panic!("unexpected refund error: {other}"),
        }
    }
    assert_eq!(successes, 1);

    let wallet = fx.ledger.wallet(patient_id).await.unwrap();
    assert_eq!(wallet.balance, dec!(500.00));
    assert_eq!(fx.ledger.history(patient_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn completed_and_no_show_tokens_are_not_refundable() {
    let fx = fixture();
    let schedule_id = fx.schedule().await;

    let completed = fx.book(schedule_id, Some(Uuid::new_v4()), dec!(500.00)).await;
    fx.move_to(
        completed.id,
        &[AppointmentStatus::Start, AppointmentStatus::Completed],
    )
    .await;
    let err = fx
        .engine
        .refund_appointment(completed.id, "after the fact")
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::NotEligible { .. }));

    let absent = fx.book(schedule_id, Some(Uuid::new_v4()), dec!(500.00)).await;
    fx.move_to(absent.id, &[AppointmentStatus::NoShow]).await;
    let err = fx
        .engine
        .refund_appointment(absent.id, "no show")
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::NotEligible { .. }));
}

#[tokio::test]
async fn walk_in_refund_is_rejected_outright() {
    let fx = fixture();
    let schedule_id = fx.schedule().await;
    let guest = fx.book(schedule_id, None, dec!(500.00)).await;
    fx.move_to(guest.id, &[AppointmentStatus::Cancel]).await;

    let err = fx
        .engine
        .refund_appointment(guest.id, "guest cancelled")
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::WalkInNotRefundable { .. }));
}

#[tokio::test]
async fn live_token_is_not_yet_refundable() {
    let fx = fixture();
    let schedule_id = fx.schedule().await;
    let appointment = fx.book(schedule_id, Some(Uuid::new_v4()), dec!(500.00)).await;

    let err = fx
        .engine
        .refund_appointment(appointment.id, "too early")
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::NotEligible { .. }));
}

#[tokio::test]
async fn missing_fee_falls_back_to_the_configured_default() {
    let fx = fixture();
    let patient_id = Uuid::new_v4();
    let appointment = fx.cancelled_booking(patient_id, Decimal::ZERO).await;

    let entry = fx
        .engine
        .refund_appointment(appointment.id, "fee missing")
        .await
        .unwrap();
    assert_eq!(entry.amount, dec!(300.00));
}

#[tokio::test]
async fn bulk_cancellation_refunds_eligible_tokens_and_reports_skips() {
    let fx = fixture();
    let schedule_id = fx.schedule().await;

    let patient_a = Uuid::new_v4();
    let patient_b = Uuid::new_v4();
    let patient_c = Uuid::new_v4();

    let a = fx.book(schedule_id, Some(patient_a), dec!(400.00)).await;
    let guest = fx.book(schedule_id, None, dec!(400.00)).await;
    let b = fx.book(schedule_id, Some(patient_b), dec!(400.00)).await;
    let c = fx.book(schedule_id, Some(patient_c), dec!(600.00)).await;

    // B was already seen before the schedule collapsed.
    fx.move_to(b.id, &[AppointmentStatus::Start, AppointmentStatus::Completed])
        .await;

    let report = fx
        .engine
        .cancel_schedule_with_refunds(schedule_id, "doctor emergency")
        .await
        .unwrap();

    assert_eq!(report.refunded_appointments, 2);
    assert_eq!(report.total_refund_amount, dec!(1000.00));
    assert_eq!(report.skipped.len(), 2);
    assert!(report.skipped.iter().any(|s| s.appointment_id == guest.id));
    assert!(report.skipped.iter().any(|s| s.appointment_id == b.id));

    let schedule = fx.store.schedule(schedule_id).await.unwrap().unwrap();
    assert!(!schedule.is_open());
    assert_eq!(schedule.cancel_reason.as_deref(), Some("doctor emergency"));

    for id in [a.id, guest.id, c.id] {
        let appointment = fx.store.appointment(id).await.unwrap().unwrap();
        assert_eq!(appointment.status, AppointmentStatus::Cancel);
    }

    assert_eq!(
        fx.ledger.wallet(patient_a).await.unwrap().balance,
        dec!(400.00)
    );
    assert_eq!(
        fx.ledger.wallet(patient_c).await.unwrap().balance,
        dec!(600.00)
    );
    assert!(matches!(
        fx.ledger.wallet(patient_b).await.unwrap_err(),
        WalletError::WalletMissing { .. }
    ));
}

#[tokio::test]
async fn rerunning_a_bulk_cancellation_never_double_credits() {
    let fx = fixture();
    let schedule_id = fx.schedule().await;
    let patient_id = Uuid::new_v4();
    fx.book(schedule_id, Some(patient_id), dec!(400.00)).await;

    fx.engine
        .cancel_schedule_with_refunds(schedule_id, "clinic closure")
        .await
        .unwrap();
    let second = fx
        .engine
        .cancel_schedule_with_refunds(schedule_id, "clinic closure, retry")
        .await
        .unwrap();

    assert_eq!(second.refunded_appointments, 0);
    assert_eq!(second.total_refund_amount, Decimal::ZERO);
    assert_eq!(second.skipped.len(), 1);

    // The first cancellation reason wins.
    let schedule = fx.store.schedule(schedule_id).await.unwrap().unwrap();
    assert_eq!(schedule.cancel_reason.as_deref(), Some("clinic closure"));

    assert_eq!(
        fx.ledger.wallet(patient_id).await.unwrap().balance,
        dec!(400.00)
    );
}

#[tokio::test]
async fn inactive_wallet_skips_the_credit_and_keeps_the_token_refundable() {
    let fx = fixture();
    let schedule_id = fx.schedule().await;
    let patient_id = Uuid::new_v4();
    let appointment = fx.book(schedule_id, Some(patient_id), dec!(400.00)).await;

    fx.store.provision_wallet(patient_id);
    fx.store.set_wallet_active(patient_id, false).unwrap();

    let report = fx
        .engine
        .cancel_schedule_with_refunds(schedule_id, "doctor emergency")
        .await
        .unwrap();
    assert_eq!(report.refunded_appointments, 0);
    assert_eq!(report.skipped.len(), 1);

    // The cancellation itself stuck; only the credit is outstanding.
    let refreshed = fx.store.appointment(appointment.id).await.unwrap().unwrap();
    assert_eq!(refreshed.status, AppointmentStatus::Cancel);
    assert!(refreshed.is_eligible_for_refund);
    assert!(!refreshed.has_been_refunded);

    fx.store.set_wallet_active(patient_id, true).unwrap();
    let entry = fx
        .engine
        .refund_appointment(appointment.id, "retry after reactivation")
        .await
        .unwrap();
    assert_eq!(entry.amount, dec!(400.00));
}

#[tokio::test]
async fn ledger_replay_matches_the_stored_balance() {
    let fx = fixture();
    let patient_id = Uuid::new_v4();

    let first = fx.cancelled_booking(patient_id, dec!(500.00)).await;
    let second = fx.cancelled_booking(patient_id, dec!(250.00)).await;
    fx.engine
        .refund_appointment(first.id, "cancelled")
        .await
        .unwrap();
    fx.engine
        .refund_appointment(second.id, "cancelled")
        .await
        .unwrap();
    fx.ledger
        .debit(patient_id, dec!(100.00), "applied to next visit", None)
        .await
        .unwrap();

    let wallet = fx.ledger.wallet(patient_id).await.unwrap();
    assert_eq!(wallet.balance, dec!(650.00));
    assert_eq!(wallet.total_earned, dec!(750.00));
    assert_eq!(wallet.total_spent, dec!(100.00));

    let verification = fx.ledger.verify(patient_id).await.unwrap();
    assert!(verification.consistent, "issues: {:?}", verification.issues);
    assert_eq!(verification.transactions_replayed, 3);
}

#[tokio::test]
async fn refunds_reach_broadcast_subscribers() {
    let store = Arc::new(MemoryStore::new());
    let events = Arc::new(BroadcastPublisher::new(8));
    let lifecycle = Arc::new(AppointmentLifecycle::new(store.clone(), events.clone()));
    let engine = Arc::new(RefundEngine::new(
        store.clone(),
        events.clone(),
        lifecycle.clone(),
        RefundConfig::default(),
    ));
    let fx = Fixture {
        store: store.clone(),
        lifecycle,
        engine,
        ledger: WalletLedger::new(store),
    };
    let appointment = fx.cancelled_booking(Uuid::new_v4(), dec!(500.00)).await;

    // Subscribe after the cancellation so the first received event is the
    // refund itself.
    let mut rx = events.subscribe();
    let entry = fx
        .engine
        .refund_appointment(appointment.id, "patient cancelled")
        .await
        .unwrap();

    let event = rx.recv().await.unwrap();
    assert_eq!(event.event_type, DomainEvent::REFUND_ISSUED);
    assert_eq!(event.appointment_id, appointment.id);
    assert_eq!(event.payload["reason"], "patient cancelled");
    assert_eq!(
        event.payload["transaction_id"],
        serde_json::json!(entry.id)
    );
}

#[tokio::test]
async fn debits_cannot_overdraw_the_wallet() {
    let fx = fixture();
    let patient_id = Uuid::new_v4();
    let appointment = fx.cancelled_booking(patient_id, dec!(200.00)).await;
    fx.engine
        .refund_appointment(appointment.id, "cancelled")
        .await
        .unwrap();

    let err = fx
        .ledger
        .debit(patient_id, dec!(300.00), "too much", None)
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::InsufficientBalance { .. }));

    let wallet = fx.ledger.wallet(patient_id).await.unwrap();
    assert_eq!(wallet.balance, dec!(200.00));
    assert!(fx.ledger.verify(patient_id).await.unwrap().consistent);
}
