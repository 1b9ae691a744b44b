// Domain events consumed by the external notification dispatcher.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

/// Event emitted on every appointment state change or refund credit.
/// Delivery (push/SMS/in-app) is external; the engine only publishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent {
    pub const STATUS_CHANGED: &'static str = "status_changed";
    pub const REFUND_ISSUED: &'static str = "refund_issued";

    pub fn new(appointment_id: Uuid, event_type: &str, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            appointment_id,
            event_type: event_type.to_string(),
            payload,
            timestamp: Utc::now(),
        }
    }
}

/// Outbound event seam. Publishing is fire-and-forget from the engine's
/// point of view; a failed or missing subscriber never fails the booking
/// operation that produced the event.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: DomainEvent);
}

/// Default publisher: structured log lines only.
#[derive(Debug, Default, Clone)]
pub struct TracingPublisher;

#[async_trait]
impl EventPublisher for TracingPublisher {
    async fn publish(&self, event: DomainEvent) {
        info!(
            appointment_id = %event.appointment_id,
            event_type = %event.event_type,
            payload = %event.payload,
            "Domain event"
        );
    }
}

/// Broadcast publisher backing the server: in-process subscribers (the
/// notification dispatcher bridge) receive every event.
#[derive(Debug, Clone)]
pub struct BroadcastPublisher {
    sender: tokio::sync::broadcast::Sender<DomainEvent>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = tokio::sync::broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl EventPublisher for BroadcastPublisher {
    async fn publish(&self, event: DomainEvent) {
        // A send error only means there is no subscriber right now.
        if self.sender.send(event.clone()).is_err() {
            debug!(event_type = %event.event_type, "Domain event dropped: no subscribers");
        }
    }
}
