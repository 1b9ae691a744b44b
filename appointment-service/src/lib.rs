//! Appointment token services for the ClinicFlow booking engine.
//!
//! Covers the write path from booking to terminal state:
//! - token allocation against a schedule (sequential numbering, capacity
//!   and duplicate guards)
//! - the appointment lifecycle state machine and its refund-eligibility
//!   side effects
//! - read-only projections: queue progress for patients, report queries
//!   and per-doctor statistics for staff
//! - domain event emission for the external notification dispatcher

pub mod allocator;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod models;
pub mod queue;
pub mod reports;

pub use allocator::TokenAllocator;
pub use error::{AppointmentError, AppointmentResult};
pub use events::{BroadcastPublisher, DomainEvent, EventPublisher, TracingPublisher};
pub use lifecycle::AppointmentLifecycle;
pub use models::*;
pub use queue::QueueReporter;
pub use reports::ReportService;
