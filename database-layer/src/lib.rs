//! Persistence layer for the ClinicFlow booking engine.
//!
//! Exposes the four booking tables (`schedules`, `appointments`, `wallets`,
//! `wallet_transactions`) behind the [`BookingStore`] contract. Every
//! multi-row mutation (token allocation, status compare-and-set, refund
//! credit) is a single atomic unit inside the store, so callers never have
//! to coordinate partial writes themselves.
//!
//! Two backends are provided:
//! - [`PostgresStore`]: row-scoped transactions over sqlx/PostgreSQL
//! - [`MemoryStore`]: lock-per-row in-memory tables for tests and local runs

pub mod connection;
pub mod error;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;

pub use connection::DatabasePool;
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use models::*;
pub use postgres::PostgresStore;
pub use store::BookingStore;
