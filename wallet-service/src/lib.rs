//! Wallet ledger and refund engine for the ClinicFlow booking engine.
//!
//! The wallet is the authoritative record of money owed or returned per
//! patient: an append-only transaction log plus a running balance that must
//! always equal `total_earned - total_spent`. The refund engine drives
//! credits against it, exactly once per appointment, whether invoked for a
//! single cancellation or a schedule-wide bulk cancellation.

pub mod error;
pub mod ledger;
pub mod models;
pub mod refund;

pub use error::{WalletError, WalletResult};
pub use ledger::WalletLedger;
pub use models::*;
pub use refund::{RefundConfig, RefundEngine};
