pub mod appointments;
pub mod health;
pub mod queue;
pub mod reports;
pub mod schedules;
pub mod wallets;
