use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use database_layer::{BookingStore, Wallet, WalletTransaction};

use crate::error::{WalletError, WalletResult};
use crate::models::LedgerVerification;

/// Read surface and consistency checks over the per-patient wallet ledger.
pub struct WalletLedger {
    store: Arc<dyn BookingStore>,
}

impl WalletLedger {
    pub fn new(store: Arc<dyn BookingStore>) -> Self {
        Self { store }
    }

    pub async fn wallet(&self, patient_id: Uuid) -> WalletResult<Wallet> {
        self.store
            .wallet_for_patient(patient_id)
            .await?
            .ok_or(WalletError::WalletMissing { patient_id })
    }

    /// Full transaction history for a patient, in commit order.
    pub async fn history(&self, patient_id: Uuid) -> WalletResult<Vec<WalletTransaction>> {
        let wallet = self.wallet(patient_id).await?;
        Ok(self.store.wallet_transactions(wallet.id).await?)
    }

    /// Debit a wallet; the balance check happens in the same atomic unit as
    /// the write, so the balance can never go negative.
    pub async fn debit(
        &self,
        patient_id: Uuid,
        amount: Decimal,
        description: &str,
        related_appointment_id: Option<Uuid>,
    ) -> WalletResult<WalletTransaction> {
        Ok(self
            .store
            .debit_wallet(patient_id, amount, description, related_appointment_id)
            .await?)
    }

    /// Replay the transaction log and cross-check it against the wallet.
    ///
    /// Verifies the balance identity `balance == total_earned - total_spent`
    /// and that each entry's `new_balance` matches the running total at that
    /// point. Used by tests and the admin consistency endpoint.
    pub async fn verify(&self, patient_id: Uuid) -> WalletResult<LedgerVerification> {
        let wallet = self.wallet(patient_id).await?;
        let transactions = self.store.wallet_transactions(wallet.id).await?;

        let mut issues = Vec::new();

        if wallet.balance != wallet.total_earned - wallet.total_spent {
            issues.push(format!(
                "balance {} != total_earned {} - total_spent {}",
                wallet.balance, wallet.total_earned, wallet.total_spent
            ));
        }

        let mut running = Decimal::ZERO;
        for entry in &transactions {
            if entry.is_credit {
                running += entry.amount;
            } else {
                running -= entry.amount;
            }
            if entry.new_balance != running {
                issues.push(format!(
                    "transaction {} recorded new_balance {} but replay gives {}",
                    entry.id, entry.new_balance, running
                ));
            }
        }

        if running != wallet.balance {
            issues.push(format!(
                "replayed total {} does not reproduce current balance {}",
                running, wallet.balance
            ));
        }

        if !issues.is_empty() {
            warn!(
                wallet_id = %wallet.id,
                issue_count = issues.len(),
                "Wallet ledger verification found inconsistencies"
            );
        }

        Ok(LedgerVerification {
            wallet_id: wallet.id,
            transactions_replayed: transactions.len(),
            consistent: issues.is_empty(),
            issues,
        })
    }
}
