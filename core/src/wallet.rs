//! Wallet reconciliation. Compares each promoter's cached wallet balance
//! against the sum of their credited commissions.
//!
//! Design:
//!   - Ledger total = Σ affiliate_commission.amount where status = credited
//!   - Delta = cached - ledger; |delta| > tolerance → drift
//!   - Correction overwrites the cached balance with the ledger total and
//!     only happens in a Repair sweep with `correct_wallets` enabled

use crate::{
    config::WalletReconciliationConfig,
    error::{LedgerError, LedgerResult},
    event::LedgerEvent,
    store::{LedgerStore, WalletPositionRow},
    task::MaintenanceTask,
    types::{ProfileId, RunMode},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WalletDrift {
    pub profile_id: ProfileId,
    pub public_id: String,
    pub name: String,
    pub cached_balance: f64,
    pub ledger_total: f64,
    /// cached - ledger; positive means the wallet shows more than was earned.
    pub delta: f64,
}

impl From<WalletPositionRow> for WalletDrift {
    fn from(row: WalletPositionRow) -> Self {
        Self {
            delta: row.cached_balance - row.ledger_total,
            profile_id: row.profile_id,
            public_id: row.public_id,
            name: row.name,
            cached_balance: row.cached_balance,
            ledger_total: row.ledger_total,
        }
    }
}

/// Every wallet holder with its delta, drifted or not.
pub fn wallet_positions(store: &LedgerStore) -> LedgerResult<Vec<WalletDrift>> {
    Ok(store
        .wallet_positions()?
        .into_iter()
        .map(WalletDrift::from)
        .collect())
}

/// Wallet holders whose cached balance differs from the ledger by more than the tolerance.
pub fn wallet_drift(
    store: &LedgerStore,
    config: &WalletReconciliationConfig,
) -> LedgerResult<Vec<WalletDrift>> {
    Ok(wallet_positions(store)?
        .into_iter()
        .filter(|w| w.delta.abs() > config.tolerance)
        .collect())
}

/// Set the cached balance to the ledger total. Returns (old, new).
pub fn correct_wallet(store: &LedgerStore, profile_id: &str) -> LedgerResult<(f64, f64)> {
    store.in_transaction(|store| {
        let profile = store
            .profile(profile_id)?
            .ok_or_else(|| LedgerError::ProfileNotFound {
                profile_id: profile_id.to_string(),
            })?;
        if !profile.role.can_refer() {
            return Err(LedgerError::RoleMismatch {
                profile_id: profile.profile_id,
                expected: "promoter or admin",
                actual: profile.role,
            });
        }
        let ledger_total = store.credited_total(profile_id)?;
        store.set_wallet_balance(profile_id, ledger_total)?;
        log::info!(
            "wallet: corrected {} from {:.2} to {:.2}",
            profile.public_id,
            profile.wallet_balance,
            ledger_total
        );
        Ok((profile.wallet_balance, ledger_total))
    })
}

/// Reports wallet drift; corrects it only when configured to.
pub struct WalletTask {
    config: WalletReconciliationConfig,
}

impl WalletTask {
    pub fn new(config: WalletReconciliationConfig) -> Self {
        Self { config }
    }
}

impl MaintenanceTask for WalletTask {
    fn name(&self) -> &'static str {
        "wallet"
    }

    fn run(&mut self, store: &LedgerStore, mode: RunMode) -> LedgerResult<Vec<LedgerEvent>> {
        let mut events = Vec::new();
        let drifted = wallet_drift(store, &self.config)?;

        for w in &drifted {
            log::warn!(
                "wallet: {} cached {:.2} vs ledger {:.2} (delta {:+.2})",
                w.public_id,
                w.cached_balance,
                w.ledger_total,
                w.delta
            );
            events.push(LedgerEvent::WalletDriftDetected {
                profile_id: w.profile_id.clone(),
                cached_balance: w.cached_balance,
                ledger_total: w.ledger_total,
                delta: w.delta,
            });

            if mode == RunMode::Repair && self.config.correct_wallets {
                let (old_balance, new_balance) = correct_wallet(store, &w.profile_id)?;
                events.push(LedgerEvent::WalletCorrected {
                    profile_id: w.profile_id.clone(),
                    old_balance,
                    new_balance,
                });
            }
        }

        if mode == RunMode::Repair && !self.config.correct_wallets && !drifted.is_empty() {
            log::info!(
                "wallet: {} drifted wallets left as-is (correct_wallets is disabled)",
                drifted.len()
            );
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    #[test]
    fn delta_is_cached_minus_ledger() {
        let drift = WalletDrift::from(WalletPositionRow {
            profile_id: "p1".into(),
            public_id: "PROM0001".into(),
            name: "Asha".into(),
            role: Role::Promoter,
            cached_balance: 400.0,
            ledger_total: 600.0,
        });
        assert_eq!(drift.delta, -200.0);
    }
}
