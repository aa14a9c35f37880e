use crate::error::{LedgerError, LedgerResult};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Number of monthly installments every customer owes.
    pub installment_count: u32,
    /// Fixed amount of each installment.
    pub installment_amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionLevel {
    /// Referral-chain distance; 1 is the customer's own promoter.
    pub level: u32,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionConfig {
    pub levels: Vec<CommissionLevel>,
    /// Credit levels with no promoter in the chain to the first admin.
    #[serde(default)]
    pub credit_remainder_to_admin: bool,
}

impl CommissionConfig {
    /// Deepest level that earns commission.
    pub fn max_depth(&self) -> usize {
        self.levels.len()
    }

    pub fn amount_for_level(&self, level: u32) -> Option<f64> {
        self.levels
            .iter()
            .find(|l| l.level == level)
            .map(|l| l.amount)
    }

    /// Total paid out per customer when every level is filled.
    pub fn pool(&self) -> f64 {
        self.levels.iter().map(|l| l.amount).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletReconciliationConfig {
    /// Absolute difference below which a wallet is considered in sync.
    pub tolerance: f64,
    /// Allow repair sweeps to overwrite cached balances with the ledger total.
    #[serde(default)]
    pub correct_wallets: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromoterIdConfig {
    pub prefix: String,
    /// Zero-padded width of the numeric suffix.
    pub width: usize,
}

#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub schedule: ScheduleConfig,
    pub commission: CommissionConfig,
    pub wallet: WalletReconciliationConfig,
    pub promoter_id: PromoterIdConfig,
}

impl LedgerConfig {
    /// Load from the data/ directory.
    /// In tests, use LedgerConfig::default_test().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let config = Self {
            schedule: read_json(&format!("{data_dir}/schedule/payment_schedule.json"))?,
            commission: read_json(&format!("{data_dir}/commission/commission_levels.json"))?,
            wallet: read_json(&format!(
                "{data_dir}/reconciliation/wallet_reconciliation.json"
            ))?,
            promoter_id: read_json(&format!("{data_dir}/promoter/promoter_id.json"))?,
        };
        config.validate()?;
        log::debug!(
            "Loaded config from {data_dir}: {} installments, {} commission levels",
            config.schedule.installment_count,
            config.commission.levels.len()
        );
        Ok(config)
    }

    /// Config with hardcoded defaults for use in unit tests.
    pub fn default_test() -> Self {
        Self {
            schedule: ScheduleConfig {
                installment_count: 20,
                installment_amount: 1000.0,
            },
            commission: CommissionConfig {
                levels: vec![
                    CommissionLevel { level: 1, amount: 500.0 },
                    CommissionLevel { level: 2, amount: 100.0 },
                    CommissionLevel { level: 3, amount: 100.0 },
                    CommissionLevel { level: 4, amount: 100.0 },
                ],
                credit_remainder_to_admin: true,
            },
            wallet: WalletReconciliationConfig {
                tolerance: 0.01,
                correct_wallets: false,
            },
            promoter_id: PromoterIdConfig {
                prefix: "PROM".into(),
                width: 4,
            },
        }
    }

    pub fn validate(&self) -> LedgerResult<()> {
        if self.schedule.installment_count == 0 {
            return Err(LedgerError::InvalidConfig(
                "installment_count must be at least 1".into(),
            ));
        }
        if !(self.schedule.installment_amount > 0.0) {
            return Err(LedgerError::InvalidConfig(
                "installment_amount must be positive".into(),
            ));
        }
        // Levels must be numbered 1..=n in order so level lookups match chain depth.
        for (idx, level) in self.commission.levels.iter().enumerate() {
            if level.level as usize != idx + 1 {
                return Err(LedgerError::InvalidConfig(format!(
                    "commission levels must be numbered 1..n in order, found {} at position {}",
                    level.level,
                    idx + 1
                )));
            }
            if level.amount < 0.0 {
                return Err(LedgerError::InvalidConfig(format!(
                    "commission level {} has a negative amount",
                    level.level
                )));
            }
        }
        if self.wallet.tolerance < 0.0 {
            return Err(LedgerError::InvalidConfig(
                "wallet tolerance must not be negative".into(),
            ));
        }
        if self.promoter_id.prefix.is_empty() || self.promoter_id.width == 0 {
            return Err(LedgerError::InvalidConfig(
                "promoter id prefix and width must be set".into(),
            ));
        }
        Ok(())
    }
}

fn read_json<T: DeserializeOwned>(path: &str) -> anyhow::Result<T> {
    let content =
        std::fs::read_to_string(path).map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
    serde_json::from_str(&content).map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        LedgerConfig::default_test().validate().unwrap();
    }

    #[test]
    fn default_pool_sums_all_levels() {
        let config = LedgerConfig::default_test();
        assert_eq!(config.commission.pool(), 800.0);
        assert_eq!(config.commission.max_depth(), 4);
        assert_eq!(config.commission.amount_for_level(2), Some(100.0));
        assert_eq!(config.commission.amount_for_level(5), None);
    }

    #[test]
    fn out_of_order_levels_are_rejected() {
        let mut config = LedgerConfig::default_test();
        config.commission.levels.swap(0, 1);
        assert!(matches!(
            config.validate(),
            Err(LedgerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn zero_installments_are_rejected() {
        let mut config = LedgerConfig::default_test();
        config.schedule.installment_count = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn bundled_data_directory_loads() {
        let data_dir = concat!(env!("CARGO_MANIFEST_DIR"), "/../data");
        let config = LedgerConfig::load(data_dir).unwrap();
        assert_eq!(config.schedule.installment_count, 20);
        assert_eq!(config.promoter_id.prefix, "PROM");
        assert!(config.commission.credit_remainder_to_admin);
    }
}
