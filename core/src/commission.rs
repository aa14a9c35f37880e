//! Multi-level affiliate commission.
//!
//! When a customer signs up, every promoter above them in the referral
//! chain earns a level-dependent amount:
//!   - level 1 is the customer's own promoter, level 2 that promoter's parent, ...
//!   - the walk stops at an admin, at a profile with no parent, or at the
//!     deepest configured level
//!   - levels left without a promoter go to the first admin when
//!     `credit_remainder_to_admin` is set, otherwise they stay unallocated
//!
//! Every credited row increments the recipient's cached wallet in the same
//! transaction. A level that already has a row for the customer is never
//! paid again, so distribution can be re-run safely.

use crate::{
    config::CommissionConfig,
    error::{LedgerError, LedgerResult},
    event::{EventLogEntry, LedgerEvent},
    store::{CommissionRow, LedgerStore, Profile},
    task::MaintenanceTask,
    types::{CommissionStatus, ProfileId, Role, RunMode},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommissionShare {
    pub level: u32,
    pub recipient_id: ProfileId,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnallocatedLevel {
    pub level: u32,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DistributionPlan {
    pub customer_id: ProfileId,
    pub shares: Vec<CommissionShare>,
    pub unallocated: Vec<UnallocatedLevel>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DistributionOutcome {
    pub customer_id: ProfileId,
    pub credited: Vec<CommissionShare>,
    /// Levels skipped because the customer already had a row for them.
    pub already_present: Vec<u32>,
    pub unallocated: Vec<UnallocatedLevel>,
}

impl DistributionOutcome {
    pub fn total_credited(&self) -> f64 {
        self.credited.iter().map(|s| s.amount).sum()
    }

    pub fn events(&self) -> Vec<LedgerEvent> {
        let credited = self.credited.iter().map(|s| LedgerEvent::CommissionCredited {
            customer_id: self.customer_id.clone(),
            recipient_id: s.recipient_id.clone(),
            level: s.level,
            amount: s.amount,
        });
        let unallocated = self
            .unallocated
            .iter()
            .map(|u| LedgerEvent::CommissionUnallocated {
                customer_id: self.customer_id.clone(),
                level: u.level,
                amount: u.amount,
            });
        credited.chain(unallocated).collect()
    }
}

/// Walk the referral chain upward from `start_id`, returning at most
/// `max_depth` promoters, nearest first.
pub fn referral_chain(
    store: &LedgerStore,
    start_id: &str,
    max_depth: usize,
) -> LedgerResult<Vec<Profile>> {
    let mut chain = Vec::new();
    let mut visited = HashSet::new();
    let mut next = Some(start_id.to_string());

    while let Some(id) = next.take() {
        if chain.len() >= max_depth {
            break;
        }
        if !visited.insert(id.clone()) {
            return Err(LedgerError::ReferralCycle { profile_id: id });
        }
        let profile = store
            .profile(&id)?
            .ok_or_else(|| LedgerError::ProfileNotFound {
                profile_id: id.clone(),
            })?;
        match profile.role {
            Role::Promoter => {
                next = profile.parent_promoter_id.clone();
                chain.push(profile);
            }
            Role::Admin => break,
            Role::Customer => {
                return Err(LedgerError::RoleMismatch {
                    profile_id: id,
                    expected: "promoter",
                    actual: Role::Customer,
                })
            }
        }
    }
    Ok(chain)
}

/// Assign every configured level to a recipient. Pure; touches no storage.
pub fn plan_distribution(
    config: &CommissionConfig,
    customer_id: &str,
    chain: &[Profile],
    admin: Option<&Profile>,
) -> DistributionPlan {
    let mut shares = Vec::new();
    let mut unallocated = Vec::new();

    for (idx, level) in config.levels.iter().enumerate() {
        if level.amount <= 0.0 {
            continue;
        }
        let recipient = chain.get(idx).or(admin);
        match recipient {
            Some(p) => shares.push(CommissionShare {
                level: level.level,
                recipient_id: p.profile_id.clone(),
                amount: level.amount,
            }),
            None => unallocated.push(UnallocatedLevel {
                level: level.level,
                amount: level.amount,
            }),
        }
    }

    DistributionPlan {
        customer_id: customer_id.to_string(),
        shares,
        unallocated,
    }
}

/// Build the plan for a stored customer from the current referral chain.
pub fn plan_for_customer(
    store: &LedgerStore,
    config: &CommissionConfig,
    customer: &Profile,
) -> LedgerResult<DistributionPlan> {
    let chain = match &customer.parent_promoter_id {
        Some(promoter_id) => referral_chain(store, promoter_id, config.max_depth())?,
        None => Vec::new(),
    };
    let admin = if config.credit_remainder_to_admin {
        store.first_admin()?
    } else {
        None
    };
    Ok(plan_distribution(
        config,
        &customer.profile_id,
        &chain,
        admin.as_ref(),
    ))
}

/// Credit every level the customer has not been paid for yet.
pub fn distribute_commission(
    store: &LedgerStore,
    config: &CommissionConfig,
    customer_id: &str,
    now: DateTime<Utc>,
) -> LedgerResult<DistributionOutcome> {
    store.in_transaction(|store| {
        let customer = require_customer(store, customer_id)?;
        let plan = plan_for_customer(store, config, &customer)?;
        let paid_levels: HashSet<u32> = store
            .commissions_for_customer(&customer.profile_id)?
            .iter()
            .map(|c| c.level)
            .collect();

        let mut outcome = DistributionOutcome {
            customer_id: customer.profile_id.clone(),
            credited: Vec::new(),
            already_present: Vec::new(),
            unallocated: plan.unallocated,
        };

        for share in plan.shares {
            if paid_levels.contains(&share.level) {
                outcome.already_present.push(share.level);
                continue;
            }
            let row = CommissionRow {
                commission_id: uuid::Uuid::new_v4().to_string(),
                customer_id: customer.profile_id.clone(),
                recipient_id: share.recipient_id.clone(),
                level: share.level,
                amount: share.amount,
                status: CommissionStatus::Credited,
                created_at: now,
            };
            if store.insert_commission(&row)? {
                store.credit_wallet(&share.recipient_id, share.amount)?;
                outcome.credited.push(share);
            } else {
                outcome.already_present.push(share.level);
            }
        }

        log::info!(
            "commission: customer {} credited {} shares ({:.2}), {} already present, {} unallocated",
            customer.public_id,
            outcome.credited.len(),
            outcome.total_credited(),
            outcome.already_present.len(),
            outcome.unallocated.len()
        );
        Ok(outcome)
    })
}

/// Distribute outside onboarding, logging the credits under their own run.
pub fn distribute_and_record(
    store: &LedgerStore,
    config: &CommissionConfig,
    customer_id: &str,
    run_id: &str,
    now: DateTime<Utc>,
) -> LedgerResult<DistributionOutcome> {
    store.in_transaction(|store| {
        store.insert_run(run_id, RunMode::Repair, env!("CARGO_PKG_VERSION"))?;
        let outcome = distribute_commission(store, config, customer_id, now)?;
        for event in outcome.events() {
            store.append_event(&EventLogEntry::new(run_id, "commission", &event)?)?;
        }
        Ok(outcome)
    })
}

fn require_customer(store: &LedgerStore, customer_id: &str) -> LedgerResult<Profile> {
    let customer = store
        .profile(customer_id)?
        .ok_or_else(|| LedgerError::ProfileNotFound {
            profile_id: customer_id.to_string(),
        })?;
    if customer.role != Role::Customer {
        return Err(LedgerError::RoleMismatch {
            profile_id: customer.profile_id,
            expected: "customer",
            actual: customer.role,
        });
    }
    Ok(customer)
}

/// Finds customers whose commission levels were never paid.
pub struct CommissionTask {
    config: CommissionConfig,
}

impl CommissionTask {
    pub fn new(config: CommissionConfig) -> Self {
        Self { config }
    }
}

impl MaintenanceTask for CommissionTask {
    fn name(&self) -> &'static str {
        "commission"
    }

    fn run(&mut self, store: &LedgerStore, mode: RunMode) -> LedgerResult<Vec<LedgerEvent>> {
        let mut events = Vec::new();
        let customers = store.profiles_by_role(Some(Role::Customer))?;

        for customer in &customers {
            let plan = match plan_for_customer(store, &self.config, customer) {
                Ok(plan) => plan,
                Err(e) if e.is_data_defect() => {
                    log::warn!("commission: skipping customer {}: {e}", customer.public_id);
                    continue;
                }
                Err(e) => return Err(e),
            };

            let paid_levels: HashSet<u32> = store
                .commissions_for_customer(&customer.profile_id)?
                .iter()
                .map(|c| c.level)
                .collect();
            let missing_levels: Vec<u32> = plan
                .shares
                .iter()
                .map(|s| s.level)
                .filter(|level| !paid_levels.contains(level))
                .collect();
            if missing_levels.is_empty() {
                continue;
            }

            events.push(LedgerEvent::CommissionMissing {
                customer_id: customer.profile_id.clone(),
                missing_levels,
            });

            if mode == RunMode::Repair {
                let outcome =
                    distribute_commission(store, &self.config, &customer.profile_id, Utc::now())?;
                events.extend(outcome.events());
            }
        }

        log::info!(
            "commission: scanned {} customers, {} events",
            customers.len(),
            events.len()
        );
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;
    use crate::types::ProfileStatus;

    fn promoter(id: &str) -> Profile {
        Profile {
            profile_id: id.into(),
            role: Role::Promoter,
            name: id.into(),
            email: None,
            phone: None,
            public_id: id.to_uppercase(),
            parent_promoter_id: None,
            wallet_balance: 0.0,
            status: ProfileStatus::Active,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn full_chain_fills_every_level_in_order() {
        let config = LedgerConfig::default_test().commission;
        let chain: Vec<Profile> = ["p1", "p2", "p3", "p4"].iter().map(|id| promoter(id)).collect();

        let plan = plan_distribution(&config, "c1", &chain, None);

        let recipients: Vec<&str> = plan.shares.iter().map(|s| s.recipient_id.as_str()).collect();
        assert_eq!(recipients, vec!["p1", "p2", "p3", "p4"]);
        assert_eq!(plan.shares[0].amount, 500.0);
        assert!(plan.unallocated.is_empty());
    }

    #[test]
    fn short_chain_sends_remainder_to_admin() {
        let config = LedgerConfig::default_test().commission;
        let chain = vec![promoter("p1")];
        let mut admin = promoter("root");
        admin.role = Role::Admin;

        let plan = plan_distribution(&config, "c1", &chain, Some(&admin));

        assert_eq!(plan.shares.len(), 4);
        assert_eq!(plan.shares[0].recipient_id, "p1");
        assert!(plan.shares[1..].iter().all(|s| s.recipient_id == "root"));
        let total: f64 = plan.shares.iter().map(|s| s.amount).sum();
        assert_eq!(total, config.pool());
    }

    #[test]
    fn short_chain_without_admin_leaves_levels_unallocated() {
        let config = LedgerConfig::default_test().commission;
        let chain = vec![promoter("p1"), promoter("p2")];

        let plan = plan_distribution(&config, "c1", &chain, None);

        assert_eq!(plan.shares.len(), 2);
        let levels: Vec<u32> = plan.unallocated.iter().map(|u| u.level).collect();
        assert_eq!(levels, vec![3, 4]);
    }

    #[test]
    fn zero_amount_levels_are_skipped() {
        let mut config = LedgerConfig::default_test().commission;
        config.levels[1].amount = 0.0;
        let chain: Vec<Profile> = ["p1", "p2", "p3", "p4"].iter().map(|id| promoter(id)).collect();

        let plan = plan_distribution(&config, "c1", &chain, None);

        let levels: Vec<u32> = plan.shares.iter().map(|s| s.level).collect();
        assert_eq!(levels, vec![1, 3, 4]);
    }
}
