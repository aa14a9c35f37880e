//! Payment schedule: the fixed monthly installments every customer owes.
//!
//! Rules:
//!   - Exactly `installment_count` rows per customer, months 1..=N.
//!   - Every installment carries the same fixed amount and starts pending.
//!   - Month 1 is due on the signup date; month n is due n-1 months later.
//!   - Repair inserts only the missing months; a complete schedule is left alone.

use crate::{
    config::ScheduleConfig,
    error::LedgerResult,
    event::LedgerEvent,
    store::{LedgerStore, Profile},
    task::MaintenanceTask,
    types::{PaymentStatus, ProfileId, Role, RunMode},
};
use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Installment {
    pub payment_id: String,
    pub customer_id: ProfileId,
    pub month_number: u32,
    pub amount: f64,
    pub due_date: Option<NaiveDate>,
    pub status: PaymentStatus,
}

impl Installment {
    fn pending(customer_id: &str, month_number: u32, amount: f64, start: NaiveDate) -> Self {
        Self {
            payment_id: uuid::Uuid::new_v4().to_string(),
            customer_id: customer_id.to_string(),
            month_number,
            amount,
            due_date: start.checked_add_months(Months::new(month_number - 1)),
            status: PaymentStatus::Pending,
        }
    }
}

/// Build the full schedule for a customer whose first installment is due on `start`.
pub fn generate_schedule(
    config: &ScheduleConfig,
    customer_id: &str,
    start: NaiveDate,
) -> Vec<Installment> {
    (1..=config.installment_count)
        .map(|month| Installment::pending(customer_id, month, config.installment_amount, start))
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleHealth {
    pub present: u32,
    pub missing: Vec<u32>,
    pub duplicated: Vec<u32>,
    pub out_of_range: Vec<u32>,
}

impl ScheduleHealth {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && self.duplicated.is_empty() && self.out_of_range.is_empty()
    }

    /// Month numbers that should not be there at all.
    pub fn unexpected(&self) -> Vec<u32> {
        let mut months: Vec<u32> = self
            .duplicated
            .iter()
            .chain(self.out_of_range.iter())
            .copied()
            .collect();
        months.sort_unstable();
        months.dedup();
        months
    }
}

/// Compare a customer's rows against the expected 1..=N month set.
pub fn inspect_schedule(config: &ScheduleConfig, rows: &[Installment]) -> ScheduleHealth {
    let mut seen: BTreeMap<u32, u32> = BTreeMap::new();
    for row in rows {
        *seen.entry(row.month_number).or_default() += 1;
    }

    let expected = 1..=config.installment_count;
    ScheduleHealth {
        present: rows.len() as u32,
        missing: expected
            .clone()
            .filter(|m| !seen.contains_key(m))
            .collect(),
        duplicated: seen
            .iter()
            .filter(|(_, n)| **n > 1)
            .map(|(m, _)| *m)
            .collect(),
        out_of_range: seen
            .keys()
            .filter(|m| !expected.contains(*m))
            .copied()
            .collect(),
    }
}

/// Insert the months missing from `customer`'s schedule. Returns how many
/// rows were inserted; 0 when the schedule was already complete.
pub fn repair_schedule(
    store: &LedgerStore,
    config: &ScheduleConfig,
    customer: &Profile,
) -> LedgerResult<u32> {
    store.in_transaction(|store| {
        let rows = store.installments_for(&customer.profile_id)?;
        let health = inspect_schedule(config, &rows);
        if health.missing.is_empty() {
            return Ok(0);
        }

        // Keep whatever amount the surviving rows were created with.
        let amount = rows
            .first()
            .map(|r| r.amount)
            .unwrap_or(config.installment_amount);
        let start = customer.created_at.date_naive();

        let mut inserted = 0;
        for month in &health.missing {
            let installment = Installment::pending(&customer.profile_id, *month, amount, start);
            if store.insert_installment(&installment)? {
                inserted += 1;
            }
        }
        log::info!(
            "schedule: inserted {inserted} missing installments for customer {}",
            customer.public_id
        );
        Ok(inserted)
    })
}

/// Finds customers whose payment schedule is incomplete.
pub struct ScheduleTask {
    config: ScheduleConfig,
}

impl ScheduleTask {
    pub fn new(config: ScheduleConfig) -> Self {
        Self { config }
    }
}

impl MaintenanceTask for ScheduleTask {
    fn name(&self) -> &'static str {
        "schedule"
    }

    fn run(&mut self, store: &LedgerStore, mode: RunMode) -> LedgerResult<Vec<LedgerEvent>> {
        let mut events = Vec::new();
        let customers = store.profiles_by_role(Some(Role::Customer))?;

        for customer in &customers {
            let rows = store.installments_for(&customer.profile_id)?;
            let health = inspect_schedule(&self.config, &rows);
            if health.is_complete() {
                continue;
            }

            events.push(LedgerEvent::ScheduleIncomplete {
                customer_id: customer.profile_id.clone(),
                present: health.present,
                missing: health.missing.clone(),
                unexpected: health.unexpected(),
            });

            if !health.unexpected().is_empty() {
                log::warn!(
                    "schedule: customer {} has unexpected months {:?}, left for manual review",
                    customer.public_id,
                    health.unexpected()
                );
            }

            if mode == RunMode::Repair && !health.missing.is_empty() {
                let inserted = repair_schedule(store, &self.config, customer)?;
                events.push(LedgerEvent::ScheduleRepaired {
                    customer_id: customer.profile_id.clone(),
                    inserted,
                });
            }
        }

        log::info!(
            "schedule: scanned {} customers, {} events",
            customers.len(),
            events.len()
        );
        Ok(events)
    }
}
