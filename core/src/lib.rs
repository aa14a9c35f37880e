//! Ledger core for the promoter/customer affiliate programme: payment
//! schedules, multi-level commissions, cached wallet balances, and the
//! maintenance tasks that keep them consistent.

pub mod commission;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod onboarding;
pub mod schedule;
pub mod schema_repair;
pub mod store;
pub mod task;
pub mod types;
pub mod wallet;
