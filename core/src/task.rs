//! Maintenance task trait.
//!
//! RULE: Every integrity check implements MaintenanceTask.
//! The engine calls run() on each registered task in registration
//! order, once per sweep. Execution order is fixed and documented in engine.rs.

use crate::{error::LedgerResult, event::LedgerEvent, store::LedgerStore, types::RunMode};

/// The contract every maintenance task must fulfill.
pub trait MaintenanceTask: Send {
    /// Unique stable name for this task.
    fn name(&self) -> &'static str;

    /// Called once per sweep by the engine.
    ///
    /// - `store`: the ledger being inspected
    /// - `mode`:  Check only reports defects; Repair also fixes them
    ///
    /// Returns the events describing what was found and what was changed.
    fn run(&mut self, store: &LedgerStore, mode: RunMode) -> LedgerResult<Vec<LedgerEvent>>;

    /// True when later tasks cannot safely run against the ledger as it
    /// stands after this task. The engine stops the sweep early.
    fn halts_sweep(&self, _store: &LedgerStore) -> LedgerResult<bool> {
        Ok(false)
    }
}
