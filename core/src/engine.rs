//! The maintenance engine: runs every integrity task over the ledger.
//!
//! EXECUTION ORDER (fixed, documented, never reordered):
//!   1. Schema task      (columns must exist before anything reads them)
//!   2. Schedule task
//!   3. Commission task  (credits wallets)
//!   4. Wallet task      (must see the commission repairs of this sweep)
//!
//! RULES:
//!   - Tasks execute in registration order, once per sweep.
//!   - No task calls another task directly.
//!   - Every event a task returns is recorded in the event log.
//!   - A task that reports the ledger unusable (halts_sweep) ends the sweep.

use crate::{
    commission::CommissionTask,
    config::LedgerConfig,
    error::LedgerResult,
    event::{EventLogEntry, LedgerEvent},
    schedule::ScheduleTask,
    schema_repair::SchemaTask,
    store::LedgerStore,
    task::MaintenanceTask,
    types::{RunId, RunMode},
    wallet::WalletTask,
};
use serde::Serialize;

pub struct MaintenanceEngine {
    pub run_id: RunId,
    pub store: LedgerStore,
    tasks: Vec<Box<dyn MaintenanceTask>>,
}

/// Everything one sweep found or changed, in emission order.
#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub run_id: RunId,
    pub mode: RunMode,
    pub events: Vec<(String, LedgerEvent)>,
    /// Task that stopped the sweep before the remaining tasks ran.
    pub halted_by: Option<String>,
}

impl SweepReport {
    pub fn count(&self, event_type: &str) -> usize {
        self.events
            .iter()
            .filter(|(_, e)| e.event_type() == event_type)
            .count()
    }

    /// True when nothing was found that needs attention.
    pub fn is_clean(&self) -> bool {
        self.events.is_empty() && self.halted_by.is_none()
    }
}

impl MaintenanceEngine {
    pub fn new(run_id: RunId, store: LedgerStore) -> Self {
        Self {
            run_id,
            store,
            tasks: Vec::new(),
        }
    }

    /// Build an engine with all tasks registered.
    /// Call this instead of new() + manual register() calls.
    pub fn build(run_id: RunId, config: &LedgerConfig, store: LedgerStore) -> Self {
        let mut engine = MaintenanceEngine::new(run_id, store);

        // EXECUTION ORDER: fixed, documented, never reordered.
        engine.register(Box::new(SchemaTask));
        engine.register(Box::new(ScheduleTask::new(config.schedule.clone())));
        engine.register(Box::new(CommissionTask::new(config.commission.clone())));
        engine.register(Box::new(WalletTask::new(config.wallet.clone())));
        engine
    }

    /// In-memory, migrated engine with test config.
    pub fn build_test(run_id: RunId) -> LedgerResult<Self> {
        let store = LedgerStore::in_memory()?;
        store.migrate()?;
        Ok(Self::build(run_id, &LedgerConfig::default_test(), store))
    }

    /// Register a task. Call in the documented execution order.
    pub fn register(&mut self, task: Box<dyn MaintenanceTask>) {
        self.tasks.push(task);
    }

    pub fn task_names(&self) -> Vec<&'static str> {
        self.tasks.iter().map(|t| t.name()).collect()
    }

    /// Run every task once, in order, and persist what they report.
    pub fn sweep(&mut self, mode: RunMode) -> LedgerResult<SweepReport> {
        self.store
            .insert_run(&self.run_id, mode, env!("CARGO_PKG_VERSION"))?;
        self.record(
            "engine",
            &LedgerEvent::SweepStarted {
                run_id: self.run_id.clone(),
                mode,
            },
        )?;

        let mut report = SweepReport {
            run_id: self.run_id.clone(),
            mode,
            events: Vec::new(),
            halted_by: None,
        };

        for task in &mut self.tasks {
            let events = task.run(&self.store, mode)?;
            for event in events {
                let entry = EventLogEntry::new(&self.run_id, task.name(), &event)?;
                self.store.append_event(&entry)?;
                report.events.push((task.name().to_string(), event));
            }
            if task.halts_sweep(&self.store)? {
                log::warn!(
                    "sweep {}: {} left the ledger unusable, remaining tasks skipped",
                    self.run_id,
                    task.name()
                );
                report.halted_by = Some(task.name().to_string());
                break;
            }
        }

        self.record(
            "engine",
            &LedgerEvent::SweepCompleted {
                run_id: self.run_id.clone(),
                events: report.events.len(),
            },
        )?;
        log::info!(
            "sweep {} ({mode}) finished with {} events",
            self.run_id,
            report.events.len()
        );
        Ok(report)
    }

    fn record(&self, task: &str, event: &LedgerEvent) -> LedgerResult<()> {
        let entry = EventLogEntry::new(&self.run_id, task, event)?;
        self.store.append_event(&entry)
    }
}
