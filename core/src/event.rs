//! Ledger events: the audit trail of every mutation and every defect found.
//!
//! RULE: Onboarding and maintenance tasks never report through stdout.
//! Everything they do or detect is returned as a LedgerEvent and
//! persisted to event_log by the caller.

use crate::types::{ProfileId, RunId, RunMode};
use serde::{Deserialize, Serialize};

/// Variants are appended, never removed or reordered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    // ── Sweep ─────────────────────────────────────
    SweepStarted {
        run_id: RunId,
        mode: RunMode,
    },
    SweepCompleted {
        run_id: RunId,
        events: usize,
    },

    // ── Onboarding ────────────────────────────────
    PromoterCreated {
        profile_id: ProfileId,
        public_id: String,
        parent_id: Option<ProfileId>,
    },
    CustomerCreated {
        profile_id: ProfileId,
        public_id: String,
        promoter_id: ProfileId,
    },
    ScheduleGenerated {
        customer_id: ProfileId,
        installments: u32,
    },

    // ── Payment schedule ──────────────────────────
    ScheduleIncomplete {
        customer_id: ProfileId,
        present: u32,
        missing: Vec<u32>,
        unexpected: Vec<u32>,
    },
    ScheduleRepaired {
        customer_id: ProfileId,
        inserted: u32,
    },

    // ── Commission ────────────────────────────────
    CommissionCredited {
        customer_id: ProfileId,
        recipient_id: ProfileId,
        level: u32,
        amount: f64,
    },
    CommissionUnallocated {
        customer_id: ProfileId,
        level: u32,
        amount: f64,
    },
    CommissionMissing {
        customer_id: ProfileId,
        missing_levels: Vec<u32>,
    },

    // ── Wallet ────────────────────────────────────
    WalletDriftDetected {
        profile_id: ProfileId,
        cached_balance: f64,
        ledger_total: f64,
        delta: f64,
    },
    WalletCorrected {
        profile_id: ProfileId,
        old_balance: f64,
        new_balance: f64,
    },

    // ── Schema ────────────────────────────────────
    ColumnMissing {
        table: String,
        column: String,
    },
    ColumnAdded {
        table: String,
        column: String,
    },

    // ── Appended ──────────────────────────────────
    IndexCreated {
        index: String,
    },
    AdminCreated {
        profile_id: ProfileId,
        public_id: String,
    },
    PinsRequested {
        request_id: String,
        promoter_id: ProfileId,
        pin_count: u32,
    },
}

impl LedgerEvent {
    /// Stable name used for the event_type column in event_log.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::SweepStarted { .. } => "sweep_started",
            Self::SweepCompleted { .. } => "sweep_completed",
            Self::PromoterCreated { .. } => "promoter_created",
            Self::CustomerCreated { .. } => "customer_created",
            Self::ScheduleGenerated { .. } => "schedule_generated",
            Self::ScheduleIncomplete { .. } => "schedule_incomplete",
            Self::ScheduleRepaired { .. } => "schedule_repaired",
            Self::CommissionCredited { .. } => "commission_credited",
            Self::CommissionUnallocated { .. } => "commission_unallocated",
            Self::CommissionMissing { .. } => "commission_missing",
            Self::WalletDriftDetected { .. } => "wallet_drift_detected",
            Self::WalletCorrected { .. } => "wallet_corrected",
            Self::ColumnMissing { .. } => "column_missing",
            Self::ColumnAdded { .. } => "column_added",
            Self::IndexCreated { .. } => "index_created",
            Self::AdminCreated { .. } => "admin_created",
            Self::PinsRequested { .. } => "pins_requested",
        }
    }
}

/// The event log entry as persisted to SQLite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id: Option<i64>,
    pub run_id: RunId,
    pub task: String,
    pub event_type: String,
    pub payload: String, // JSON-serialized LedgerEvent
}

impl EventLogEntry {
    pub fn new(run_id: &str, task: &str, event: &LedgerEvent) -> serde_json::Result<Self> {
        Ok(Self {
            id: None,
            run_id: run_id.to_string(),
            task: task.to_string(),
            event_type: event.event_type().to_string(),
            payload: serde_json::to_string(event)?,
        })
    }

    pub fn decode(&self) -> serde_json::Result<LedgerEvent> {
        serde_json::from_str(&self.payload)
    }
}
