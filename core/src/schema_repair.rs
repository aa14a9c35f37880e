//! Schema repair. Databases created by older releases may lack columns
//! the ledger relies on. Missing columns are added with ALTER TABLE through
//! the admin SQL path; missing tables are left to `LedgerStore::migrate`.

use crate::{
    error::LedgerResult,
    event::LedgerEvent,
    store::LedgerStore,
    task::MaintenanceTask,
    types::RunMode,
};

/// A column the ledger requires, with a declaration ALTER TABLE accepts
/// (no UNIQUE / PRIMARY KEY; NOT NULL only with a default).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequiredColumn {
    pub table: &'static str,
    pub column: &'static str,
    pub declaration: &'static str,
}

pub const REQUIRED_COLUMNS: &[RequiredColumn] = &[
    RequiredColumn { table: "profile", column: "email", declaration: "TEXT" },
    RequiredColumn { table: "profile", column: "phone", declaration: "TEXT" },
    RequiredColumn {
        table: "profile",
        column: "parent_promoter_id",
        declaration: "TEXT REFERENCES profile(profile_id)",
    },
    RequiredColumn {
        table: "profile",
        column: "wallet_balance",
        declaration: "REAL NOT NULL DEFAULT 0",
    },
    RequiredColumn {
        table: "profile",
        column: "status",
        declaration: "TEXT NOT NULL DEFAULT 'active'",
    },
    RequiredColumn { table: "customer_payment", column: "due_date", declaration: "TEXT" },
    RequiredColumn {
        table: "customer_payment",
        column: "status",
        declaration: "TEXT NOT NULL DEFAULT 'pending'",
    },
    RequiredColumn {
        table: "affiliate_commission",
        column: "status",
        declaration: "TEXT NOT NULL DEFAULT 'credited'",
    },
    RequiredColumn {
        table: "pin_request",
        column: "status",
        declaration: "TEXT NOT NULL DEFAULT 'pending'",
    },
];

/// Required columns absent from tables that exist.
pub fn missing_columns(store: &LedgerStore) -> LedgerResult<Vec<RequiredColumn>> {
    let mut missing = Vec::new();
    for required in REQUIRED_COLUMNS {
        if !store.table_exists(required.table)? {
            continue;
        }
        let columns = store.table_columns(required.table)?;
        if !columns.iter().any(|c| c == required.column) {
            missing.push(*required);
        }
    }
    Ok(missing)
}

pub fn add_column(store: &LedgerStore, column: &RequiredColumn) -> LedgerResult<()> {
    store.execute_admin_sql(&format!(
        "ALTER TABLE {} ADD COLUMN {} {};",
        column.table, column.column, column.declaration
    ))
}

pub struct SchemaTask;

impl MaintenanceTask for SchemaTask {
    fn name(&self) -> &'static str {
        "schema"
    }

    fn run(&mut self, store: &LedgerStore, mode: RunMode) -> LedgerResult<Vec<LedgerEvent>> {
        let mut events = Vec::new();
        for column in missing_columns(store)? {
            events.push(LedgerEvent::ColumnMissing {
                table: column.table.into(),
                column: column.column.into(),
            });
            if mode == RunMode::Repair {
                add_column(store, &column)?;
                events.push(LedgerEvent::ColumnAdded {
                    table: column.table.into(),
                    column: column.column.into(),
                });
            }
        }
        if mode == RunMode::Repair {
            for index in store.ensure_indexes()? {
                events.push(LedgerEvent::IndexCreated { index: index.into() });
            }
        }
        Ok(events)
    }

    /// Every other task reads these columns.
    fn halts_sweep(&self, store: &LedgerStore) -> LedgerResult<bool> {
        Ok(!missing_columns(store)?.is_empty())
    }
}
