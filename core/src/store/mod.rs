//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! Onboarding and maintenance tasks call store methods; they never execute SQL directly.

use crate::{
    error::LedgerResult,
    event::EventLogEntry,
    types::{CommissionStatus, PinRequestStatus, ProfileId, ProfileStatus, Role, RunMode},
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

mod commission;
mod payment;
mod pin_request;
mod profile;

pub struct LedgerStore {
    conn: Connection,
}

/// An index over columns that schema repair may have to add first.
#[derive(Debug, Clone, Copy)]
pub struct IndexSpec {
    pub name: &'static str,
    pub table: &'static str,
    pub columns: &'static [&'static str],
}

pub const INDEXES: &[IndexSpec] = &[
    IndexSpec {
        name: "idx_profile_parent",
        table: "profile",
        columns: &["parent_promoter_id"],
    },
    IndexSpec {
        name: "idx_commission_recipient",
        table: "affiliate_commission",
        columns: &["recipient_id", "status"],
    },
];

impl LedgerStore {
    pub fn open(path: &str) -> LedgerResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> LedgerResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order. Every migration is idempotent.
    ///
    /// Indexes over columns that older databases may lack are not part of
    /// the migration files; they are created by `ensure_indexes` once the
    /// columns exist.
    pub fn migrate(&self) -> LedgerResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_profiles.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/003_customer_payments.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/004_affiliate_commissions.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/005_pin_requests.sql"))?;
        self.ensure_indexes()?;
        let mut deferred = 0;
        for index in INDEXES {
            if !self.index_exists(index.name)? {
                deferred += 1;
            }
        }
        if deferred > 0 {
            log::warn!("migrate: {deferred} indexes deferred until schema repair adds their columns");
        }
        Ok(())
    }

    /// Create every index in `INDEXES` whose table has all of its columns.
    /// Returns the names of the indexes created by this call.
    pub fn ensure_indexes(&self) -> LedgerResult<Vec<&'static str>> {
        let mut created = Vec::new();
        for index in INDEXES {
            if self.index_exists(index.name)? || !self.table_exists(index.table)? {
                continue;
            }
            let columns = self.table_columns(index.table)?;
            if !index.columns.iter().all(|c| columns.iter().any(|have| have == c)) {
                continue;
            }
            self.conn.execute_batch(&format!(
                "CREATE INDEX IF NOT EXISTS {} ON {}({});",
                index.name,
                index.table,
                index.columns.join(", ")
            ))?;
            created.push(index.name);
        }
        Ok(created)
    }

    pub fn index_exists(&self, name: &str) -> LedgerResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Run `f` inside a transaction; commits on Ok, rolls back on Err.
    /// Nested calls join the outer transaction.
    pub fn in_transaction<T>(&self, f: impl FnOnce(&Self) -> LedgerResult<T>) -> LedgerResult<T> {
        if !self.conn.is_autocommit() {
            return f(self);
        }
        let tx = self.conn.unchecked_transaction()?;
        let out = f(self)?;
        tx.commit()?;
        Ok(out)
    }

    // ── Admin SQL ──────────────────────────────────────────────

    /// Execute arbitrary SQL with full privileges. Used by schema repair.
    pub fn execute_admin_sql(&self, sql: &str) -> LedgerResult<()> {
        log::warn!("executing admin sql: {sql}");
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    pub fn table_exists(&self, table: &str) -> LedgerResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Column names of `table`, in declaration order.
    pub fn table_columns(&self, table: &str) -> LedgerResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")?;
        let columns = stmt
            .query_map(params![table], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(columns)
    }

    // ── Maintenance run ────────────────────────────────────────

    pub fn insert_run(&self, run_id: &str, mode: RunMode, version: &str) -> LedgerResult<()> {
        self.conn.execute(
            "INSERT INTO maintenance_run (run_id, mode, version, started_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![run_id, mode, version, Utc::now()],
        )?;
        Ok(())
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(&self, entry: &EventLogEntry) -> LedgerResult<()> {
        self.conn.execute(
            "INSERT INTO event_log (run_id, task, event_type, payload, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.run_id,
                entry.task,
                entry.event_type,
                entry.payload,
                Utc::now(),
            ],
        )?;
        Ok(())
    }

    pub fn events_for_run(&self, run_id: &str) -> LedgerResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, run_id, task, event_type, payload
             FROM event_log WHERE run_id = ?1
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![run_id], |row| {
                Ok(EventLogEntry {
                    id: Some(row.get(0)?),
                    run_id: row.get(1)?,
                    task: row.get(2)?,
                    event_type: row.get(3)?,
                    payload: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn event_count(&self, run_id: &str, event_type: &str) -> LedgerResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM event_log WHERE run_id = ?1 AND event_type = ?2",
            params![run_id, event_type],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

// ── Row types ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub profile_id: ProfileId,
    pub role: Role,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Human identifier: promoter code or the customer's external id.
    pub public_id: String,
    pub parent_promoter_id: Option<ProfileId>,
    /// Cached; must equal the sum of credited commissions.
    pub wallet_balance: f64,
    pub status: ProfileStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommissionRow {
    pub commission_id: String,
    pub customer_id: ProfileId,
    pub recipient_id: ProfileId,
    pub level: u32,
    pub amount: f64,
    pub status: CommissionStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PinRequestRow {
    pub request_id: String,
    pub promoter_id: ProfileId,
    pub pin_count: u32,
    pub status: PinRequestStatus,
    pub created_at: DateTime<Utc>,
}

/// A wallet-holding profile with its cached balance and ledger total.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WalletPositionRow {
    pub profile_id: ProfileId,
    pub public_id: String,
    pub name: String,
    pub role: Role,
    pub cached_balance: f64,
    pub ledger_total: f64,
}
