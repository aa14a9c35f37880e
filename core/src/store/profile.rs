use super::{LedgerStore, Profile, WalletPositionRow};
use crate::{error::LedgerResult, types::Role};
use rusqlite::{params, OptionalExtension};

const PROFILE_COLUMNS: &str = "profile_id, role, name, email, phone, public_id,
     parent_promoter_id, wallet_balance, status, created_at";

impl LedgerStore {
    // ── Profile ───────────────────────────────────────────────────

    pub fn insert_profile(&self, p: &Profile) -> LedgerResult<()> {
        self.conn.execute(
            "INSERT INTO profile (
                profile_id, role, name, email, phone, public_id,
                parent_promoter_id, wallet_balance, status, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                &p.profile_id,
                p.role,
                &p.name,
                &p.email,
                &p.phone,
                &p.public_id,
                &p.parent_promoter_id,
                p.wallet_balance,
                p.status,
                p.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn profile(&self, profile_id: &str) -> LedgerResult<Option<Profile>> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profile WHERE profile_id = ?1");
        let row = self
            .conn
            .query_row(&sql, params![profile_id], Self::map_profile_row)
            .optional()?;
        Ok(row)
    }

    pub fn profile_by_public_id(&self, public_id: &str) -> LedgerResult<Option<Profile>> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profile WHERE public_id = ?1");
        let row = self
            .conn
            .query_row(&sql, params![public_id], Self::map_profile_row)
            .optional()?;
        Ok(row)
    }

    pub fn public_id_exists(&self, public_id: &str) -> LedgerResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM profile WHERE public_id = ?1",
            params![public_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// All profiles with `role`, or every profile when `role` is None.
    pub fn profiles_by_role(&self, role: Option<Role>) -> LedgerResult<Vec<Profile>> {
        let sql = format!(
            "SELECT {PROFILE_COLUMNS} FROM profile
             WHERE ?1 IS NULL OR role = ?1
             ORDER BY created_at ASC, public_id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![role], Self::map_profile_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// The earliest-created admin, if any.
    pub fn first_admin(&self) -> LedgerResult<Option<Profile>> {
        let sql = format!(
            "SELECT {PROFILE_COLUMNS} FROM profile
             WHERE role = 'admin'
             ORDER BY created_at ASC, public_id ASC LIMIT 1"
        );
        let row = self
            .conn
            .query_row(&sql, [], Self::map_profile_row)
            .optional()?;
        Ok(row)
    }

    /// Promoter and admin public ids starting with `prefix`. Customer ids
    /// are external and never advance the promoter sequence.
    pub fn public_ids_with_prefix(&self, prefix: &str) -> LedgerResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT public_id FROM profile
             WHERE substr(public_id, 1, length(?1)) = ?1
               AND role IN ('promoter', 'admin')",
        )?;
        let rows = stmt.query_map(params![prefix], |row| row.get(0))?;
        rows.collect::<Result<Vec<String>, _>>().map_err(Into::into)
    }

    // ── Wallet ────────────────────────────────────────────────────

    pub fn wallet_balance(&self, profile_id: &str) -> LedgerResult<f64> {
        let balance: f64 = self.conn.query_row(
            "SELECT wallet_balance FROM profile WHERE profile_id = ?1",
            params![profile_id],
            |row| row.get(0),
        )?;
        Ok(balance)
    }

    pub fn credit_wallet(&self, profile_id: &str, delta: f64) -> LedgerResult<()> {
        self.conn.execute(
            "UPDATE profile SET wallet_balance = wallet_balance + ?1 WHERE profile_id = ?2",
            params![delta, profile_id],
        )?;
        Ok(())
    }

    pub fn set_wallet_balance(&self, profile_id: &str, balance: f64) -> LedgerResult<()> {
        self.conn.execute(
            "UPDATE profile SET wallet_balance = ?1 WHERE profile_id = ?2",
            params![balance, profile_id],
        )?;
        Ok(())
    }

    /// Cached balance against credited commission total for every
    /// admin and promoter.
    pub fn wallet_positions(&self) -> LedgerResult<Vec<WalletPositionRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT p.profile_id, p.public_id, p.name, p.role, p.wallet_balance,
                    COALESCE(SUM(c.amount), 0.0)
             FROM profile p
             LEFT JOIN affiliate_commission c
               ON c.recipient_id = p.profile_id AND c.status = 'credited'
             WHERE p.role IN ('admin', 'promoter')
             GROUP BY p.profile_id
             ORDER BY p.public_id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(WalletPositionRow {
                profile_id: row.get(0)?,
                public_id: row.get(1)?,
                name: row.get(2)?,
                role: row.get(3)?,
                cached_balance: row.get(4)?,
                ledger_total: row.get(5)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn map_profile_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Profile> {
        Ok(Profile {
            profile_id: row.get(0)?,
            role: row.get(1)?,
            name: row.get(2)?,
            email: row.get(3)?,
            phone: row.get(4)?,
            public_id: row.get(5)?,
            parent_promoter_id: row.get(6)?,
            wallet_balance: row.get(7)?,
            status: row.get(8)?,
            created_at: row.get(9)?,
        })
    }
}
