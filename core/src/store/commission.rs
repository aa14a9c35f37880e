use super::{CommissionRow, LedgerStore};
use crate::error::LedgerResult;
use rusqlite::params;

impl LedgerStore {
    // ── Affiliate commission ──────────────────────────────────────

    /// Insert one commission row. Returns false when the
    /// (customer, recipient, level) share already exists.
    pub fn insert_commission(&self, c: &CommissionRow) -> LedgerResult<bool> {
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO affiliate_commission
             (commission_id, customer_id, recipient_id, level, amount, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                &c.commission_id,
                &c.customer_id,
                &c.recipient_id,
                c.level,
                c.amount,
                c.status,
                c.created_at,
            ],
        )?;
        Ok(changed > 0)
    }

    pub fn commissions_for_customer(&self, customer_id: &str) -> LedgerResult<Vec<CommissionRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT commission_id, customer_id, recipient_id, level, amount, status, created_at
             FROM affiliate_commission WHERE customer_id = ?1
             ORDER BY level ASC",
        )?;
        let rows = stmt.query_map(params![customer_id], Self::map_commission_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Sum of credited commission amounts for one recipient.
    pub fn credited_total(&self, recipient_id: &str) -> LedgerResult<f64> {
        let total: f64 = self.conn.query_row(
            "SELECT COALESCE(SUM(amount), 0.0)
             FROM affiliate_commission
             WHERE recipient_id = ?1 AND status = 'credited'",
            params![recipient_id],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    pub fn commission_count(&self) -> LedgerResult<i64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM affiliate_commission", [], |row| row.get(0))?;
        Ok(count)
    }

    fn map_commission_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CommissionRow> {
        Ok(CommissionRow {
            commission_id: row.get(0)?,
            customer_id: row.get(1)?,
            recipient_id: row.get(2)?,
            level: row.get(3)?,
            amount: row.get(4)?,
            status: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}
