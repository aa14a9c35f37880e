use super::LedgerStore;
use crate::{error::LedgerResult, schedule::Installment};
use chrono::Utc;
use rusqlite::params;

impl LedgerStore {
    // ── Customer payment schedule ─────────────────────────────────

    /// Insert one installment. Returns false when (customer, month) already
    /// exists; the row is left untouched.
    pub fn insert_installment(&self, i: &Installment) -> LedgerResult<bool> {
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO customer_payment
             (payment_id, customer_id, month_number, amount, due_date, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                &i.payment_id,
                &i.customer_id,
                i.month_number,
                i.amount,
                i.due_date,
                i.status,
                Utc::now(),
            ],
        )?;
        Ok(changed > 0)
    }

    pub fn installments_for(&self, customer_id: &str) -> LedgerResult<Vec<Installment>> {
        let mut stmt = self.conn.prepare(
            "SELECT payment_id, customer_id, month_number, amount, due_date, status
             FROM customer_payment WHERE customer_id = ?1
             ORDER BY month_number ASC",
        )?;
        let rows = stmt.query_map(params![customer_id], |row| {
            Ok(Installment {
                payment_id: row.get(0)?,
                customer_id: row.get(1)?,
                month_number: row.get(2)?,
                amount: row.get(3)?,
                due_date: row.get(4)?,
                status: row.get(5)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn installment_count(&self, customer_id: &str) -> LedgerResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM customer_payment WHERE customer_id = ?1",
            params![customer_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Remove a single month. Only used to simulate a failed batch insert.
    pub fn delete_installment(&self, customer_id: &str, month_number: u32) -> LedgerResult<()> {
        self.conn.execute(
            "DELETE FROM customer_payment WHERE customer_id = ?1 AND month_number = ?2",
            params![customer_id, month_number],
        )?;
        Ok(())
    }
}
