use super::{LedgerStore, PinRequestRow};
use crate::error::LedgerResult;
use rusqlite::params;

impl LedgerStore {
    // ── PIN requests ──────────────────────────────────────────────

    pub fn insert_pin_request(&self, r: &PinRequestRow) -> LedgerResult<()> {
        self.conn.execute(
            "INSERT INTO pin_request (request_id, promoter_id, pin_count, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![&r.request_id, &r.promoter_id, r.pin_count, r.status, r.created_at],
        )?;
        Ok(())
    }

    /// Newest first.
    pub fn pin_requests(&self) -> LedgerResult<Vec<PinRequestRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT request_id, promoter_id, pin_count, status, created_at
             FROM pin_request ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(PinRequestRow {
                request_id: row.get(0)?,
                promoter_id: row.get(1)?,
                pin_count: row.get(2)?,
                status: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
