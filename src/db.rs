use std::path::Path;
use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;

use crate::error::{ExtractoError, Result};
use crate::models::{CommitPayload, LedgerEntry, LedgerSnapshot};
use crate::session::LedgerSink;

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS imports (
    id INTEGER PRIMARY KEY,
    filename TEXT NOT NULL,
    account_id TEXT NOT NULL,
    format_id TEXT,
    import_date TEXT DEFAULT (datetime('now')),
    record_count INTEGER,
    checksum TEXT
);

CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY,
    account_id TEXT NOT NULL,
    date TEXT NOT NULL,
    description TEXT NOT NULL,
    amount TEXT NOT NULL,
    txn_type TEXT NOT NULL,
    destination_account_id TEXT,
    category_id TEXT,
    import_id INTEGER,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (import_id) REFERENCES imports(id)
);

CREATE INDEX IF NOT EXISTS idx_transactions_account_date ON transactions (account_id, date);
";

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// Ledger entries touching `account_id`, either as owner or as transfer
/// destination. Rows that no longer parse are left out of the snapshot.
pub fn load_snapshot(conn: &Connection, account_id: &str) -> Result<LedgerSnapshot> {
    let mut stmt = conn.prepare(
        "SELECT date, amount, description FROM transactions \
         WHERE account_id = ?1 OR destination_account_id = ?1 ORDER BY date",
    )?;
    let entries = stmt
        .query_map([account_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?
        .filter_map(|r| r.ok())
        .filter_map(|(date, amount, description)| {
            Some(LedgerEntry {
                date: NaiveDate::parse_from_str(&date, "%Y-%m-%d").ok()?,
                amount: Decimal::from_str(&amount).ok()?,
                description,
            })
        })
        .collect();
    Ok(LedgerSnapshot::new(entries))
}

/// Has a statement with this checksum already been committed to the account?
pub fn checksum_seen(conn: &Connection, account_id: &str, checksum: &str) -> Result<bool> {
    let mut stmt = conn.prepare("SELECT 1 FROM imports WHERE checksum = ?1 AND account_id = ?2")?;
    Ok(stmt.exists(rusqlite::params![checksum, account_id])?)
}

/// Where a batch came from, recorded alongside it.
#[derive(Debug, Clone, Default)]
pub struct ImportSource {
    pub filename: String,
    pub format_id: Option<String>,
    pub checksum: Option<String>,
}

/// SQLite-backed ledger collaborator. Each batch is one SQL transaction.
pub struct SqliteLedger {
    conn: Connection,
    source: ImportSource,
}

impl SqliteLedger {
    pub fn new(conn: Connection, source: ImportSource) -> Self {
        Self { conn, source }
    }

    #[cfg(test)]
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl LedgerSink for SqliteLedger {
    fn append_batch(&mut self, payload: &CommitPayload) -> Result<usize> {
        let tx = self
            .conn
            .transaction()
            .map_err(|e| ExtractoError::Commit(e.to_string()))?;
        let write = || -> rusqlite::Result<usize> {
            tx.execute(
                "INSERT INTO imports (filename, account_id, format_id, record_count, checksum) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    self.source.filename,
                    payload.account_id,
                    self.source.format_id,
                    payload.transactions.len() as i64,
                    self.source.checksum,
                ],
            )?;
            let import_id = tx.last_insert_rowid();
            let mut stmt = tx.prepare(
                "INSERT INTO transactions \
                 (account_id, date, description, amount, txn_type, destination_account_id, category_id, import_id) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for txn in &payload.transactions {
                stmt.execute(rusqlite::params![
                    payload.account_id,
                    txn.date,
                    txn.description,
                    txn.amount.to_string(),
                    txn.kind.as_str(),
                    txn.destination_account_id,
                    txn.category_id,
                    import_id,
                ])?;
            }
            Ok(payload.transactions.len())
        };
        let stored = write().map_err(|e| ExtractoError::Commit(e.to_string()))?;
        tx.commit().map_err(|e| ExtractoError::Commit(e.to_string()))?;
        Ok(stored)
    }
}

pub struct LedgerRow {
    pub date: String,
    pub description: String,
    pub amount: String,
    pub txn_type: String,
    pub destination_account_id: Option<String>,
    pub category_id: Option<String>,
}

pub fn list_transactions(conn: &Connection, account_id: &str) -> Result<Vec<LedgerRow>> {
    let mut stmt = conn.prepare(
        "SELECT date, description, amount, txn_type, destination_account_id, category_id \
         FROM transactions WHERE account_id = ?1 ORDER BY date, id",
    )?;
    let rows = stmt
        .query_map([account_id], |row| {
            Ok(LedgerRow {
                date: row.get(0)?,
                description: row.get(1)?,
                amount: row.get(2)?,
                txn_type: row.get(3)?,
                destination_account_id: row.get(4)?,
                category_id: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
