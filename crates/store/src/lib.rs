//! SQLite-backed `LedgerStore`.
//!
//! Amounts and dates are stored as text so values read back exactly as they
//! were ingested. Row outcomes are write-once: triggers reject any update or
//! delete.

use std::path::Path;

use chrono::NaiveDate;
use rusqlite::{params, Connection};
use tracing::info;

use belema_recon::normalize::Amount;
use belema_recon::table::RawRow;
use belema_recon::validate::{RowStatus, ValidationMessage};
use belema_recon::{
    BankTransaction, IngestOutcome, LedgerKind, LedgerStore, Payout, PayoutLine, ReconError, RowOutcome,
    SourceFile,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS source_files (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    org_id TEXT NOT NULL,
    run_id TEXT,                    -- NULL when ingested outside a run
    ledger TEXT NOT NULL,           -- 'payouts' | 'bank'
    filename TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
);

CREATE INDEX IF NOT EXISTS source_files_run ON source_files (run_id);

CREATE TABLE IF NOT EXISTS row_outcomes (
    source_file_id TEXT NOT NULL REFERENCES source_files (id),
    row_number INTEGER NOT NULL,
    status TEXT NOT NULL,           -- 'OK' | 'WARNING' | 'ERROR'
    raw TEXT NOT NULL,              -- JSON array of [column, value] pairs
    parsed TEXT NOT NULL,           -- JSON object
    messages TEXT NOT NULL,         -- JSON array
    PRIMARY KEY (source_file_id, row_number)
);

CREATE TRIGGER IF NOT EXISTS row_outcomes_no_update
BEFORE UPDATE ON row_outcomes
BEGIN
    SELECT RAISE(ABORT, 'row outcomes are write-once');
END;

CREATE TRIGGER IF NOT EXISTS row_outcomes_no_delete
BEFORE DELETE ON row_outcomes
BEGIN
    SELECT RAISE(ABORT, 'row outcomes are write-once');
END;

CREATE TABLE IF NOT EXISTS payouts (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    source_file_id TEXT NOT NULL REFERENCES source_files (id),
    payout_id TEXT NOT NULL,
    status TEXT NOT NULL,
    currency TEXT NOT NULL,
    payout_date TEXT NOT NULL,      -- YYYY-MM-DD
    amount TEXT NOT NULL,           -- exact decimal text
    month TEXT,
    UNIQUE (source_file_id, payout_id)
);

CREATE TABLE IF NOT EXISTS payout_lines (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    source_file_id TEXT NOT NULL REFERENCES source_files (id),
    payout_id TEXT NOT NULL,
    txn_id TEXT NOT NULL,
    txn_type TEXT NOT NULL,
    txn_currency TEXT,
    txn_processed_at TEXT,
    row_number INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS bank_transactions (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    source_file_id TEXT NOT NULL REFERENCES source_files (id),
    posted_date TEXT NOT NULL,
    description TEXT NOT NULL,
    reference TEXT,
    sort_code TEXT,
    account_number TEXT,
    money_in TEXT NOT NULL,
    money_out TEXT NOT NULL,
    amount TEXT NOT NULL,
    balance TEXT,
    row_number INTEGER NOT NULL
);
"#;

fn storage(e: impl std::fmt::Display) -> ReconError {
    ReconError::Storage(e.to_string())
}

fn date(s: &str) -> Result<NaiveDate, ReconError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| storage(format!("stored date '{s}': {e}")))
}

fn amount(s: &str) -> Result<Amount, ReconError> {
    s.parse::<Amount>().map_err(|e| storage(format!("stored amount '{s}': {e}")))
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) a database file and ensure the schema exists.
    pub fn open(path: &Path) -> Result<Self, ReconError> {
        let conn = Connection::open(path).map_err(storage)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, ReconError> {
        let conn = Connection::open_in_memory().map_err(storage)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, ReconError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;").map_err(storage)?;
        conn.execute_batch(SCHEMA).map_err(storage)?;
        Ok(Self { conn })
    }

    fn read_source_files(&self, where_clause: &str, key: &str) -> Result<Vec<SourceFile>, ReconError> {
        let sql = format!(
            "SELECT id, org_id, run_id, ledger, filename FROM source_files WHERE {where_clause} ORDER BY seq"
        );
        let mut stmt = self.conn.prepare(&sql).map_err(storage)?;
        let rows = stmt
            .query_map(params![key], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })
            .map_err(storage)?;

        let mut files = Vec::new();
        for row in rows {
            let (id, org_id, run_id, ledger, filename) = row.map_err(storage)?;
            let ledger = LedgerKind::parse(&ledger)
                .ok_or_else(|| storage(format!("unknown ledger '{ledger}' for source file {id}")))?;
            files.push(SourceFile { id, org_id, run_id, ledger, filename });
        }
        Ok(files)
    }
}

impl LedgerStore for SqliteStore {
    fn save_batch(&mut self, source: &SourceFile, outcome: &IngestOutcome) -> Result<(), ReconError> {
        let tx = self.conn.transaction().map_err(storage)?;

        tx.execute(
            "INSERT INTO source_files (id, org_id, run_id, ledger, filename) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![source.id, source.org_id, source.run_id, source.ledger.as_str(), source.filename],
        )
        .map_err(storage)?;

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO row_outcomes (source_file_id, row_number, status, raw, parsed, messages) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )
                .map_err(storage)?;
            for row in &outcome.rows {
                let raw: Vec<(&str, &str)> = row.raw.fields().collect();
                stmt.execute(params![
                    source.id,
                    row.row_number as i64,
                    row.status.as_str(),
                    serde_json::to_string(&raw).map_err(storage)?,
                    serde_json::to_string(&row.parsed).map_err(storage)?,
                    serde_json::to_string(&row.messages).map_err(storage)?,
                ])
                .map_err(storage)?;
            }
        }

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO payouts (source_file_id, payout_id, status, currency, payout_date, amount, month) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                )
                .map_err(storage)?;
            for p in outcome.records.payouts() {
                stmt.execute(params![
                    source.id,
                    p.payout_id,
                    p.status,
                    p.currency,
                    p.date.to_string(),
                    p.amount.as_str(),
                    p.month,
                ])
                .map_err(storage)?;
            }
        }

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO payout_lines (source_file_id, payout_id, txn_id, txn_type, txn_currency, \
                     txn_processed_at, row_number) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                )
                .map_err(storage)?;
            for line in outcome.records.payout_lines() {
                stmt.execute(params![
                    source.id,
                    line.payout_id,
                    line.txn_id,
                    line.txn_type,
                    line.txn_currency,
                    line.txn_processed_at.map(|d| d.to_string()),
                    line.row_number as i64,
                ])
                .map_err(storage)?;
            }
        }

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO bank_transactions (source_file_id, posted_date, description, reference, \
                     sort_code, account_number, money_in, money_out, amount, balance, row_number) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                )
                .map_err(storage)?;
            for t in outcome.records.bank_transactions() {
                stmt.execute(params![
                    source.id,
                    t.posted_date.to_string(),
                    t.description,
                    t.reference,
                    t.sort_code,
                    t.account_number,
                    t.money_in.as_str(),
                    t.money_out.as_str(),
                    t.amount.as_str(),
                    t.balance.as_ref().map(|b| b.as_str()),
                    t.row_number as i64,
                ])
                .map_err(storage)?;
            }
        }

        tx.commit().map_err(storage)?;
        info!(source_file = %source.id, rows = outcome.rows.len(), "batch stored");
        Ok(())
    }

    fn source_files(&self, run_id: &str) -> Result<Vec<SourceFile>, ReconError> {
        self.read_source_files("run_id = ?1", run_id)
    }

    fn source_file(&self, id: &str) -> Result<Option<SourceFile>, ReconError> {
        Ok(self.read_source_files("id = ?1", id)?.into_iter().next())
    }

    fn payouts(&self, source_file_id: &str) -> Result<Vec<Payout>, ReconError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT payout_id, status, currency, payout_date, amount, month FROM payouts \
                 WHERE source_file_id = ?1 ORDER BY payout_date, seq",
            )
            .map_err(storage)?;
        let rows = stmt
            .query_map(params![source_file_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Option<String>>(5)?,
                ))
            })
            .map_err(storage)?;

        let mut payouts = Vec::new();
        for row in rows {
            let (payout_id, status, currency, payout_date, payout_amount, month) = row.map_err(storage)?;
            payouts.push(Payout {
                payout_id,
                status,
                currency,
                date: date(&payout_date)?,
                amount: amount(&payout_amount)?,
                month,
                source_file_id: source_file_id.to_string(),
            });
        }
        Ok(payouts)
    }

    fn bank_transactions(&self, source_file_id: &str) -> Result<Vec<BankTransaction>, ReconError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT posted_date, description, reference, sort_code, account_number, money_in, money_out, \
                 amount, balance, row_number FROM bank_transactions \
                 WHERE source_file_id = ?1 ORDER BY posted_date, seq",
            )
            .map_err(storage)?;
        let rows = stmt
            .query_map(params![source_file_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, String>(7)?,
                    row.get::<_, Option<String>>(8)?,
                    row.get::<_, i64>(9)?,
                ))
            })
            .map_err(storage)?;

        let mut txns = Vec::new();
        for row in rows {
            let (posted, description, reference, sort_code, account_number, money_in, money_out, net, balance, row_number) =
                row.map_err(storage)?;
            txns.push(BankTransaction {
                posted_date: date(&posted)?,
                description,
                reference,
                sort_code,
                account_number,
                money_in: amount(&money_in)?,
                money_out: amount(&money_out)?,
                amount: amount(&net)?,
                balance: balance.as_deref().map(amount).transpose()?,
                row_number: row_number as usize,
                source_file_id: source_file_id.to_string(),
            });
        }
        Ok(txns)
    }

    fn row_outcomes(&self, source_file_id: &str) -> Result<Vec<RowOutcome>, ReconError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT row_number, status, raw, parsed, messages FROM row_outcomes \
                 WHERE source_file_id = ?1 ORDER BY row_number",
            )
            .map_err(storage)?;
        let rows = stmt
            .query_map(params![source_file_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })
            .map_err(storage)?;

        let mut outcomes = Vec::new();
        for row in rows {
            let (row_number, status, raw, parsed, messages) = row.map_err(storage)?;
            let row_number = row_number as usize;
            let status =
                RowStatus::parse(&status).ok_or_else(|| storage(format!("unknown row status '{status}'")))?;
            let fields: Vec<(String, String)> = serde_json::from_str(&raw).map_err(storage)?;
            let messages: Vec<ValidationMessage> = serde_json::from_str(&messages).map_err(storage)?;
            outcomes.push(RowOutcome {
                row_number,
                status,
                messages,
                raw: RawRow::new(row_number, fields),
                parsed: serde_json::from_str(&parsed).map_err(storage)?,
            });
        }
        Ok(outcomes)
    }
}

impl SqliteStore {
    /// Transaction lines of a payouts batch, in row order.
    pub fn payout_lines(&self, source_file_id: &str) -> Result<Vec<PayoutLine>, ReconError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT payout_id, txn_id, txn_type, txn_currency, txn_processed_at, row_number \
                 FROM payout_lines WHERE source_file_id = ?1 ORDER BY row_number",
            )
            .map_err(storage)?;
        let rows = stmt
            .query_map(params![source_file_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, i64>(5)?,
                ))
            })
            .map_err(storage)?;

        let mut lines = Vec::new();
        for row in rows {
            let (payout_id, txn_id, txn_type, txn_currency, processed_at, row_number) = row.map_err(storage)?;
            lines.push(PayoutLine {
                payout_id,
                txn_id,
                txn_type,
                txn_currency,
                txn_processed_at: processed_at.as_deref().map(date).transpose()?,
                row_number: row_number as usize,
            });
        }
        Ok(lines)
    }

    /// Number of stored row outcomes for a batch, without loading them.
    pub fn row_count(&self, source_file_id: &str) -> Result<usize, ReconError> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM row_outcomes WHERE source_file_id = ?1",
                params![source_file_id],
                |row| row.get(0),
            )
            .map_err(storage)?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use belema_recon::{ingest, reconcile_run, ReconConfig};
    use chrono::Utc;

    const PAYOUTS: &str = "ID,Status,Date,Currency,Amount,Month,Transaction: ID,Transaction: Type\n\
                           PO-2,paid,2026-02-05,GBP,20.00,,T-3,charge\n\
                           PO-1,paid,2026-02-01,GBP,50.00,2026-02,T-1,charge\n\
                           PO-1,paid,2026-02-01,GBP,51.00,2026-02,T-2,charge\n\
                           PO-3,paid,2026-02-06,GBP,oops,,T-4,charge\n";

    const BANK: &str = "Date,Description,Reference,Money Out,Money in,Balance\n\
                        2026-02-03,SHOPIFY PAYMENTS,R1,,50.00,\"1,050.00\"\n\
                        2026-02-02,Card,,12.34,,\n\
                        2026-02-04,Both,,1.00,1.00,\n";

    fn source(id: &str, ledger: LedgerKind, run: Option<&str>) -> SourceFile {
        SourceFile {
            id: id.into(),
            org_id: "acme".into(),
            run_id: run.map(String::from),
            ledger,
            filename: format!("{id}.csv"),
        }
    }

    fn store_with_run() -> SqliteStore {
        let mut store = SqliteStore::open_in_memory().unwrap();
        for (sf, text) in [
            (source("sf-p", LedgerKind::Payouts, Some("run-1")), PAYOUTS),
            (source("sf-b", LedgerKind::Bank, Some("run-1")), BANK),
        ] {
            let outcome = ingest(&sf, text).unwrap();
            store.save_batch(&sf, &outcome).unwrap();
        }
        store
    }

    #[test]
    fn payouts_read_back_in_date_order() {
        let store = store_with_run();
        let payouts = store.payouts("sf-p").unwrap();
        let ids: Vec<&str> = payouts.iter().map(|p| p.payout_id.as_str()).collect();
        assert_eq!(ids, vec!["PO-1", "PO-2"]);
        assert_eq!(payouts[0].amount.as_str(), "50.00");
        assert_eq!(payouts[0].month.as_deref(), Some("2026-02"));
        assert_eq!(payouts[1].month, None);
    }

    #[test]
    fn payout_lines_kept_for_accepted_rows_only() {
        let store = store_with_run();
        let lines = store.payout_lines("sf-p").unwrap();
        let txn_ids: Vec<&str> = lines.iter().map(|l| l.txn_id.as_str()).collect();
        assert_eq!(txn_ids, vec!["T-3", "T-1", "T-2"]);
        assert_eq!(lines[1].payout_id, "PO-1");
        assert_eq!(lines[1].row_number, 3);
    }

    #[test]
    fn bank_transactions_round_trip_exact_text() {
        let store = store_with_run();
        let txns = store.bank_transactions("sf-b").unwrap();
        assert_eq!(txns.len(), 2);
        assert_eq!(txns[0].description, "Card");
        assert_eq!(txns[0].amount.as_str(), "-12.34");
        assert_eq!(txns[0].balance, None);
        assert_eq!(txns[1].balance.as_ref().map(|b| b.as_str()), Some("1050.00"));
        assert_eq!(txns[1].reference.as_deref(), Some("R1"));
        assert_eq!(txns[1].row_number, 2);
    }

    #[test]
    fn every_row_outcome_is_kept_for_audit() {
        let store = store_with_run();
        let rows = store.row_outcomes("sf-p").unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(store.row_count("sf-p").unwrap(), 4);

        assert_eq!(rows[2].status, RowStatus::Warning);
        assert_eq!(rows[3].status, RowStatus::Error);
        assert_eq!(rows[3].raw.get("Amount"), "oops");
        assert_eq!(rows[3].raw.values()[0], "PO-3");
        assert_eq!(rows[3].messages[0].message, "NOT_A_NUMBER:oops");
        assert!(rows[3].parsed["amount"].is_null());
    }

    #[test]
    fn source_files_by_run_and_id() {
        let mut store = store_with_run();
        let loose = source("sf-loose", LedgerKind::Bank, None);
        let outcome = ingest(&loose, BANK).unwrap();
        store.save_batch(&loose, &outcome).unwrap();

        let files = store.source_files("run-1").unwrap();
        let ids: Vec<&str> = files.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["sf-p", "sf-b"]);

        let found = store.source_file("sf-loose").unwrap().unwrap();
        assert_eq!(found.run_id, None);
        assert_eq!(found.ledger, LedgerKind::Bank);
        assert!(store.source_file("missing").unwrap().is_none());
    }

    #[test]
    fn duplicate_batch_is_rejected_and_nothing_is_written() {
        let mut store = store_with_run();
        let sf = source("sf-b", LedgerKind::Bank, Some("run-1"));
        let outcome = ingest(&sf, "Date,Description,Money Out,Money in\n2026-03-01,x,,9.00\n").unwrap();
        let err = store.save_batch(&sf, &outcome).unwrap_err();
        assert_eq!(err.code(), "STORAGE_ERROR");
        assert_eq!(store.bank_transactions("sf-b").unwrap().len(), 2);
        assert_eq!(store.row_count("sf-b").unwrap(), 3);
    }

    #[test]
    fn audit_rows_cannot_be_rewritten() {
        let store = store_with_run();
        let err = store
            .conn
            .execute("UPDATE row_outcomes SET status = 'OK' WHERE source_file_id = 'sf-p'", [])
            .unwrap_err();
        assert!(err.to_string().contains("write-once"));
        assert!(store.conn.execute("DELETE FROM row_outcomes", []).is_err());
    }

    #[test]
    fn schema_creation_is_idempotent_on_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        {
            let mut store = SqliteStore::open(&path).unwrap();
            let sf = source("sf-b", LedgerKind::Bank, Some("run-1"));
            store.save_batch(&sf, &ingest(&sf, BANK).unwrap()).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.bank_transactions("sf-b").unwrap().len(), 2);
    }

    #[test]
    fn reconcile_run_over_sqlite() {
        let store = store_with_run();
        let pack = reconcile_run(&store, "run-1", &ReconConfig::default(), Utc::now()).unwrap();
        assert_eq!(pack.summary.payouts, 2);
        assert_eq!(pack.summary.bank_transactions, 2);
        assert_eq!(pack.summary.matches, 1);
        assert_eq!(pack.matches[0].payout_id, "PO-1");
        assert_eq!(pack.summary.unmatched_payouts, 1);
        assert_eq!(pack.summary.unmatched_bank_transactions, 1);
    }
}
