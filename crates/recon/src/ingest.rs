//! Ingestion pipeline: text → table → header check → per-row validation.
//!
//! Once the header check passes every row yields exactly one `RowOutcome`;
//! nothing after that point can fail the call.

use serde::Serialize;
use tracing::{debug, info};

use crate::error::ReconError;
use crate::model::{BankTransaction, LedgerKind, Payout, PayoutLine, SourceFile};
use crate::table::{parse_table, RawRow, Table};
use crate::validate::payout::PayoutRecords;
use crate::validate::{
    BankValidator, LedgerValidator, PayoutValidator, RowStatus, Severity, ValidationMessage,
};

/// Aggregate view of one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub source_file_id: String,
    pub ledger: LedgerKind,
    pub filename: String,
    pub total_rows: usize,
    pub accepted_rows: usize,
    /// Rows with at least one WARN (a row may also be counted in `rows_with_errors`).
    pub rows_with_warnings: usize,
    pub rows_with_errors: usize,
}

/// Audit record for one data row, kept whatever its status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowOutcome {
    pub row_number: usize,
    pub status: RowStatus,
    pub messages: Vec<ValidationMessage>,
    pub raw: RawRow,
    pub parsed: serde_json::Value,
}

impl RowOutcome {
    pub fn has_severity(&self, severity: Severity) -> bool {
        self.messages.iter().any(|m| m.severity == severity)
    }
}

/// Domain records materialized from accepted rows.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "ledger", rename_all = "snake_case")]
pub enum LedgerRecords {
    Payouts { payouts: Vec<Payout>, lines: Vec<PayoutLine> },
    Bank { transactions: Vec<BankTransaction> },
}

impl LedgerRecords {
    pub fn payouts(&self) -> &[Payout] {
        match self {
            Self::Payouts { payouts, .. } => payouts,
            Self::Bank { .. } => &[],
        }
    }

    pub fn payout_lines(&self) -> &[PayoutLine] {
        match self {
            Self::Payouts { lines, .. } => lines,
            Self::Bank { .. } => &[],
        }
    }

    pub fn bank_transactions(&self) -> &[BankTransaction] {
        match self {
            Self::Bank { transactions } => transactions,
            Self::Payouts { .. } => &[],
        }
    }
}

impl From<PayoutRecords> for LedgerRecords {
    fn from(r: PayoutRecords) -> Self {
        Self::Payouts { payouts: r.payouts, lines: r.lines }
    }
}

impl From<Vec<BankTransaction>> for LedgerRecords {
    fn from(transactions: Vec<BankTransaction>) -> Self {
        Self::Bank { transactions }
    }
}

#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub report: IngestReport,
    pub rows: Vec<RowOutcome>,
    pub records: LedgerRecords,
}

/// Ingest one batch of raw text for `source.ledger`.
///
/// Fails only with `EmptyInput`, `MissingRequiredColumns` or `Csv`. Row
/// problems are reported on the returned outcomes.
pub fn ingest(source: &SourceFile, text: &str) -> Result<IngestOutcome, ReconError> {
    let table = parse_table(text)?;
    match source.ledger {
        LedgerKind::Payouts => run_validator(source, &table, PayoutValidator::new(source)),
        LedgerKind::Bank => run_validator(source, &table, BankValidator::new(source)),
    }
}

fn run_validator<V>(source: &SourceFile, table: &Table, mut validator: V) -> Result<IngestOutcome, ReconError>
where
    V: LedgerValidator,
    LedgerRecords: From<V::Records>,
{
    let missing = table.missing_columns(V::REQUIRED);
    if !missing.is_empty() {
        return Err(ReconError::MissingRequiredColumns { ledger: V::LEDGER, columns: missing });
    }

    let mut rows = Vec::with_capacity(table.rows.len());
    for raw in &table.rows {
        let check = validator.check_row(raw);
        let status = RowStatus::from_messages(&check.messages);
        if status == RowStatus::Error {
            debug!(
                source_file = %source.id,
                row = raw.number(),
                codes = %join_codes(&check.messages),
                "row rejected"
            );
        }
        rows.push(RowOutcome {
            row_number: raw.number(),
            status,
            messages: check.messages,
            raw: raw.clone(),
            parsed: check.parsed,
        });
    }

    let report = IngestReport {
        source_file_id: source.id.clone(),
        ledger: V::LEDGER,
        filename: source.filename.clone(),
        total_rows: rows.len(),
        accepted_rows: rows.iter().filter(|r| r.status != RowStatus::Error).count(),
        rows_with_warnings: rows.iter().filter(|r| r.has_severity(Severity::Warn)).count(),
        rows_with_errors: rows.iter().filter(|r| r.status == RowStatus::Error).count(),
    };

    info!(
        source_file = %report.source_file_id,
        ledger = %report.ledger,
        total = report.total_rows,
        accepted = report.accepted_rows,
        warnings = report.rows_with_warnings,
        errors = report.rows_with_errors,
        "batch ingested"
    );

    Ok(IngestOutcome { report, rows, records: validator.into_records().into() })
}

fn join_codes(messages: &[ValidationMessage]) -> String {
    messages
        .iter()
        .filter(|m| m.severity == Severity::Error)
        .map(|m| m.code.as_str())
        .collect::<Vec<_>>()
        .join(",")
}
