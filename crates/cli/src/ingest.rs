//! `belema ingest` and `belema check`.

use std::path::{Path, PathBuf};

use serde_json::json;
use tracing::debug;

use belema_recon::validate::RowStatus;
use belema_recon::{ingest, IngestOutcome, IngestReport, LedgerKind, LedgerStore, SourceFile};
use belema_store::SqliteStore;

use crate::exit_codes::{EXIT_INGEST_READ, EXIT_INGEST_ROW_ERRORS};
use crate::render::{render_rows, to_json};
use crate::CliError;

fn read_input(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path)
        .map_err(|e| CliError::new(EXIT_INGEST_READ, format!("cannot read {}: {}", path.display(), e)))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn summary_line(report: &IngestReport) -> String {
    format!(
        "{} rows: {} accepted, {} with warnings, {} with errors",
        report.total_rows, report.accepted_rows, report.rows_with_warnings, report.rows_with_errors
    )
}

fn rejected(report: &IngestReport) -> Result<(), CliError> {
    match report.rows_with_errors {
        0 => Ok(()),
        n => Err(CliError::new(EXIT_INGEST_ROW_ERRORS, format!("{} row(s) rejected", n))),
    }
}

pub fn cmd_ingest(
    file: PathBuf,
    ledger: LedgerKind,
    org: String,
    run: Option<String>,
    db: PathBuf,
    json: bool,
) -> Result<(), CliError> {
    let text = read_input(&file)?;
    let source = SourceFile {
        id: uuid::Uuid::new_v4().to_string(),
        org_id: org,
        run_id: run,
        ledger,
        filename: file_name(&file),
    };

    let outcome = ingest(&source, &text)?;
    debug!(db = %db.display(), "opening store");
    let mut store = SqliteStore::open(&db)?;
    store.save_batch(&source, &outcome)?;

    let report = &outcome.report;
    if json {
        println!("{}", to_json(report)?);
    } else {
        // Bare id on stdout so scripts can capture it.
        println!("{}", source.id);
        eprintln!("ingested {} ({}) into {}", source.filename, ledger, db.display());
        eprintln!("  {}", summary_line(report));
    }

    rejected(report).map_err(|e| e.with_hint(format!("belema audit {} --status error", source.id)))
}

pub fn cmd_check(file: PathBuf, ledger: LedgerKind, json: bool) -> Result<(), CliError> {
    let text = read_input(&file)?;
    let source = SourceFile {
        id: "check".to_string(),
        org_id: String::new(),
        run_id: None,
        ledger,
        filename: file_name(&file),
    };
    let outcome = ingest(&source, &text)?;
    print_check(&outcome, json)?;
    rejected(&outcome.report)
}

fn print_check(outcome: &IngestOutcome, json: bool) -> Result<(), CliError> {
    let flagged: Vec<_> = outcome.rows.iter().filter(|r| r.status != RowStatus::Ok).cloned().collect();

    if json {
        let value = json!({
            "ledger": outcome.report.ledger,
            "filename": outcome.report.filename,
            "total_rows": outcome.report.total_rows,
            "accepted_rows": outcome.report.accepted_rows,
            "rows_with_warnings": outcome.report.rows_with_warnings,
            "rows_with_errors": outcome.report.rows_with_errors,
            "rows": flagged,
        });
        println!("{}", to_json(&value)?);
    } else {
        print!("{}", render_rows(&flagged, false));
        eprintln!("{}: {}", outcome.report.filename, summary_line(&outcome.report));
    }
    Ok(())
}
