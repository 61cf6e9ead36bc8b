//! `belema audit`: read back the write-once row trail of one batch.

use std::path::PathBuf;

use serde::Serialize;

use belema_recon::validate::RowStatus;
use belema_recon::{LedgerKind, LedgerStore, PayoutLine, RowOutcome, SourceFile};
use belema_store::SqliteStore;

use crate::exit_codes::EXIT_SOURCE_NOT_FOUND;
use crate::render::{render_rows, to_json};
use crate::{CliError, StatusArg};

impl From<StatusArg> for RowStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Ok => RowStatus::Ok,
            StatusArg::Warning => RowStatus::Warning,
            StatusArg::Error => RowStatus::Error,
        }
    }
}

#[derive(Serialize)]
struct AuditView<'a> {
    source_file: &'a SourceFile,
    stored_rows: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    payout_lines: Option<&'a [PayoutLine]>,
    rows: &'a [RowOutcome],
}

fn filter_rows(rows: Vec<RowOutcome>, status: Option<RowStatus>) -> Vec<RowOutcome> {
    match status {
        Some(status) => rows.into_iter().filter(|r| r.status == status).collect(),
        None => rows,
    }
}

pub fn cmd_audit(
    source_file_id: String,
    db: PathBuf,
    status: Option<StatusArg>,
    json: bool,
) -> Result<(), CliError> {
    let store = SqliteStore::open(&db)?;
    let source = store.source_file(&source_file_id)?.ok_or_else(|| {
        CliError::new(EXIT_SOURCE_NOT_FOUND, format!("source file not found: {}", source_file_id))
            .with_hint(format!("check the id printed by `belema ingest` and that --db is {}", db.display()))
    })?;

    let all = store.row_outcomes(&source.id)?;
    let stored_rows = all.len();
    let rows = filter_rows(all, status.map(RowStatus::from));
    let lines = match source.ledger {
        LedgerKind::Payouts => Some(store.payout_lines(&source.id)?),
        LedgerKind::Bank => None,
    };

    if json {
        let view = AuditView { source_file: &source, stored_rows, payout_lines: lines.as_deref(), rows: &rows };
        println!("{}", to_json(&view)?);
        return Ok(());
    }

    println!(
        "{} ({}) org={} run={}",
        source.filename,
        source.ledger,
        source.org_id,
        source.run_id.as_deref().unwrap_or("-")
    );
    print!("{}", render_rows(&rows, true));
    eprintln!("{} of {} stored rows shown", rows.len(), stored_rows);
    if let Some(lines) = lines {
        eprintln!("{} payout lines stored", lines.len());
    }
    Ok(())
}
