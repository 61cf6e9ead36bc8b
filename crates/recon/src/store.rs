//! Persistence seam. The core never touches storage directly; adapters
//! implement `LedgerStore`.

use chrono::{DateTime, Utc};

use crate::config::ReconConfig;
use crate::error::ReconError;
use crate::evidence::{EvidencePack, RunContext};
use crate::ingest::{IngestOutcome, RowOutcome};
use crate::matcher::reconcile;
use crate::model::{BankTransaction, LedgerKind, Payout, SourceFile};

pub trait LedgerStore {
    /// Persist one ingested batch atomically. Batches are write-once.
    fn save_batch(&mut self, source: &SourceFile, outcome: &IngestOutcome) -> Result<(), ReconError>;

    /// Source files attached to `run_id`, oldest first.
    fn source_files(&self, run_id: &str) -> Result<Vec<SourceFile>, ReconError>;

    fn source_file(&self, id: &str) -> Result<Option<SourceFile>, ReconError>;

    /// Ordered by payout date, then insertion order.
    fn payouts(&self, source_file_id: &str) -> Result<Vec<Payout>, ReconError>;

    /// Ordered by posted date, then insertion order.
    fn bank_transactions(&self, source_file_id: &str) -> Result<Vec<BankTransaction>, ReconError>;

    /// Every stored row outcome for a batch, in row order.
    fn row_outcomes(&self, source_file_id: &str) -> Result<Vec<RowOutcome>, ReconError>;
}

/// Reconcile the most recent payouts and bank batches attached to a run.
///
/// A run with neither ledger is `NotFound`. A run with only one ledger is
/// reconciled against an empty other side.
pub fn reconcile_run<S: LedgerStore + ?Sized>(
    store: &S,
    run_id: &str,
    config: &ReconConfig,
    generated_at: DateTime<Utc>,
) -> Result<EvidencePack, ReconError> {
    let files = store.source_files(run_id)?;
    let latest = |kind: LedgerKind| files.iter().rev().find(|f| f.ledger == kind);
    let payouts_source = latest(LedgerKind::Payouts);
    let bank_source = latest(LedgerKind::Bank);

    let org_id = match (payouts_source, bank_source) {
        (Some(sf), _) | (None, Some(sf)) => sf.org_id.clone(),
        (None, None) => return Err(ReconError::NotFound(format!("run {run_id}"))),
    };

    let payouts = match payouts_source {
        Some(sf) => store.payouts(&sf.id)?,
        None => Vec::new(),
    };
    let bank = match bank_source {
        Some(sf) => store.bank_transactions(&sf.id)?,
        None => Vec::new(),
    };

    let recon = reconcile(&payouts, &bank, &config.match_policy());
    let ctx = RunContext {
        org_id: &org_id,
        run_id,
        payouts_source,
        bank_source,
        payout_count: payouts.len(),
        bank_count: bank.len(),
    };
    Ok(EvidencePack::build(&ctx, recon, config, generated_at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::ingest;
    use std::collections::HashMap;

    /// In-memory store used to exercise the seam without an adapter.
    #[derive(Default)]
    struct MemoryStore {
        files: Vec<SourceFile>,
        outcomes: HashMap<String, IngestOutcome>,
    }

    impl LedgerStore for MemoryStore {
        fn save_batch(&mut self, source: &SourceFile, outcome: &IngestOutcome) -> Result<(), ReconError> {
            if self.outcomes.contains_key(&source.id) {
                return Err(ReconError::Storage(format!("duplicate batch {}", source.id)));
            }
            self.files.push(source.clone());
            self.outcomes.insert(source.id.clone(), outcome.clone());
            Ok(())
        }

        fn source_files(&self, run_id: &str) -> Result<Vec<SourceFile>, ReconError> {
            Ok(self.files.iter().filter(|f| f.run_id.as_deref() == Some(run_id)).cloned().collect())
        }

        fn source_file(&self, id: &str) -> Result<Option<SourceFile>, ReconError> {
            Ok(self.files.iter().find(|f| f.id == id).cloned())
        }

        fn payouts(&self, id: &str) -> Result<Vec<Payout>, ReconError> {
            let mut out = self.outcomes.get(id).map(|o| o.records.payouts().to_vec()).unwrap_or_default();
            out.sort_by_key(|p| p.date);
            Ok(out)
        }

        fn bank_transactions(&self, id: &str) -> Result<Vec<BankTransaction>, ReconError> {
            let mut out =
                self.outcomes.get(id).map(|o| o.records.bank_transactions().to_vec()).unwrap_or_default();
            out.sort_by_key(|t| t.posted_date);
            Ok(out)
        }

        fn row_outcomes(&self, id: &str) -> Result<Vec<RowOutcome>, ReconError> {
            Ok(self.outcomes.get(id).map(|o| o.rows.clone()).unwrap_or_default())
        }
    }

    fn source(id: &str, ledger: LedgerKind) -> SourceFile {
        SourceFile {
            id: id.into(),
            org_id: "acme".into(),
            run_id: Some("run-1".into()),
            ledger,
            filename: format!("{id}.csv"),
        }
    }

    fn save(store: &mut MemoryStore, sf: SourceFile, text: &str) {
        let outcome = ingest(&sf, text).unwrap();
        store.save_batch(&sf, &outcome).unwrap();
    }

    #[test]
    fn unknown_run_is_not_found() {
        let store = MemoryStore::default();
        let err = reconcile_run(&store, "nope", &ReconConfig::default(), Utc::now()).unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn latest_batch_per_ledger_is_used() {
        let mut store = MemoryStore::default();
        save(
            &mut store,
            source("p-old", LedgerKind::Payouts),
            "ID,Status,Date,Currency,Amount,Transaction: ID,Transaction: Type\n\
             PO-OLD,paid,2026-02-01,GBP,1.00,T-1,charge\n",
        );
        save(
            &mut store,
            source("p-new", LedgerKind::Payouts),
            "ID,Status,Date,Currency,Amount,Transaction: ID,Transaction: Type\n\
             PO-10001,paid,2026-02-01,GBP,50.00,T-1,charge\n",
        );
        save(
            &mut store,
            source("b", LedgerKind::Bank),
            "Date,Description,Money Out,Money in\n2026-02-03,SHOPIFY PAYMENTS,,50.00\n",
        );

        let pack = reconcile_run(&store, "run-1", &ReconConfig::default(), Utc::now()).unwrap();
        assert_eq!(pack.sources.payouts.as_ref().map(|s| s.id.as_str()), Some("p-new"));
        assert_eq!(pack.summary.matches, 1);
        assert_eq!(pack.summary.match_pct, 100);
        assert_eq!(pack.matches[0].payout_id, "PO-10001");
        assert_eq!(pack.org_id, "acme");
    }

    #[test]
    fn single_ledger_run_reports_everything_unmatched() {
        let mut store = MemoryStore::default();
        save(
            &mut store,
            source("b", LedgerKind::Bank),
            "Date,Description,Money Out,Money in\n2026-02-03,Card,4.00,\n2026-02-04,Card,5.00,\n",
        );
        let pack = reconcile_run(&store, "run-1", &ReconConfig::default(), Utc::now()).unwrap();
        assert!(pack.sources.payouts.is_none());
        assert_eq!(pack.summary.unmatched_bank_transactions, 2);
        assert_eq!(pack.summary.match_pct, 0);
    }
}
