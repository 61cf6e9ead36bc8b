//! `belema-recon`: payout and bank ledger ingestion and deterministic
//! reconciliation.
//!
//! Pure core: takes raw text and record sets, returns reports, matches and
//! exceptions. Storage lives behind the `LedgerStore` trait.

pub mod config;
pub mod error;
pub mod evidence;
pub mod ingest;
pub mod matcher;
pub mod model;
pub mod normalize;
pub mod store;
pub mod table;
pub mod validate;

pub use config::ReconConfig;
pub use error::ReconError;
pub use evidence::EvidencePack;
pub use ingest::{ingest, IngestOutcome, IngestReport, LedgerRecords, RowOutcome};
pub use matcher::{reconcile, MatchPolicy};
pub use model::{BankTransaction, LedgerKind, Payout, PayoutLine, Reconciliation, SourceFile};
pub use normalize::Amount;
pub use store::{reconcile_run, LedgerStore};
