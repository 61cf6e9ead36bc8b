use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::config::ReconConfig;
use crate::model::{Exception, ExceptionKind, Match, Reconciliation, SourceFile};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Serialize)]
pub struct EvidenceMeta {
    pub product: String,
    pub engine_version: String,
    pub generated_at: String,
    pub confidentiality: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceIdentity {
    pub id: String,
    pub filename: String,
}

impl From<&SourceFile> for SourceIdentity {
    fn from(sf: &SourceFile) -> Self {
        Self { id: sf.id.clone(), filename: sf.filename.clone() }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EvidenceSources {
    pub payouts: Option<SourceIdentity>,
    pub bank: Option<SourceIdentity>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvidenceSummary {
    pub payouts: usize,
    pub bank_transactions: usize,
    pub matches: usize,
    pub exceptions: usize,
    pub unmatched_payouts: usize,
    pub unmatched_bank_transactions: usize,
    pub needs_review: usize,
    /// Matched payouts as a whole percentage of all payouts, 0 when none.
    pub match_pct: u32,
}

/// The serializable record of one reconciliation. Field order is fixed.
#[derive(Debug, Clone, Serialize)]
pub struct EvidencePack {
    pub meta: EvidenceMeta,
    pub org_id: String,
    pub run_id: String,
    pub config_name: String,
    pub window_days: u32,
    pub sources: EvidenceSources,
    pub summary: EvidenceSummary,
    pub matches: Vec<Match>,
    pub exceptions: Vec<Exception>,
}

/// What the pack needs to know about the run beyond the match result.
pub struct RunContext<'a> {
    pub org_id: &'a str,
    pub run_id: &'a str,
    pub payouts_source: Option<&'a SourceFile>,
    pub bank_source: Option<&'a SourceFile>,
    pub payout_count: usize,
    pub bank_count: usize,
}

/// Rounded half-up; 0 when there are no payouts.
pub fn match_pct(matches: usize, payouts: usize) -> u32 {
    if payouts == 0 {
        return 0;
    }
    ((matches * 200 + payouts) / (payouts * 2)) as u32
}

impl EvidencePack {
    pub fn build(
        ctx: &RunContext<'_>,
        recon: Reconciliation,
        config: &ReconConfig,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let summary = EvidenceSummary {
            payouts: ctx.payout_count,
            bank_transactions: ctx.bank_count,
            matches: recon.matches.len(),
            exceptions: recon.exceptions.len(),
            unmatched_payouts: recon.count(ExceptionKind::UnmatchedPayout),
            unmatched_bank_transactions: recon.count(ExceptionKind::UnmatchedBankTxn),
            needs_review: recon.count(ExceptionKind::NeedsReview),
            match_pct: match_pct(recon.matches.len(), ctx.payout_count),
        };

        Self {
            meta: EvidenceMeta {
                product: config.evidence.product.clone(),
                engine_version: ENGINE_VERSION.to_string(),
                generated_at: generated_at.to_rfc3339_opts(SecondsFormat::Secs, true),
                confidentiality: config.evidence.confidentiality.clone(),
            },
            org_id: ctx.org_id.to_string(),
            run_id: ctx.run_id.to_string(),
            config_name: config.name.clone(),
            window_days: config.matching.window_days,
            sources: EvidenceSources {
                payouts: ctx.payouts_source.map(SourceIdentity::from),
                bank: ctx.bank_source.map(SourceIdentity::from),
            },
            summary,
            matches: recon.matches,
            exceptions: recon.exceptions,
        }
    }
}
