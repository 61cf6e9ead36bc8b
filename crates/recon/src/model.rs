use std::fmt;

use chrono::NaiveDate;
use serde::{Serialize, Serializer};

use crate::normalize::Amount;

// ---------------------------------------------------------------------------
// Batches
// ---------------------------------------------------------------------------

/// Which export a batch of text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerKind {
    Payouts,
    Bank,
}

impl LedgerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Payouts => "payouts",
            Self::Bank => "bank",
        }
    }

    /// Inverse of `as_str`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "payouts" => Some(Self::Payouts),
            "bank" => Some(Self::Bank),
            _ => None,
        }
    }
}

impl fmt::Display for LedgerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one ingested file. The id is chosen by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFile {
    pub id: String,
    pub org_id: String,
    pub run_id: Option<String>,
    pub ledger: LedgerKind,
    pub filename: String,
}

// ---------------------------------------------------------------------------
// Domain records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Payout {
    pub payout_id: String,
    pub status: String,
    pub currency: String,
    pub date: NaiveDate,
    pub amount: Amount,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub month: Option<String>,
    pub source_file_id: String,
}

/// One transaction line under a payout. Lines are retained for audit and
/// never take part in matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayoutLine {
    pub payout_id: String,
    pub txn_id: String,
    pub txn_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub txn_currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub txn_processed_at: Option<NaiveDate>,
    pub row_number: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BankTransaction {
    pub posted_date: NaiveDate,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_number: Option<String>,
    pub money_in: Amount,
    pub money_out: Amount,
    /// `money_in - money_out`, two fractional digits.
    pub amount: Amount,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<Amount>,
    pub row_number: usize,
    pub source_file_id: String,
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReasonCode {
    BankAmountDateMatch,
    /// Upper-cased keyword found in the bank description.
    DescKeyword(String),
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BankAmountDateMatch => write!(f, "BANK_AMOUNT_DATE_MATCH"),
            Self::DescKeyword(kw) => write!(f, "DESC_KEYWORD_{kw}"),
        }
    }
}

impl Serialize for ReasonCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A payout paired with exactly one bank transaction.
#[derive(Debug, Clone, Serialize)]
pub struct Match {
    pub payout_id: String,
    pub payout_currency: String,
    pub payout_amount: Amount,
    pub payout_date: NaiveDate,
    pub bank_posted_date: NaiveDate,
    pub bank_amount: Amount,
    pub bank_description: String,
    pub bank_reference: Option<String>,
    pub bank_row: usize,
    /// `bank_posted_date - payout_date` in whole days.
    pub date_offset_days: i64,
    pub reason_codes: Vec<ReasonCode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExceptionKind {
    UnmatchedPayout,
    UnmatchedBankTxn,
    NeedsReview,
}

impl fmt::Display for ExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnmatchedPayout => write!(f, "UNMATCHED_PAYOUT"),
            Self::UnmatchedBankTxn => write!(f, "UNMATCHED_BANK_TXN"),
            Self::NeedsReview => write!(f, "NEEDS_REVIEW"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Exception {
    #[serde(rename = "type")]
    pub kind: ExceptionKind,
    pub detail: String,
    /// Candidate count, `NEEDS_REVIEW` only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidates: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Reconciliation {
    pub matches: Vec<Match>,
    pub exceptions: Vec<Exception>,
}

impl Reconciliation {
    pub fn count(&self, kind: ExceptionKind) -> usize {
        self.exceptions.iter().filter(|e| e.kind == kind).count()
    }
}
