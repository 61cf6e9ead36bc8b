//! Row validators. Each ledger has one validator that checks a row, emits
//! messages, and keeps the records of rows that carry no ERROR.
//!
//! A validator instance is scoped to a single batch; cross-row state (payout
//! consistency) never leaks between batches.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::LedgerKind;
use crate::table::RawRow;

pub mod bank;
pub mod payout;

pub use bank::{BankValidator, BANK_REQUIRED};
pub use payout::{PayoutValidator, PAYOUT_REQUIRED};

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Warn,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warn => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// Stable machine-readable message codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageCode {
    // payouts
    MissingPayoutId,
    MissingPayoutStatus,
    MissingPayoutCurrency,
    MissingPayoutDate,
    MissingPayoutAmount,
    MissingTxnId,
    MissingTxnType,
    BadPayoutDate,
    BadPayoutAmount,
    PayoutCurrencyInconsistent,
    PayoutAmountInconsistent,
    UnparsedTxnProcessedAt,
    // bank
    BadPostedDate,
    MissingDescription,
    BadMoneyIn,
    BadMoneyOut,
    NegativeMoneyIn,
    NegativeMoneyOut,
    BothMoneyInAndOut,
    ZeroRow,
    UnparsedBalance,
}

impl MessageCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingPayoutId => "MISSING_PAYOUT_ID",
            Self::MissingPayoutStatus => "MISSING_PAYOUT_STATUS",
            Self::MissingPayoutCurrency => "MISSING_PAYOUT_CURRENCY",
            Self::MissingPayoutDate => "MISSING_PAYOUT_DATE",
            Self::MissingPayoutAmount => "MISSING_PAYOUT_AMOUNT",
            Self::MissingTxnId => "MISSING_TXN_ID",
            Self::MissingTxnType => "MISSING_TXN_TYPE",
            Self::BadPayoutDate => "BAD_PAYOUT_DATE",
            Self::BadPayoutAmount => "BAD_PAYOUT_AMOUNT",
            Self::PayoutCurrencyInconsistent => "PAYOUT_CURRENCY_INCONSISTENT",
            Self::PayoutAmountInconsistent => "PAYOUT_AMOUNT_INCONSISTENT",
            Self::UnparsedTxnProcessedAt => "UNPARSED_TXN_PROCESSED_AT",
            Self::BadPostedDate => "BAD_POSTED_DATE",
            Self::MissingDescription => "MISSING_DESCRIPTION",
            Self::BadMoneyIn => "BAD_MONEY_IN",
            Self::BadMoneyOut => "BAD_MONEY_OUT",
            Self::NegativeMoneyIn => "NEGATIVE_MONEY_IN",
            Self::NegativeMoneyOut => "NEGATIVE_MONEY_OUT",
            Self::BothMoneyInAndOut => "BOTH_MONEY_IN_AND_OUT",
            Self::ZeroRow => "ZERO_ROW",
            Self::UnparsedBalance => "UNPARSED_BALANCE",
        }
    }
}

impl fmt::Display for MessageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationMessage {
    pub severity: Severity,
    pub code: MessageCode,
    pub message: String,
}

impl ValidationMessage {
    pub fn error(code: MessageCode, message: impl Into<String>) -> Self {
        Self { severity: Severity::Error, code, message: message.into() }
    }

    pub fn warn(code: MessageCode, message: impl Into<String>) -> Self {
        Self { severity: Severity::Warn, code, message: message.into() }
    }

    pub fn info(code: MessageCode, message: impl Into<String>) -> Self {
        Self { severity: Severity::Info, code, message: message.into() }
    }
}

// ---------------------------------------------------------------------------
// Row status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RowStatus {
    Ok,
    Warning,
    Error,
}

impl RowStatus {
    /// ERROR if any ERROR, else WARNING if any WARN, else OK. INFO never
    /// changes the status.
    pub fn from_messages(messages: &[ValidationMessage]) -> Self {
        match messages.iter().map(|m| m.severity).max() {
            Some(Severity::Error) => Self::Error,
            Some(Severity::Warn) => Self::Warning,
            _ => Self::Ok,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }

    /// Case-insensitive inverse of `as_str`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "OK" => Some(Self::Ok),
            "WARNING" => Some(Self::Warning),
            "ERROR" => Some(Self::Error),
            _ => None,
        }
    }
}

impl fmt::Display for RowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Validator seam
// ---------------------------------------------------------------------------

/// Result of checking one row: every message plus the parsed field values
/// kept for audit (absent values are `null`).
#[derive(Debug, Clone)]
pub struct RowCheck {
    pub messages: Vec<ValidationMessage>,
    pub parsed: serde_json::Value,
}

impl RowCheck {
    pub fn has_error(&self) -> bool {
        self.messages.iter().any(|m| m.severity == Severity::Error)
    }
}

pub trait LedgerValidator {
    /// Records materialized from accepted rows.
    type Records;

    const LEDGER: LedgerKind;
    /// Header columns that must exist, checked by exact trimmed name.
    const REQUIRED: &'static [&'static str];

    /// Check one row. When the row carries no ERROR its records are kept.
    fn check_row(&mut self, row: &RawRow) -> RowCheck;

    fn into_records(self) -> Self::Records;
}
