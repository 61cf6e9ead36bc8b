use std::fmt;

use crate::model::LedgerKind;

/// Whole-call failures. Row-level problems are never errors; they are
/// reported as data on each `RowOutcome`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconError {
    /// The text produced no data rows (or no header at all).
    EmptyInput,
    /// Required header columns are absent. Lists every missing column.
    MissingRequiredColumns { ledger: LedgerKind, columns: Vec<String> },
    /// The delimited-text reader itself failed (e.g. invalid UTF-8).
    Csv(String),
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (bad window, empty keyword, ...).
    ConfigValidation(String),
    /// Persistence adapter failure.
    Storage(String),
    /// A run or source file that the caller referenced does not exist.
    NotFound(String),
}

impl ReconError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyInput => "EMPTY_INPUT",
            Self::MissingRequiredColumns { .. } => "MISSING_REQUIRED_COLUMNS",
            Self::Csv(_) => "CSV_READ_ERROR",
            Self::ConfigParse(_) => "CONFIG_PARSE",
            Self::ConfigValidation(_) => "CONFIG_INVALID",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
        }
    }

    /// True for failures that abort an ingestion call before any row work.
    pub fn is_batch_fatal(&self) -> bool {
        matches!(self, Self::EmptyInput | Self::MissingRequiredColumns { .. } | Self::Csv(_))
    }
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyInput => write!(f, "input contains no data rows"),
            Self::MissingRequiredColumns { ledger, columns } => {
                write!(f, "{ledger}: missing required columns: {}", columns.join(","))
            }
            Self::Csv(msg) => write!(f, "cannot read delimited text: {msg}"),
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::Storage(msg) => write!(f, "storage error: {msg}"),
            Self::NotFound(what) => write!(f, "not found: {what}"),
        }
    }
}

impl std::error::Error for ReconError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_columns_lists_every_column() {
        let err = ReconError::MissingRequiredColumns {
            ledger: LedgerKind::Bank,
            columns: vec!["Money Out".into(), "Money in".into()],
        };
        assert_eq!(err.code(), "MISSING_REQUIRED_COLUMNS");
        assert_eq!(err.to_string(), "bank: missing required columns: Money Out,Money in");
        assert!(err.is_batch_fatal());
    }

    #[test]
    fn storage_is_not_batch_fatal() {
        assert!(!ReconError::Storage("disk full".into()).is_batch_fatal());
    }
}
