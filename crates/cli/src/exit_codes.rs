//! CLI Exit Code Registry
//!
//! Single source of truth for every exit code `belema` returns. Scripts
//! rely on these values.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain     | Description                                  |
//! |---------|------------|----------------------------------------------|
//! | 0       | Universal  | Success                                      |
//! | 1       | Universal  | General error (unspecified)                  |
//! | 2       | Universal  | Usage error (bad args, unreadable config)    |
//! | 3-9     | ingest     | Reading, validating and storing batches      |
//! | 10-19   | reconcile  | Config, run lookup and reconciliation result |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above

use belema_recon::ReconError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, reported by clap before any command runs.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Ingest (3-9)
// =============================================================================

/// Input file cannot be read, or is not valid delimited text.
pub const EXIT_INGEST_READ: u8 = 3;

/// Input has no data rows.
pub const EXIT_INGEST_EMPTY: u8 = 4;

/// Required header columns are missing.
pub const EXIT_INGEST_COLUMNS: u8 = 5;

/// Batch processed but at least one row was rejected with an ERROR.
/// For `ingest` the batch (including rejected rows) is still stored.
pub const EXIT_INGEST_ROW_ERRORS: u8 = 6;

/// Database could not be opened, read or written.
pub const EXIT_STORAGE: u8 = 7;

/// Referenced source file id does not exist.
pub const EXIT_SOURCE_NOT_FOUND: u8 = 8;

// =============================================================================
// Reconcile (10-19)
// =============================================================================

/// Config file failed to parse or validate.
pub const EXIT_RECON_INVALID_CONFIG: u8 = 10;

/// Run has no stored payouts or bank batches.
pub const EXIT_RECON_RUN_NOT_FOUND: u8 = 11;

/// Reconciliation produced at least one exception. The evidence pack is
/// still written.
pub const EXIT_RECON_EXCEPTIONS: u8 = 12;

/// Exit code for a core error.
pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::Csv(_) => EXIT_INGEST_READ,
        ReconError::EmptyInput => EXIT_INGEST_EMPTY,
        ReconError::MissingRequiredColumns { .. } => EXIT_INGEST_COLUMNS,
        ReconError::Storage(_) => EXIT_STORAGE,
        ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => EXIT_RECON_INVALID_CONFIG,
        ReconError::NotFound(_) => EXIT_RECON_RUN_NOT_FOUND,
    }
}
