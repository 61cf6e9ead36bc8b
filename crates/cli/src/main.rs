// belema CLI - ingest payout and bank ledgers, reconcile runs, audit rows

mod audit;
mod exit_codes;
mod ingest;
mod reconcile;
mod render;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use belema_recon::{LedgerKind, ReconError};
use exit_codes::{recon_exit_code, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "belema")]
#[command(about = "Payout and bank ledger reconciliation with an auditable evidence trail")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a ledger export and store the batch with every row outcome
    #[command(after_help = "\
Examples:
  belema ingest payouts.csv --ledger payouts --org acme --run 2026-02
  belema ingest bank.csv --ledger bank --org acme --run 2026-02 --json
  BELEMA_DB=/var/lib/belema.db belema ingest bank.csv --ledger bank --org acme")]
    Ingest {
        /// Ledger export to ingest
        file: PathBuf,

        /// Which ledger the file came from
        #[arg(long)]
        ledger: LedgerArg,

        /// Organisation key
        #[arg(long)]
        org: String,

        /// Run key the batch belongs to
        #[arg(long)]
        run: Option<String>,

        #[arg(long, env = "BELEMA_DB", default_value = "belema.db")]
        db: PathBuf,

        /// Print the ingest report as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Validate a ledger export without storing anything
    #[command(after_help = "\
Examples:
  belema check payouts.csv --ledger payouts
  belema check bank.csv --ledger bank --json")]
    Check {
        /// Ledger export to validate
        file: PathBuf,

        #[arg(long)]
        ledger: LedgerArg,

        /// Print the report and flagged rows as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Match a run's payouts against its bank transactions and emit the evidence pack
    #[command(after_help = "\
Examples:
  belema reconcile --run 2026-02
  belema reconcile --run 2026-02 --format text
  belema reconcile --run 2026-02 --config recon.toml --output evidence.json
  belema reconcile --run 2026-02 --window-days 5

Exit codes:
  0   every payout matched, no unclaimed bank transactions
  12  exceptions present (pack still written)")]
    Reconcile {
        #[arg(long)]
        run: String,

        #[arg(long, env = "BELEMA_DB", default_value = "belema.db")]
        db: PathBuf,

        /// TOML file with [matching] and [evidence] settings
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the matching window (days either side)
        #[arg(long)]
        window_days: Option<u32>,

        #[arg(long, value_enum, default_value = "json")]
        format: ReportFormat,

        /// Write the report to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Show stored row outcomes for one ingested batch
    #[command(after_help = "\
Examples:
  belema audit 5f0c9a1e-0d7b-4c55-a0a4-3b2f1f8f7c11
  belema audit 5f0c9a1e-0d7b-4c55-a0a4-3b2f1f8f7c11 --status error
  belema audit 5f0c9a1e-0d7b-4c55-a0a4-3b2f1f8f7c11 --json")]
    Audit {
        /// Source file id printed by `belema ingest`
        source_file_id: String,

        #[arg(long, env = "BELEMA_DB", default_value = "belema.db")]
        db: PathBuf,

        /// Only rows with this outcome
        #[arg(long, value_enum)]
        status: Option<StatusArg>,

        /// Print rows as JSON on stdout
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LedgerArg {
    Payouts,
    Bank,
}

impl From<LedgerArg> for LedgerKind {
    fn from(arg: LedgerArg) -> Self {
        match arg {
            LedgerArg::Payouts => LedgerKind::Payouts,
            LedgerArg::Bank => LedgerKind::Bank,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Json,
    Text,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum StatusArg {
    Ok,
    Warning,
    Error,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("BELEMA_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version also arrive here and go to stdout.
            let code = if e.use_stderr() { EXIT_USAGE } else { EXIT_SUCCESS };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };
    init_tracing();

    let result = match cli.command {
        Commands::Ingest { file, ledger, org, run, db, json } => {
            ingest::cmd_ingest(file, ledger.into(), org, run, db, json)
        }
        Commands::Check { file, ledger, json } => ingest::cmd_check(file, ledger.into(), json),
        Commands::Reconcile { run, db, config, window_days, format, output } => {
            reconcile::cmd_reconcile(run, db, config, window_days, format, output)
        }
        Commands::Audit { source_file_id, db, status, json } => {
            audit::cmd_audit(source_file_id, db, status, json)
        }
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    /// Error already reported on stdout/stderr; only the exit code remains.
    pub fn silent(code: u8) -> Self {
        Self::new(code, "")
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<ReconError> for CliError {
    fn from(err: ReconError) -> Self {
        let code = recon_exit_code(&err);
        let hint = match &err {
            ReconError::MissingRequiredColumns { .. } => {
                Some("check --ledger matches the file; headers are compared after trimming".to_string())
            }
            ReconError::EmptyInput => Some("the file needs a header row and at least one data row".to_string()),
            ReconError::NotFound(_) => Some("ingest a payouts or bank file with --run first".to_string()),
            ReconError::Storage(_) => Some("check --db or BELEMA_DB points at a writable file".to_string()),
            e if e.is_batch_fatal() => Some("the file was rejected as a whole; nothing was stored".to_string()),
            _ => None,
        };
        Self { code, message: err.to_string(), hint }
    }
}
