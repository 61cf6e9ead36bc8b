//! `belema reconcile`: match a stored run and emit its evidence pack.

use std::path::PathBuf;

use chrono::Utc;
use tracing::debug;

use belema_recon::{reconcile_run, ReconConfig};
use belema_store::SqliteStore;

use crate::exit_codes::{EXIT_ERROR, EXIT_RECON_EXCEPTIONS, EXIT_RECON_INVALID_CONFIG};
use crate::render::{render_text, to_json};
use crate::{CliError, ReportFormat};

fn load_config(path: Option<&PathBuf>, window_days: Option<u32>) -> Result<ReconConfig, CliError> {
    let mut config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(|e| {
                CliError::new(EXIT_RECON_INVALID_CONFIG, format!("cannot read config {}: {}", path.display(), e))
            })?;
            ReconConfig::from_toml(&text)?
        }
        None => ReconConfig::default(),
    };
    if let Some(days) = window_days {
        config.matching.window_days = days;
        config.validate().map_err(|e| CliError::from(e).with_hint("--window-days must be between 0 and 366"))?;
    }
    Ok(config)
}

pub fn cmd_reconcile(
    run: String,
    db: PathBuf,
    config: Option<PathBuf>,
    window_days: Option<u32>,
    format: ReportFormat,
    output: Option<PathBuf>,
) -> Result<(), CliError> {
    let config = load_config(config.as_ref(), window_days)?;
    debug!(run = %run, db = %db.display(), window_days = config.matching.window_days, "reconciling run");
    let store = SqliteStore::open(&db)?;
    let pack = reconcile_run(&store, &run, &config, Utc::now())?;

    let rendered = match format {
        ReportFormat::Json => to_json(&pack)?,
        ReportFormat::Text => render_text(&pack),
    };

    if let Some(ref path) = output {
        std::fs::write(path, format!("{}\n", rendered.trim_end()))
            .map_err(|e| CliError::new(EXIT_ERROR, format!("cannot write {}: {}", path.display(), e)))?;
        eprintln!("wrote {}", path.display());
    } else {
        println!("{}", rendered.trim_end());
    }

    let s = &pack.summary;
    eprintln!(
        "run {}: {} payouts, {} bank transactions, {} matched ({}%), {} exceptions",
        pack.run_id, s.payouts, s.bank_transactions, s.matches, s.match_pct, s.exceptions
    );

    if s.exceptions > 0 {
        return Err(CliError::silent(EXIT_RECON_EXCEPTIONS));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_override_is_validated() {
        let err = load_config(None, Some(400)).unwrap_err();
        assert_eq!(err.code, EXIT_RECON_INVALID_CONFIG);
        assert!(err.hint.is_some());

        let ok = load_config(None, Some(7)).unwrap();
        assert_eq!(ok.matching.window_days, 7);
    }

    #[test]
    fn config_file_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recon.toml");
        std::fs::write(&path, "name = \"month-end\"\n[matching]\nwindow_days = 1\n").unwrap();

        let config = load_config(Some(&path), None).unwrap();
        assert_eq!(config.name, "month-end");
        assert_eq!(config.matching.window_days, 1);

        let overridden = load_config(Some(&path), Some(2)).unwrap();
        assert_eq!(overridden.matching.window_days, 2);
    }

    #[test]
    fn missing_config_file_is_invalid_config() {
        let err = load_config(Some(&PathBuf::from("does-not-exist.toml")), None).unwrap_err();
        assert_eq!(err.code, EXIT_RECON_INVALID_CONFIG);
    }
}
