//! Human-readable renderings. The text report lists the same counts and
//! the same ordering as the JSON evidence pack.

use std::fmt::Write;

use serde::Serialize;

use belema_recon::evidence::SourceIdentity;
use belema_recon::{EvidencePack, RowOutcome};

use crate::exit_codes::EXIT_ERROR;
use crate::CliError;

pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, CliError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| CliError::new(EXIT_ERROR, format!("JSON serialization failed: {}", e)))
}

/// One line per message, grouped under the row that raised it. With
/// `with_raw` the row's source values follow the status.
pub fn render_rows(rows: &[RowOutcome], with_raw: bool) -> String {
    let mut out = String::new();
    for row in rows {
        let _ = writeln!(out, "row {:<5} {}", row.row_number, row.status);
        if with_raw {
            let _ = writeln!(out, "  raw   {}", row.raw.values().join(" | "));
        }
        for msg in &row.messages {
            let _ = writeln!(out, "  {:<5} {:<28} {}", msg.severity.to_string(), msg.code.as_str(), msg.message);
        }
    }
    out
}

fn heading(out: &mut String, title: &str) {
    let _ = writeln!(out, "{}", title);
    let _ = writeln!(out, "{}", "-".repeat(title.len()));
}

fn source_line(source: &Option<SourceIdentity>) -> String {
    match source {
        Some(s) => format!("{} ({})", s.filename, s.id),
        None => "(none)".to_string(),
    }
}

pub fn render_text(pack: &EvidencePack) -> String {
    let mut out = String::new();
    let title = format!("{} RECONCILIATION EVIDENCE PACK", pack.meta.product.to_uppercase());
    let _ = writeln!(out, "{}", title);
    let _ = writeln!(out, "{}", "=".repeat(title.len()));
    let _ = writeln!(out, "Engine version:     {}", pack.meta.engine_version);
    let _ = writeln!(out, "Generated at:       {}", pack.meta.generated_at);
    let _ = writeln!(out, "Organisation:       {}", pack.org_id);
    let _ = writeln!(out, "Run:                {}", pack.run_id);
    let _ = writeln!(out, "Config:             {} (window +/-{} days)", pack.config_name, pack.window_days);
    let _ = writeln!(out, "Payouts source:     {}", source_line(&pack.sources.payouts));
    let _ = writeln!(out, "Bank source:        {}", source_line(&pack.sources.bank));
    out.push('\n');

    let s = &pack.summary;
    heading(&mut out, "SUMMARY");
    let _ = writeln!(out, "Payouts:            {}", s.payouts);
    let _ = writeln!(out, "Bank transactions:  {}", s.bank_transactions);
    let _ = writeln!(out, "Matches:            {}", s.matches);
    let _ = writeln!(out, "Match rate:         {}%", s.match_pct);
    let _ = writeln!(out, "Exceptions:         {}", s.exceptions);
    let _ = writeln!(out, "  Unmatched payouts:           {}", s.unmatched_payouts);
    let _ = writeln!(out, "  Unmatched bank transactions: {}", s.unmatched_bank_transactions);
    let _ = writeln!(out, "  Needs review:                {}", s.needs_review);
    out.push('\n');

    heading(&mut out, &format!("MATCHES ({})", pack.matches.len()));
    if pack.matches.is_empty() {
        let _ = writeln!(out, "(none)");
    } else {
        let _ = writeln!(
            out,
            "{:<4} {:<14} {:<10} {:>4} {:>12} {:<10} {:>6}  {}",
            "#", "PAYOUT", "DATE", "CCY", "AMOUNT", "BANK DATE", "OFFSET", "REASONS"
        );
        for (i, m) in pack.matches.iter().enumerate() {
            let reasons: Vec<String> = m.reason_codes.iter().map(|r| r.to_string()).collect();
            let _ = writeln!(
                out,
                "{:<4} {:<14} {:<10} {:>4} {:>12} {:<10} {:>+6}  {}",
                i + 1,
                m.payout_id,
                m.payout_date.to_string(),
                m.payout_currency,
                m.payout_amount.canonical(),
                m.bank_posted_date.to_string(),
                m.date_offset_days,
                reasons.join(", ")
            );
            let _ = writeln!(out, "     bank row {}: {}", m.bank_row, m.bank_description);
        }
    }
    out.push('\n');

    heading(&mut out, &format!("EXCEPTIONS ({})", pack.exceptions.len()));
    if pack.exceptions.is_empty() {
        let _ = writeln!(out, "(none)");
    }
    for (i, e) in pack.exceptions.iter().enumerate() {
        let _ = writeln!(out, "{:<4} {:<20} {}", i + 1, e.kind.to_string(), e.detail);
    }
    out.push('\n');
    let _ = writeln!(out, "{}", pack.meta.confidentiality);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use belema_recon::evidence::RunContext;
    use belema_recon::{ingest, reconcile, LedgerKind, ReconConfig, SourceFile};
    use chrono::{TimeZone, Utc};

    fn source(id: &str, ledger: LedgerKind) -> SourceFile {
        SourceFile {
            id: id.into(),
            org_id: "acme".into(),
            run_id: Some("run-1".into()),
            ledger,
            filename: format!("{id}.csv"),
        }
    }

    fn pack() -> EvidencePack {
        let p_sf = source("p", LedgerKind::Payouts);
        let b_sf = source("b", LedgerKind::Bank);
        let payouts = ingest(
            &p_sf,
            "ID,Status,Date,Currency,Amount,Transaction: ID,Transaction: Type\n\
             PO-1,paid,2026-02-01,GBP,50.00,T-1,charge\n\
             PO-2,paid,2026-02-05,GBP,75.25,T-2,charge\n",
        )
        .unwrap();
        let bank = ingest(
            &b_sf,
            "Date,Description,Money Out,Money in\n\
             2026-02-03,SHOPIFY PAYMENTS,,50.00\n\
             2026-02-10,Office rent,900.00,\n",
        )
        .unwrap();
        let config = ReconConfig::default();
        let recon = reconcile(payouts.records.payouts(), bank.records.bank_transactions(), &config.match_policy());
        let ctx = RunContext {
            org_id: "acme",
            run_id: "run-1",
            payouts_source: Some(&p_sf),
            bank_source: Some(&b_sf),
            payout_count: 2,
            bank_count: 2,
        };
        EvidencePack::build(&ctx, recon, &config, Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap())
    }

    #[test]
    fn text_report_sections_follow_pack_order() {
        let text = render_text(&pack());
        let order = ["BELEMA RECONCILIATION EVIDENCE PACK", "SUMMARY", "MATCHES (1)", "EXCEPTIONS (2)"];
        let positions: Vec<usize> = order.iter().map(|h| text.find(h).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{text}");

        assert!(text.contains("Match rate:         50%"));
        assert!(text.contains("BANK_AMOUNT_DATE_MATCH, DESC_KEYWORD_SHOPIFY"));
        assert!(text.contains("+2"));
        assert!(text.trim_end().ends_with("Confidential: do not distribute."));

        let unmatched_payout = text.find("UNMATCHED_PAYOUT").unwrap();
        let unmatched_bank = text.find("UNMATCHED_BANK_TXN").unwrap();
        assert!(unmatched_payout < unmatched_bank);
    }

    #[test]
    fn text_report_without_sources() {
        let mut pack = pack();
        pack.sources.bank = None;
        pack.matches.clear();
        let text = render_text(&pack);
        assert!(text.contains("Bank source:        (none)"));
        assert!(text.contains("MATCHES (0)\n-----------\n(none)"));
    }

    #[test]
    fn rows_render_each_message() {
        let sf = source("b", LedgerKind::Bank);
        let out = ingest(&sf, "Date,Description,Money Out,Money in\n2026-02-03,Both,1.00,2.00\n,x,,1\n").unwrap();
        let text = render_rows(&out.rows, false);
        assert!(text.starts_with("row 2     ERROR\n"));
        assert!(text.contains("BOTH_MONEY_IN_AND_OUT"));
        assert!(text.contains("BAD_POSTED_DATE"));

        let with_raw = render_rows(&out.rows[..1], true);
        assert_eq!(with_raw.lines().nth(1), Some("  raw   2026-02-03 | Both | 1.00 | 2.00"));
    }
}
