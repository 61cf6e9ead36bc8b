use std::collections::BTreeMap;

use tracing::info;

use crate::config::DEFAULT_WINDOW_DAYS;
use crate::model::{BankTransaction, Exception, ExceptionKind, Match, Payout, ReasonCode, Reconciliation};

/// Matching knobs. Keywords are held upper-cased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchPolicy {
    pub window_days: u32,
    pub keywords: Vec<String>,
}

impl MatchPolicy {
    pub fn new(window_days: u32, keywords: &[String]) -> Self {
        Self {
            window_days,
            keywords: keywords.iter().map(|k| k.to_ascii_uppercase()).collect(),
        }
    }
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_DAYS, &["SHOPIFY".to_string()])
    }
}

/// Equal two-decimal amount and posted date within `window_days` of the
/// payout date, in either direction.
pub fn is_candidate(payout: &Payout, txn: &BankTransaction, window_days: u32) -> bool {
    payout.amount.canonical() == txn.amount.canonical() && within_window(payout, txn, window_days)
}

fn within_window(payout: &Payout, txn: &BankTransaction, window_days: u32) -> bool {
    (txn.posted_date - payout.date).num_days().unsigned_abs() <= u64::from(window_days)
}

fn reason_codes(txn: &BankTransaction, policy: &MatchPolicy) -> Vec<ReasonCode> {
    let description = txn.description.to_ascii_uppercase();
    let mut codes = vec![ReasonCode::BankAmountDateMatch];
    codes.extend(
        policy
            .keywords
            .iter()
            .filter(|kw| description.contains(kw.as_str()))
            .map(|kw| ReasonCode::DescKeyword(kw.clone())),
    );
    codes
}

/// Deterministic amount + date-window reconciliation.
///
/// Every payout yields exactly one of: a `Match` (one candidate),
/// `UNMATCHED_PAYOUT` (none) or `NEEDS_REVIEW` (several). Bank transactions
/// that no payout would accept are reported as `UNMATCHED_BANK_TXN`.
/// Payout exceptions come first, in payout order, then bank exceptions in
/// bank order.
pub fn reconcile(payouts: &[Payout], bank: &[BankTransaction], policy: &MatchPolicy) -> Reconciliation {
    let mut bank_by_amount: BTreeMap<String, Vec<&BankTransaction>> = BTreeMap::new();
    for txn in bank {
        bank_by_amount.entry(txn.amount.canonical()).or_default().push(txn);
    }

    let mut payouts_by_amount: BTreeMap<String, Vec<&Payout>> = BTreeMap::new();
    for payout in payouts {
        payouts_by_amount.entry(payout.amount.canonical()).or_default().push(payout);
    }

    let mut matches = Vec::new();
    let mut exceptions = Vec::new();

    for payout in payouts {
        let candidates: Vec<&BankTransaction> = bank_by_amount
            .get(&payout.amount.canonical())
            .map(|group| {
                group
                    .iter()
                    .copied()
                    .filter(|txn| within_window(payout, txn, policy.window_days))
                    .collect()
            })
            .unwrap_or_default();

        match candidates.as_slice() {
            [] => exceptions.push(Exception {
                kind: ExceptionKind::UnmatchedPayout,
                detail: format!("{} ({} {})", payout.payout_id, payout.currency, payout.amount),
                candidates: None,
            }),
            [txn] => matches.push(Match {
                payout_id: payout.payout_id.clone(),
                payout_currency: payout.currency.clone(),
                payout_amount: payout.amount.clone(),
                payout_date: payout.date,
                bank_posted_date: txn.posted_date,
                bank_amount: txn.amount.clone(),
                bank_description: txn.description.clone(),
                bank_reference: txn.reference.clone(),
                bank_row: txn.row_number,
                date_offset_days: (txn.posted_date - payout.date).num_days(),
                reason_codes: reason_codes(txn, policy),
            }),
            many => exceptions.push(Exception {
                kind: ExceptionKind::NeedsReview,
                detail: format!(
                    "{}: multiple bank candidates ({}) for amount {}",
                    payout.payout_id,
                    many.len(),
                    payout.amount
                ),
                candidates: Some(many.len()),
            }),
        }
    }

    for txn in bank {
        let claimed = payouts_by_amount
            .get(&txn.amount.canonical())
            .is_some_and(|group| group.iter().any(|p| within_window(p, txn, policy.window_days)));
        if !claimed {
            exceptions.push(Exception {
                kind: ExceptionKind::UnmatchedBankTxn,
                detail: format!("{} {} {}", txn.posted_date.format("%Y-%m-%d"), txn.amount, txn.description),
                candidates: None,
            });
        }
    }

    info!(
        payouts = payouts.len(),
        bank_transactions = bank.len(),
        matches = matches.len(),
        exceptions = exceptions.len(),
        "reconciliation complete"
    );

    Reconciliation { matches, exceptions }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::parse_decimal;
    use chrono::NaiveDate;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn payout(id: &str, amount: &str, d: &str) -> Payout {
        Payout {
            payout_id: id.into(),
            status: "paid".into(),
            currency: "GBP".into(),
            date: date(d),
            amount: parse_decimal(amount).unwrap(),
            month: None,
            source_file_id: "sf-p".into(),
        }
    }

    fn txn(amount: &str, d: &str, desc: &str) -> BankTransaction {
        let amount = parse_decimal(amount).unwrap();
        BankTransaction {
            posted_date: date(d),
            description: desc.into(),
            reference: None,
            sort_code: None,
            account_number: None,
            money_in: amount.clone(),
            money_out: parse_decimal("0").unwrap(),
            amount,
            balance: None,
            row_number: 2,
            source_file_id: "sf-b".into(),
        }
    }

    #[test]
    fn single_candidate_is_a_match() {
        let payouts = vec![payout("PO-10001", "50.00", "2026-02-01")];
        let bank = vec![txn("50.00", "2026-02-03", "Faster payment")];
        let out = reconcile(&payouts, &bank, &MatchPolicy::default());

        assert_eq!(out.matches.len(), 1);
        assert!(out.exceptions.is_empty());
        let m = &out.matches[0];
        assert_eq!(m.payout_id, "PO-10001");
        assert_eq!(m.reason_codes, vec![ReasonCode::BankAmountDateMatch]);
        assert_eq!(m.date_offset_days, 2);
    }

    #[test]
    fn brand_keyword_adds_reason_code() {
        let payouts = vec![payout("PO-1", "50.00", "2026-02-01")];
        let bank = vec![txn("50", "2026-02-01", "Shopify Payments GB")];
        let out = reconcile(&payouts, &bank, &MatchPolicy::default());
        assert_eq!(
            out.matches[0].reason_codes,
            vec![ReasonCode::BankAmountDateMatch, ReasonCode::DescKeyword("SHOPIFY".into())]
        );
    }

    #[test]
    fn two_candidates_need_review() {
        let payouts = vec![payout("PO-1", "100.00", "2026-01-10")];
        let bank = vec![
            txn("100.00", "2026-01-11", "A"),
            txn("100.00", "2026-01-12", "B"),
        ];
        let out = reconcile(&payouts, &bank, &MatchPolicy::default());

        assert!(out.matches.is_empty());
        assert_eq!(out.exceptions.len(), 1);
        assert_eq!(out.exceptions[0].kind, ExceptionKind::NeedsReview);
        assert_eq!(out.exceptions[0].candidates, Some(2));
        assert_eq!(
            out.exceptions[0].detail,
            "PO-1: multiple bank candidates (2) for amount 100.00"
        );
    }

    #[test]
    fn no_candidate_is_unmatched_on_both_sides() {
        let payouts = vec![payout("PO-1", "50.00", "2026-02-01")];
        let bank = vec![txn("50.00", "2026-02-05", "Late")];
        let out = reconcile(&payouts, &bank, &MatchPolicy::default());

        assert!(out.matches.is_empty());
        let kinds: Vec<_> = out.exceptions.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![ExceptionKind::UnmatchedPayout, ExceptionKind::UnmatchedBankTxn]);
        assert_eq!(out.exceptions[0].detail, "PO-1 (GBP 50.00)");
        assert_eq!(out.exceptions[1].detail, "2026-02-05 50.00 Late");
    }

    #[test]
    fn window_boundary_is_inclusive() {
        let payouts = vec![payout("PO-1", "10.00", "2026-02-10")];
        let before = vec![txn("10.00", "2026-02-07", "x")];
        let after = vec![txn("10.00", "2026-02-13", "x")];
        assert_eq!(reconcile(&payouts, &before, &MatchPolicy::default()).matches.len(), 1);
        assert_eq!(reconcile(&payouts, &after, &MatchPolicy::default()).matches.len(), 1);

        let strict = MatchPolicy::new(0, &[]);
        assert!(reconcile(&payouts, &after, &strict).matches.is_empty());
    }

    #[test]
    fn amounts_compare_at_two_decimals() {
        let payouts = vec![payout("PO-1", "10", "2026-02-10")];
        let bank = vec![txn("10.001", "2026-02-10", "x")];
        assert_eq!(reconcile(&payouts, &bank, &MatchPolicy::default()).matches.len(), 1);
    }

    #[test]
    fn negative_bank_amounts_never_match_positive_payouts() {
        let payouts = vec![payout("PO-1", "10.00", "2026-02-10")];
        let bank = vec![txn("-10.00", "2026-02-10", "Chargeback")];
        let out = reconcile(&payouts, &bank, &MatchPolicy::default());
        assert_eq!(out.count(ExceptionKind::UnmatchedPayout), 1);
        assert_eq!(out.count(ExceptionKind::UnmatchedBankTxn), 1);
    }

    #[test]
    fn candidate_in_review_is_not_an_unmatched_bank_txn() {
        let payouts = vec![payout("PO-1", "5.00", "2026-03-01")];
        let bank = vec![txn("5.00", "2026-03-01", "a"), txn("5.00", "2026-03-02", "b")];
        let out = reconcile(&payouts, &bank, &MatchPolicy::default());
        assert_eq!(out.count(ExceptionKind::NeedsReview), 1);
        assert_eq!(out.count(ExceptionKind::UnmatchedBankTxn), 0);
    }

    #[test]
    fn exceptions_ordered_payouts_then_bank() {
        let payouts = vec![
            payout("PO-B", "2.00", "2026-03-01"),
            payout("PO-A", "1.00", "2026-03-01"),
        ];
        let bank = vec![txn("9.00", "2026-03-01", "first"), txn("8.00", "2026-03-01", "second")];
        let out = reconcile(&payouts, &bank, &MatchPolicy::default());
        let details: Vec<&str> = out.exceptions.iter().map(|e| e.detail.as_str()).collect();
        assert_eq!(
            details,
            vec!["PO-B (GBP 2.00)", "PO-A (GBP 1.00)", "2026-03-01 9.00 first", "2026-03-01 8.00 second"]
        );
    }

    #[test]
    fn empty_inputs_produce_nothing() {
        let out = reconcile(&[], &[], &MatchPolicy::default());
        assert!(out.matches.is_empty() && out.exceptions.is_empty());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn arb_date() -> impl Strategy<Value = NaiveDate> {
            (0i64..60).prop_map(|d| date("2026-01-01") + chrono::Duration::days(d))
        }

        fn arb_amount() -> impl Strategy<Value = String> {
            (0u32..400).prop_map(|c| format!("{}.{:02}", c / 100, c % 100))
        }

        proptest! {
            #[test]
            fn candidate_predicate_is_symmetric(
                pd in arb_date(), bd in arb_date(),
                pa in arb_amount(), ba in arb_amount(),
                window in 0u32..10,
            ) {
                let p = payout("PO", &pa, &pd.to_string());
                let t = txn(&ba, &bd.to_string(), "x");
                // Swap roles: a payout placed at the bank date and a txn at the payout date.
                let p_swapped = payout("PO", &ba, &bd.to_string());
                let t_swapped = txn(&pa, &pd.to_string(), "x");
                prop_assert_eq!(is_candidate(&p, &t, window), is_candidate(&p_swapped, &t_swapped, window));
            }

            #[test]
            fn every_payout_lands_in_exactly_one_outcome(
                payout_cases in prop::collection::vec((arb_amount(), arb_date()), 0..8),
                bank_cases in prop::collection::vec((arb_amount(), arb_date()), 0..8),
            ) {
                let payouts: Vec<Payout> = payout_cases
                    .iter()
                    .enumerate()
                    .map(|(i, (a, d))| payout(&format!("PO-{i}"), a, &d.to_string()))
                    .collect();
                let bank: Vec<BankTransaction> = bank_cases
                    .iter()
                    .map(|(a, d)| txn(a, &d.to_string(), "x"))
                    .collect();
                let out = reconcile(&payouts, &bank, &MatchPolicy::default());
                let payout_exceptions = out.count(ExceptionKind::UnmatchedPayout) + out.count(ExceptionKind::NeedsReview);
                prop_assert_eq!(out.matches.len() + payout_exceptions, payouts.len());
            }
        }
    }
}
