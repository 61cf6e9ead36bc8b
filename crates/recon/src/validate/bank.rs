use serde_json::json;

use super::{LedgerValidator, MessageCode, RowCheck, ValidationMessage};
use crate::model::{BankTransaction, LedgerKind, SourceFile};
use crate::normalize::{parse_date, parse_decimal, Amount, FieldError};
use crate::table::RawRow;

pub const BANK_REQUIRED: &[&str] = &["Date", "Description", "Money Out", "Money in"];

pub struct BankValidator {
    source_file_id: String,
    transactions: Vec<BankTransaction>,
}

impl BankValidator {
    pub fn new(source: &SourceFile) -> Self {
        Self { source_file_id: source.id.clone(), transactions: Vec::new() }
    }
}

/// Blank money cells count as zero.
fn money(raw: &str) -> Result<Amount, FieldError> {
    match parse_decimal(raw) {
        Err(FieldError::Empty) => Ok(Amount::zero()),
        other => other,
    }
}

impl LedgerValidator for BankValidator {
    type Records = Vec<BankTransaction>;

    const LEDGER: LedgerKind = LedgerKind::Bank;
    const REQUIRED: &'static [&'static str] = BANK_REQUIRED;

    fn check_row(&mut self, row: &RawRow) -> RowCheck {
        let mut messages = Vec::new();

        let posted = parse_date(row.get("Date"));
        if let Err(e) = &posted {
            messages.push(ValidationMessage::error(MessageCode::BadPostedDate, e.to_string()));
        }

        let description = row.get("Description");
        if description.is_empty() {
            messages.push(ValidationMessage::error(
                MessageCode::MissingDescription,
                "Description is required",
            ));
        }

        let money_in = money(row.get("Money in"));
        let money_out = money(row.get("Money Out"));

        match &money_in {
            Err(e) => messages.push(ValidationMessage::error(MessageCode::BadMoneyIn, e.to_string())),
            Ok(v) if v.is_negative() => messages.push(ValidationMessage::error(
                MessageCode::NegativeMoneyIn,
                format!("Money in must not be negative, got {v}"),
            )),
            Ok(_) => {}
        }
        match &money_out {
            Err(e) => messages.push(ValidationMessage::error(MessageCode::BadMoneyOut, e.to_string())),
            Ok(v) if v.is_negative() => messages.push(ValidationMessage::error(
                MessageCode::NegativeMoneyOut,
                format!("Money Out must not be negative, got {v}"),
            )),
            Ok(_) => {}
        }

        let mut amount = None;
        if let (Ok(inflow), Ok(outflow)) = (&money_in, &money_out) {
            if inflow.is_positive() && outflow.is_positive() {
                messages.push(ValidationMessage::error(
                    MessageCode::BothMoneyInAndOut,
                    "Row has both Money in and Money Out > 0",
                ));
            } else if inflow.is_zero() && outflow.is_zero() {
                messages.push(ValidationMessage::warn(
                    MessageCode::ZeroRow,
                    "Both Money in and Money Out are 0",
                ));
            }
            amount = Some(inflow.minus(outflow));
        }

        let balance = match row.get_non_empty("Balance") {
            None => None,
            Some(raw) => match parse_decimal(raw) {
                Ok(b) => Some(b),
                Err(e) => {
                    messages.push(ValidationMessage::info(
                        MessageCode::UnparsedBalance,
                        format!("Balance ignored: {e}"),
                    ));
                    None
                }
            },
        };

        let parsed = json!({
            "posted_date": posted.as_ref().ok().map(|d| d.to_string()),
            "description": description,
            "money_in": money_in.as_ref().ok().map(|a| a.as_str()),
            "money_out": money_out.as_ref().ok().map(|a| a.as_str()),
            "amount": amount.as_ref().map(|a| a.as_str()),
            "balance": balance.as_ref().map(|a| a.as_str()),
        });

        let check = RowCheck { messages, parsed };

        if !check.has_error() {
            if let (Ok(posted_date), Ok(money_in), Ok(money_out), Some(amount)) =
                (posted, money_in, money_out, amount)
            {
                self.transactions.push(BankTransaction {
                    posted_date,
                    description: description.to_string(),
                    reference: row.get_non_empty("Reference").map(String::from),
                    sort_code: row.get_non_empty("Sort Code").map(String::from),
                    account_number: row.get_non_empty("Account Number").map(String::from),
                    money_in,
                    money_out,
                    amount,
                    balance,
                    row_number: row.number(),
                    source_file_id: self.source_file_id.clone(),
                });
            }
        }
        check
    }

    fn into_records(self) -> Vec<BankTransaction> {
        self.transactions
    }
}
