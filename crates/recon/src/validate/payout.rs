use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use serde_json::json;

use super::{LedgerValidator, MessageCode, RowCheck, ValidationMessage};
use crate::model::{LedgerKind, Payout, PayoutLine, SourceFile};
use crate::normalize::{parse_date, parse_decimal, Amount, FieldError};
use crate::table::RawRow;

pub const PAYOUT_REQUIRED: &[&str] = &[
    "ID",
    "Status",
    "Date",
    "Currency",
    "Amount",
    "Transaction: ID",
    "Transaction: Type",
];

/// Values fixed by the first row that carries a usable id, currency, date
/// and amount for a payout.
#[derive(Debug, Clone)]
struct PayoutHeader {
    status: String,
    currency: String,
    date: NaiveDate,
    amount: Amount,
    month: Option<String>,
}

#[derive(Debug, Default)]
pub struct PayoutRecords {
    pub payouts: Vec<Payout>,
    pub lines: Vec<PayoutLine>,
}

pub struct PayoutValidator {
    source_file_id: String,
    headers: HashMap<String, PayoutHeader>,
    created: HashSet<String>,
    records: PayoutRecords,
}

impl PayoutValidator {
    pub fn new(source: &SourceFile) -> Self {
        Self {
            source_file_id: source.id.clone(),
            headers: HashMap::new(),
            created: HashSet::new(),
            records: PayoutRecords::default(),
        }
    }
}

fn require(messages: &mut Vec<ValidationMessage>, value: &str, code: MessageCode, column: &str) {
    if value.is_empty() {
        messages.push(ValidationMessage::error(code, format!("{column} is required")));
    }
}

impl LedgerValidator for PayoutValidator {
    type Records = PayoutRecords;

    const LEDGER: LedgerKind = LedgerKind::Payouts;
    const REQUIRED: &'static [&'static str] = PAYOUT_REQUIRED;

    fn check_row(&mut self, row: &RawRow) -> RowCheck {
        let mut messages = Vec::new();

        let payout_id = row.get("ID");
        let status = row.get("Status");
        let currency = row.get("Currency");
        let txn_id = row.get("Transaction: ID");
        let txn_type = row.get("Transaction: Type");

        require(&mut messages, payout_id, MessageCode::MissingPayoutId, "ID");
        require(&mut messages, status, MessageCode::MissingPayoutStatus, "Status");
        require(&mut messages, currency, MessageCode::MissingPayoutCurrency, "Currency");

        let date = parse_date(row.get("Date"));
        match &date {
            Err(FieldError::Empty) => messages.push(ValidationMessage::error(
                MessageCode::MissingPayoutDate,
                "Date is required",
            )),
            Err(e) => messages.push(ValidationMessage::error(MessageCode::BadPayoutDate, e.to_string())),
            Ok(_) => {}
        }

        let amount = parse_decimal(row.get("Amount"));
        match &amount {
            Err(FieldError::Empty) => messages.push(ValidationMessage::error(
                MessageCode::MissingPayoutAmount,
                "Amount is required",
            )),
            Err(e) => messages.push(ValidationMessage::error(MessageCode::BadPayoutAmount, e.to_string())),
            Ok(_) => {}
        }

        require(&mut messages, txn_id, MessageCode::MissingTxnId, "Transaction: ID");
        require(&mut messages, txn_type, MessageCode::MissingTxnType, "Transaction: Type");

        // Cross-row consistency: first usable row wins.
        let usable = !payout_id.is_empty() && !currency.is_empty();
        if let (true, Ok(date), Ok(amount)) = (usable, &date, &amount) {
            match self.headers.get(payout_id) {
                None => {
                    self.headers.insert(
                        payout_id.to_string(),
                        PayoutHeader {
                            status: status.to_string(),
                            currency: currency.to_string(),
                            date: *date,
                            amount: amount.clone(),
                            month: row.get_non_empty("Month").map(String::from),
                        },
                    );
                }
                Some(first) => {
                    if first.currency != currency {
                        messages.push(ValidationMessage::warn(
                            MessageCode::PayoutCurrencyInconsistent,
                            format!(
                                "payout_currency differs within payout_id={payout_id} (first {}, got {currency})",
                                first.currency
                            ),
                        ));
                    }
                    if first.amount != *amount {
                        messages.push(ValidationMessage::warn(
                            MessageCode::PayoutAmountInconsistent,
                            format!(
                                "payout_amount differs within payout_id={payout_id} (first {}, got {amount})",
                                first.amount
                            ),
                        ));
                    }
                }
            }
        }

        let txn_processed_at = match row.get_non_empty("Transaction: Processed At") {
            None => None,
            Some(raw) => match parse_date(raw) {
                Ok(d) => Some(d),
                Err(e) => {
                    messages.push(ValidationMessage::info(
                        MessageCode::UnparsedTxnProcessedAt,
                        format!("Transaction: Processed At ignored: {e}"),
                    ));
                    None
                }
            },
        };

        let parsed = json!({
            "payout_id": payout_id,
            "status": status,
            "date": date.as_ref().ok().map(|d| d.to_string()),
            "currency": currency,
            "amount": amount.as_ref().ok().map(|a| a.as_str()),
            "txn_id": txn_id,
            "txn_type": txn_type,
            "txn_processed_at": txn_processed_at.map(|d| d.to_string()),
        });

        let check = RowCheck { messages, parsed };
        if !check.has_error() {
            self.accept(row, payout_id, txn_processed_at);
        }
        check
    }

    fn into_records(self) -> PayoutRecords {
        self.records
    }
}

impl PayoutValidator {
    fn accept(&mut self, row: &RawRow, payout_id: &str, txn_processed_at: Option<NaiveDate>) {
        // A row without errors always established or matched a header.
        let Some(header) = self.headers.get(payout_id) else {
            return;
        };

        if self.created.insert(payout_id.to_string()) {
            // The header row may have been rejected for a blank status; an
            // accepted row always carries one.
            let status = match header.status.as_str() {
                "" => row.get("Status").to_string(),
                s => s.to_string(),
            };
            self.records.payouts.push(Payout {
                payout_id: payout_id.to_string(),
                status,
                currency: header.currency.clone(),
                date: header.date,
                amount: header.amount.clone(),
                month: header.month.clone(),
                source_file_id: self.source_file_id.clone(),
            });
        }

        self.records.lines.push(PayoutLine {
            payout_id: payout_id.to_string(),
            txn_id: row.get("Transaction: ID").to_string(),
            txn_type: row.get("Transaction: Type").to_string(),
            txn_currency: row.get_non_empty("Transaction: Currency").map(String::from),
            txn_processed_at,
            row_number: row.number(),
        });
    }
}
