//! Delimited-text reader: raw text in, header-keyed rows out.
//!
//! No domain knowledge lives here. The reader accepts comma-separated fields,
//! double-quoted fields with embedded commas and `""` escapes, and `\n` or
//! `\r\n` line endings. Rows shorter than the header are padded with empty
//! strings; extra trailing fields are dropped.

use std::borrow::Cow;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::ReconError;

/// One data row. Values are trimmed and keyed by the (trimmed) header name,
/// in header order. `number` is 1-based with the header counted as row 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    number: usize,
    fields: Vec<(String, String)>,
}

impl RawRow {
    pub fn new(number: usize, fields: Vec<(String, String)>) -> Self {
        Self { number, fields }
    }

    pub fn number(&self) -> usize {
        self.number
    }

    /// Value for `column`, or `""` when the column does not exist.
    /// With duplicate header names the right-most column wins.
    pub fn get(&self, column: &str) -> &str {
        self.fields
            .iter()
            .rev()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
            .unwrap_or("")
    }

    /// Value for `column` when present and non-empty.
    pub fn get_non_empty(&self, column: &str) -> Option<&str> {
        Some(self.get(column)).filter(|v| !v.is_empty())
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Values in header order.
    pub fn values(&self) -> Vec<&str> {
        self.fields.iter().map(|(_, v)| v.as_str()).collect()
    }
}

impl Serialize for RawRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Parsed text: the header list plus every data row.
#[derive(Debug, Clone)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl Table {
    /// Names from `required` that are not in the header, in `required` order.
    pub fn missing_columns(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|col| !self.headers.iter().any(|h| h == *col))
            .map(|col| col.to_string())
            .collect()
    }
}

/// Parse delimited text. Fails with `EmptyInput` when no data rows result.
pub fn parse_table(text: &str) -> Result<Table, ReconError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let text = strip_blanks_before_quotes(text);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut headers: Option<Vec<String>> = None;
    let mut rows = Vec::new();

    for record in reader.records() {
        let record = record.map_err(|e| ReconError::Csv(e.to_string()))?;

        // A line holding nothing at all never becomes a row (header or data).
        if record.len() == 1 && record.get(0).is_some_and(str::is_empty) {
            continue;
        }

        match headers {
            Some(ref header) => {
                let fields = header
                    .iter()
                    .enumerate()
                    .map(|(i, name)| (name.clone(), record.get(i).unwrap_or("").to_string()))
                    .collect();
                let number = rows.len() + 2;
                rows.push(RawRow::new(number, fields));
            }
            None => headers = Some(record.iter().map(|h| h.to_string()).collect()),
        }
    }

    match headers {
        Some(headers) if !rows.is_empty() => Ok(Table { headers, rows }),
        _ => Err(ReconError::EmptyInput),
    }
}

/// Drop blanks between a delimiter (or line start) and an opening quote, so
/// `a, "b, c"` reads as two fields. The reader only trims after splitting.
fn strip_blanks_before_quotes(text: &str) -> Cow<'_, str> {
    if !text.contains('"') {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    let mut pending = String::new();
    let mut chars = text.chars().peekable();
    let mut in_quotes = false;
    let mut field_start = true;

    while let Some(c) = chars.next() {
        if in_quotes {
            out.push(c);
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    out.push('"');
                } else {
                    in_quotes = false;
                }
            }
            continue;
        }

        match c {
            ' ' | '\t' if field_start => pending.push(c),
            '"' if field_start => {
                pending.clear();
                out.push(c);
                in_quotes = true;
                field_start = false;
            }
            ',' | '\n' | '\r' => {
                out.push_str(&pending);
                pending.clear();
                out.push(c);
                field_start = true;
            }
            _ => {
                out.push_str(&pending);
                pending.clear();
                out.push(c);
                field_start = false;
            }
        }
    }
    out.push_str(&pending);
    Cow::Owned(out)
}
