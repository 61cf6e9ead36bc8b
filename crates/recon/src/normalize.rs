//! Field normalizers: locale-tolerant decimals and flexible calendar dates.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use bigdecimal::{BigDecimal, RoundingMode};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::{Serialize, Serializer};

/// Why a single field could not be normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    Empty,
    NotANumber(String),
    UnsupportedFormat(String),
    InvalidCalendarDate(String),
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "EMPTY"),
            Self::NotANumber(input) => write!(f, "NOT_A_NUMBER:{input}"),
            Self::UnsupportedFormat(input) => write!(f, "UNSUPPORTED_DATE_FORMAT:{input}"),
            Self::InvalidCalendarDate(input) => write!(f, "BAD_DATE:{input}"),
        }
    }
}

impl std::error::Error for FieldError {}

// ---------------------------------------------------------------------------
// Amount
// ---------------------------------------------------------------------------

/// Exact decimal quantity. Keeps the text it was parsed from so values are
/// reported exactly as supplied; comparison is numeric.
#[derive(Debug, Clone)]
pub struct Amount {
    text: String,
    value: BigDecimal,
}

impl Amount {
    pub fn zero() -> Self {
        Self { text: "0".into(), value: BigDecimal::from(0) }
    }

    pub fn from_value(value: BigDecimal) -> Self {
        Self { text: value.to_string(), value }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn value(&self) -> &BigDecimal {
        &self.value
    }

    /// Two fractional digits, half-up. Used for equality in matching.
    pub fn canonical(&self) -> String {
        self.value.with_scale_round(2, RoundingMode::HalfUp).to_string()
    }

    /// `self - other`, exact, rendered with two fractional digits.
    pub fn minus(&self, other: &Amount) -> Amount {
        let diff = &self.value - &other.value;
        Amount::from_value(diff.with_scale_round(2, RoundingMode::HalfUp))
    }

    pub fn is_zero(&self) -> bool {
        self.value == BigDecimal::from(0)
    }

    pub fn is_positive(&self) -> bool {
        self.value > BigDecimal::from(0)
    }

    pub fn is_negative(&self) -> bool {
        self.value < BigDecimal::from(0)
    }
}

impl PartialEq for Amount {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for Amount {}

impl PartialOrd for Amount {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Amount {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

impl FromStr for Amount {
    type Err = FieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_decimal(s)
    }
}

/// Trim, strip thousands separators, and require a plain decimal literal.
pub fn parse_decimal(input: &str) -> Result<Amount, FieldError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(FieldError::Empty);
    }

    let normalized = s.replace(',', "");
    if !decimal_re().is_match(&normalized) {
        return Err(FieldError::NotANumber(input.to_string()));
    }

    let (sign, digits) = match normalized.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", normalized.trim_start_matches('+')),
    };
    let lead = if digits.starts_with('.') { "0" } else { "" };
    let value = BigDecimal::from_str(&format!("{sign}{lead}{digits}"))
        .map_err(|_| FieldError::NotANumber(input.to_string()))?;

    Ok(Amount { text: normalized, value })
}

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

const ISO_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

const NAMED_DATE_FORMATS: &[&str] = &[
    "%d %b %Y",
    "%d %B %Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%b %d %Y",
    "%B %d %Y",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse a calendar date. Time of day, if any, is discarded.
///
/// Unambiguous formats are tried first. `A/B/YYYY` is then resolved as:
/// A > 12 → day-first; else B > 12 → month-first; else day-first.
pub fn parse_date(input: &str) -> Result<NaiveDate, FieldError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(FieldError::Empty);
    }

    if let Some(date) = parse_unambiguous(s) {
        return Ok(date);
    }

    let Some(caps) = slash_date_re().captures(s) else {
        return Err(FieldError::UnsupportedFormat(input.to_string()));
    };

    let group = |i: usize| caps[i].parse::<u32>().unwrap_or(0);
    let (a, b) = (group(1), group(2));
    let year = caps[3].parse::<i32>().unwrap_or(0);

    let (day, month) = resolve_day_month(a, b);
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| FieldError::InvalidCalendarDate(input.to_string()))
}

fn decimal_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[+-]?(\d+(\.\d+)?|\.\d+)$").unwrap())
}

fn slash_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4})$").unwrap())
}

/// Returns `(day, month)` for the two leading numeric groups.
fn resolve_day_month(a: u32, b: u32) -> (u32, u32) {
    if a > 12 {
        (a, b)
    } else if b > 12 {
        (b, a)
    } else {
        (a, b)
    }
}

fn parse_unambiguous(s: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.naive_utc().date());
    }

    // Numeric formats must lead with a four-digit year, otherwise chrono
    // happily reads "1/2/26" as the year 1.
    let leading_year = s
        .as_bytes()
        .get(..4)
        .is_some_and(|b| b.iter().all(u8::is_ascii_digit));
    if leading_year {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(dt.naive_utc().date());
        }
        // A bare `Z` is UTC, so the naive date is already the right one.
        let naive = s.strip_suffix('Z').unwrap_or(s);
        for fmt in DATETIME_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(naive, fmt) {
                return Some(dt.date());
            }
        }
        return ISO_DATE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok());
    }

    NAMED_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}
