//! Cell coercion from raw spreadsheet values into numbers and dates.
//!
//! The `parse_*` functions report why a value was rejected; the `coerce_*`
//! functions are total and collapse every failure into `None`, the missing
//! marker the rest of the pipeline works with.

use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;

use crate::{data::RawValue, error::CoercionError};

pub const DEFAULT_DATE_FORMATS: &[&str] =
    &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%d-%b-%Y", "%d %B %Y"];

const DATETIME_SUFFIX_FORMATS: &[&str] =
    &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Parses a numeric cell, accepting thousands separators (`1,200`,
/// `1 200`, `1_200`) and surrounding whitespace.
pub fn parse_number(value: &str) -> Result<Decimal, CoercionError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CoercionError::Empty);
    }
    let cleaned = strip_group_separators(trimmed)
        .ok_or_else(|| CoercionError::NotNumeric(value.to_string()))?;
    if !looks_numeric(&cleaned) {
        return Err(CoercionError::NotNumeric(value.to_string()));
    }
    Decimal::from_str(&cleaned).map_err(|_| CoercionError::NotNumeric(value.to_string()))
}

/// Removes separators that sit between digit groups. Returns `None` when a
/// separator appears somewhere a grouping separator cannot.
fn strip_group_separators(value: &str) -> Option<String> {
    let chars = value.chars().collect::<Vec<_>>();
    let mut cleaned = String::with_capacity(value.len());
    for (idx, ch) in chars.iter().enumerate() {
        if matches!(ch, ',' | '_' | ' ') {
            let before = idx.checked_sub(1).and_then(|i| chars.get(i));
            let after = chars.get(idx + 1);
            let between_digits = before.is_some_and(|c| c.is_ascii_digit())
                && after.is_some_and(|c| c.is_ascii_digit());
            if !between_digits {
                return None;
            }
            continue;
        }
        cleaned.push(*ch);
    }
    Some(cleaned)
}

fn looks_numeric(value: &str) -> bool {
    let unsigned = value.strip_prefix(['-', '+']).unwrap_or(value);
    let mut digits = 0usize;
    let mut dots = 0usize;
    for ch in unsigned.chars() {
        match ch {
            '0'..='9' => digits += 1,
            '.' => dots += 1,
            _ => return false,
        }
    }
    digits > 0 && dots <= 1
}

pub fn coerce_number(value: &RawValue) -> Option<Decimal> {
    match value {
        RawValue::Blank => None,
        RawValue::Text(text) => parse_number(text).ok(),
        RawValue::Number(n) if n.is_finite() => {
            Decimal::from_str(&n.to_string()).ok().or_else(|| Decimal::from_f64(*n))
        }
        RawValue::Number(_) => None,
    }
}

/// Parses a calendar date using `formats` in order. A trailing time of day
/// is accepted and dropped.
pub fn parse_date(value: &str, formats: &[String]) -> Result<NaiveDate, CoercionError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CoercionError::Empty);
    }
    for fmt in formats {
        if let Ok(parsed) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Ok(parsed);
        }
    }
    for fmt in DATETIME_SUFFIX_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Ok(parsed.date());
        }
    }
    Err(CoercionError::NotDate(value.to_string()))
}

pub fn coerce_date(value: &RawValue, formats: &[String]) -> Option<NaiveDate> {
    match value {
        RawValue::Text(text) => parse_date(text, formats).ok(),
        RawValue::Number(_) | RawValue::Blank => None,
    }
}

pub fn coerce_text(value: &RawValue) -> Option<String> {
    match value {
        RawValue::Blank => None,
        RawValue::Text(text) => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        RawValue::Number(n) => Some(n.to_string()),
    }
}

pub fn default_date_formats() -> Vec<String> {
    DEFAULT_DATE_FORMATS.iter().map(|f| f.to_string()).collect()
}
