//! Cell-level conversion. Nothing here fails: a value that cannot be
//! converted degrades to null (whole-column conversion) or stays as it was
//! (scalar normalization).

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::constants::{PERCENT_THRESHOLD, TYPE_CONVERSION_THRESHOLD};
use crate::domain::CellValue;

static DATE_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{1,2}-\d{1,2}").unwrap());
static SIGNED_DECIMAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?\d+(\.\d+)?$").unwrap());
static LOOSE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-+]?(\d+\.?\d*|\.\d+)([eE][-+]?\d+)?$").unwrap());

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

const LOOSE_DATE_FORMATS: &[&str] = &["%m/%d/%Y", "%d %b %Y", "%b %d, %Y", "%B %d, %Y", "%d %B %Y"];

/// Parses ISO-like `YYYY-M-D` dates, with or without a time part.
pub fn parse_date(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    // Fall back to the date prefix of longer strings, e.g. "2025-01-01 (est)".
    let prefix = DATE_PREFIX.find(s)?;
    NaiveDate::parse_from_str(prefix.as_str(), "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// `parse_date` plus common human-readable layouts. Bare years are not dates.
pub fn parse_date_loose(raw: &str) -> Option<NaiveDateTime> {
    if let Some(dt) = parse_date(raw) {
        return Some(dt);
    }
    let s = raw.trim();
    LOOSE_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn looks_like_date(cell: &CellValue) -> bool {
    match cell {
        CellValue::Date(_) => true,
        CellValue::Text(s) => DATE_PREFIX.is_match(s.trim()),
        _ => false,
    }
}

fn looks_numeric(cell: &CellValue) -> bool {
    match cell {
        CellValue::Number(_) => true,
        CellValue::Text(s) => SIGNED_DECIMAL.is_match(s.trim()),
        _ => false,
    }
}

/// What `convert_column` decided for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    Date,
    Numeric,
    Unchanged,
}

/// Converts a whole column to dates or numbers when enough of its non-null
/// values match. Entries that then fail to convert become null.
pub fn convert_column(cells: &mut [CellValue]) -> Conversion {
    let non_null = cells.iter().filter(|c| !c.is_null()).count();
    if non_null == 0 {
        return Conversion::Unchanged;
    }
    let ratio = |n: usize| n as f64 / non_null as f64;

    let dates = cells.iter().filter(|c| looks_like_date(c)).count();
    if ratio(dates) >= TYPE_CONVERSION_THRESHOLD {
        for cell in cells.iter_mut() {
            *cell = match std::mem::take(cell) {
                CellValue::Date(d) => CellValue::Date(d),
                CellValue::Text(s) => parse_date(&s).map(CellValue::Date).unwrap_or(CellValue::Null),
                _ => CellValue::Null,
            };
        }
        return Conversion::Date;
    }

    let numbers = cells.iter().filter(|c| looks_numeric(c)).count();
    if ratio(numbers) >= TYPE_CONVERSION_THRESHOLD {
        for cell in cells.iter_mut() {
            *cell = match std::mem::take(cell) {
                CellValue::Number(n) => CellValue::Number(n),
                CellValue::Text(s) => s
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|_| SIGNED_DECIMAL.is_match(s.trim()))
                    .map(CellValue::Number)
                    .unwrap_or(CellValue::Null),
                _ => CellValue::Null,
            };
        }
        return Conversion::Numeric;
    }

    Conversion::Unchanged
}

/// True when at least half of the column's cells carry a percent sign.
pub fn is_percent_column(cells: &[CellValue]) -> bool {
    if cells.is_empty() {
        return false;
    }
    let percents = cells
        .iter()
        .filter(|c| c.as_text().map(|s| s.contains('%')).unwrap_or(false))
        .count();
    percents as f64 / cells.len() as f64 >= PERCENT_THRESHOLD
}

/// Strips currency symbols, thousands separators and `%`, then parses.
/// Percent values are scaled to a fraction. Returns None when the stripped
/// text is not a number.
pub fn normalize_scalar(raw: &str, percent: bool) -> Option<f64> {
    let stripped: String = raw
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | '%'))
        .collect();
    let stripped = stripped.trim();
    if !LOOSE_NUMBER.is_match(stripped) {
        return None;
    }
    let n = stripped.parse::<f64>().ok()?;
    Some(if percent { n / 100.0 } else { n })
}

/// Applies scalar normalization to every text cell of a column, leaving
/// values that do not parse untouched.
pub fn normalize_text_column(cells: &mut [CellValue]) {
    let percent = is_percent_column(cells);
    for cell in cells.iter_mut() {
        if let CellValue::Text(s) = cell {
            if let Some(n) = normalize_scalar(s, percent) {
                *cell = CellValue::Number(n);
            }
        }
    }
}

/// Re-parses text cells as dates when at least one of them parses.
/// Returns the number of converted cells.
pub fn reparse_dates(cells: &mut [CellValue]) -> usize {
    let parsed: Vec<Option<NaiveDateTime>> = cells
        .iter()
        .map(|c| c.as_text().and_then(parse_date_loose))
        .collect();
    let hits = parsed.iter().filter(|p| p.is_some()).count();
    if hits == 0 {
        return 0;
    }
    for (cell, date) in cells.iter_mut().zip(parsed) {
        if let Some(d) = date {
            *cell = CellValue::Date(d);
        }
    }
    hits
}
