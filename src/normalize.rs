use std::str::FromStr;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use crate::models::{Cell, Direction};

static SLASH_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4}|\d{2})$").unwrap());

// Largest serial a spreadsheet can hold (9999-12-31).
const MAX_DAY_SERIAL: f64 = 2_958_465.0;

// ---------------------------------------------------------------------------
// Amounts
// ---------------------------------------------------------------------------

/// Strip everything that decorates an amount without being part of it:
/// whitespace, quotes and currency symbols anywhere, sign markers only at
/// the edges.
fn strip_decorations(raw: &str) -> String {
    let upper = raw.trim().to_uppercase();
    let without_code = upper.replace("EUR", "");
    let bare: String = without_code
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '"' | '\'' | '€' | '$' | '£'))
        .collect();
    bare.trim_matches(|c| matches!(c, '+' | '-' | '(' | ')'))
        .to_string()
}

/// Parse locale-ambiguous amount text into an unsigned decimal.
///
/// When both `.` and `,` occur the right-most one is the decimal mark. A lone
/// `,` is always the decimal mark. A lone `.` followed by exactly three digits
/// is thousands grouping, otherwise it is the decimal mark. The sign is never
/// read here: callers decide direction from the column layout.
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let s = strip_decorations(raw);
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ',') {
        return None;
    }
    if !s.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let decimal_pos = match (s.rfind('.'), s.rfind(',')) {
        (Some(dot), Some(comma)) => Some(dot.max(comma)),
        (None, Some(comma)) => Some(comma),
        (Some(dot), None) if s.len() - dot - 1 == 3 => None,
        (Some(dot), None) => Some(dot),
        (None, None) => None,
    };

    let mut canonical = String::with_capacity(s.len() + 1);
    for (i, c) in s.char_indices() {
        if c.is_ascii_digit() {
            canonical.push(c);
        } else if Some(i) == decimal_pos {
            if canonical.is_empty() {
                canonical.push('0');
            }
            canonical.push('.');
        }
    }
    let canonical = canonical.trim_end_matches('.');
    Decimal::from_str(canonical).ok()
}

/// Unsigned amount of a grid cell.
pub fn amount_from_cell(cell: &Cell) -> Option<Decimal> {
    match cell {
        Cell::Text(s) => parse_amount(s),
        Cell::Number(n) if n.is_finite() => Decimal::from_f64(n.abs()).map(|d| d.round_dp(2)),
        Cell::Number(_) => None,
    }
}

/// Direction carried by an explicit sign on a single signed-amount column:
/// a leading or trailing `-`, accounting parentheses, or a negative number.
pub fn direction_from_sign(cell: &Cell) -> Direction {
    let negative = match cell {
        Cell::Number(n) => *n < 0.0,
        Cell::Text(s) => {
            let t: String = s
                .trim()
                .chars()
                .filter(|c| !c.is_whitespace() && !matches!(c, '"' | '€' | '$' | '£'))
                .collect();
            let t = t.trim_start_matches("EUR").trim_end_matches("EUR");
            t.starts_with('-') || t.ends_with('-') || (t.starts_with('(') && t.ends_with(')'))
        }
    };
    if negative {
        Direction::Expense
    } else {
        Direction::Income
    }
}

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

/// Parse `DD/MM/YYYY` text (two-digit years read as 20YY). Anything after the
/// first whitespace, such as a time of day, is ignored.
pub fn parse_local_date(raw: &str) -> Option<NaiveDate> {
    let token = raw.split_whitespace().next()?;
    let caps = SLASH_DATE.captures(token)?;
    let d: u32 = caps[1].parse().ok()?;
    let m: u32 = caps[2].parse().ok()?;
    let mut y: i32 = caps[3].parse().ok()?;
    if caps[3].len() == 2 {
        y += 2000;
    }
    NaiveDate::from_ymd_opt(y, m, d)
}

/// Spreadsheet day serial to a calendar date. The epoch is 1899-12-30, which
/// absorbs the 1900 leap-year bug; the fractional time of day is dropped.
pub fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || !(1.0..=MAX_DAY_SERIAL).contains(&serial) {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    base.checked_add_days(chrono::Days::new(serial.trunc() as u64))
}

/// ISO-8601 calendar date with an optional time part, which is ignored.
pub fn parse_iso_date(raw: &str) -> Option<NaiveDate> {
    let day = raw.trim().get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

pub fn date_from_cell(cell: &Cell) -> Option<NaiveDate> {
    match cell {
        Cell::Text(s) => parse_local_date(s),
        Cell::Number(n) => serial_to_date(*n),
    }
}

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

fn fold_char(c: char) -> char {
    match c {
        'á' | 'à' | 'ä' | 'â' | 'ã' => 'a',
        'é' | 'è' | 'ë' | 'ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' | 'õ' => 'o',
        'ú' | 'ù' | 'ü' | 'û' => 'u',
        'ñ' => 'n',
        'ç' => 'c',
        'º' => 'o',
        'ª' => 'a',
        other => other,
    }
}

/// Lower-case and strip diacritics, for signature matching.
pub fn fold(s: &str) -> String {
    s.to_lowercase().chars().map(fold_char).collect()
}
