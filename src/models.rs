use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use crate::normalize::parse_iso_date;

/// A single decoded cell. Decoders hand over either text or a number and
/// every parser handles both explicitly.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
}

impl Cell {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Display form of the cell, trimmed. Integral numbers drop the `.0`.
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(s) => s.trim().to_string(),
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            Self::Number(n) => n.to_string(),
        }
    }
}

pub type Row = Vec<Cell>;

/// The decoded 2-D grid of one uploaded statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawDocument {
    pub rows: Vec<Row>,
}

impl RawDocument {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    #[cfg(test)]
    pub fn from_text_rows<R, S>(rows: R) -> Self
    where
        R: IntoIterator,
        R::Item: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            rows: rows
                .into_iter()
                .map(|r| r.into_iter().map(Cell::text).collect())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountColumns {
    /// One column whose sign carries the direction.
    Signed(usize),
    /// Separate credit (abono) and debit (cargo) columns.
    Split { credit: usize, debit: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnRoles {
    pub date: usize,
    pub description: usize,
    pub detail: Option<usize>,
    pub amount: AmountColumns,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatDescriptor {
    pub format_id: &'static str,
    /// Row the signature matched on; `None` for the generic fallback.
    pub header_row_index: Option<usize>,
    pub columns: ColumnRoles,
    /// Delimiter used to re-split collapsed rows, if the repair ran.
    pub repaired_delimiter: Option<char>,
}

impl FormatDescriptor {
    /// Number of leading rows to skip before data starts.
    pub fn skip_offset(&self) -> usize {
        self.header_row_index.map_or(0, |i| i + 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Income,
    Expense,
}

/// Ledger transaction type as the persistence side names it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxnType {
    Ingreso,
    Gasto,
    Traspaso,
}

impl TxnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ingreso => "INGRESO",
            Self::Gasto => "GASTO",
            Self::Traspaso => "TRASPASO",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "INGRESO" | "INCOME" => Some(Self::Ingreso),
            "GASTO" | "EXPENSE" => Some(Self::Gasto),
            "TRASPASO" | "TRANSFER" => Some(Self::Traspaso),
            _ => None,
        }
    }
}

impl From<Direction> for TxnType {
    fn from(d: Direction) -> Self {
        match d {
            Direction::Income => Self::Ingreso,
            Direction::Expense => Self::Gasto,
        }
    }
}

/// A parsed, not-yet-committed transaction extracted from a statement.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateEntry {
    pub date: NaiveDate,
    pub description: String,
    /// Always non-negative; the sign lives in `direction`.
    pub amount: Decimal,
    pub direction: Direction,
    pub source_row_index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub date: NaiveDate,
    pub amount: Decimal,
    pub description: String,
}

/// Immutable view of already-persisted transactions, used only for
/// duplicate comparison.
#[derive(Debug, Clone, Default)]
pub struct LedgerSnapshot {
    entries: Vec<LedgerEntry>,
}

impl LedgerSnapshot {
    pub fn new(entries: Vec<LedgerEntry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|e| LedgerEntry {
                    amount: e.amount.abs(),
                    ..e
                })
                .collect(),
        }
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReviewRecord {
    pub entry: CandidateEntry,
    pub selected: bool,
    pub is_duplicate: bool,
    pub override_type: Option<TxnType>,
    pub override_category: Option<String>,
    pub override_destination: Option<String>,
}

impl ReviewRecord {
    pub fn effective_type(&self) -> TxnType {
        self.override_type
            .unwrap_or_else(|| self.entry.direction.into())
    }
}

/// Already-normalized record from the document-understanding path.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NormalizedRecord {
    #[serde(deserialize_with = "iso_date")]
    pub date: NaiveDate,
    pub description: String,
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub kind: TxnType,
}

fn iso_date<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<NaiveDate, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_iso_date(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid date {raw:?}")))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadTransaction {
    pub date: String,
    pub description: String,
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub kind: TxnType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_account_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
}

/// The validated batch handed to the ledger-append collaborator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitPayload {
    pub account_id: String,
    pub transactions: Vec<PayloadTransaction>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_cell_as_text() {
        assert_eq!(Cell::text("  COMPRA  ").as_text(), "COMPRA");
        assert_eq!(Cell::Number(45352.0).as_text(), "45352");
        assert_eq!(Cell::Number(-12.5).as_text(), "-12.5");
    }

    #[test]
    fn test_skip_offset() {
        let mut d = FormatDescriptor {
            format_id: "generic",
            header_row_index: None,
            columns: ColumnRoles {
                date: 0,
                description: 1,
                detail: None,
                amount: AmountColumns::Signed(2),
            },
            repaired_delimiter: None,
        };
        assert_eq!(d.skip_offset(), 0);
        d.header_row_index = Some(4);
        assert_eq!(d.skip_offset(), 5);
    }

    #[test]
    fn test_snapshot_stores_unsigned_amounts() {
        let snap = LedgerSnapshot::new(vec![LedgerEntry {
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            amount: Decimal::from_str("-49.99").unwrap(),
            description: "SUPER".into(),
        }]);
        assert_eq!(snap.entries()[0].amount, Decimal::from_str("49.99").unwrap());
    }

    #[test]
    fn test_payload_serialization_shape() {
        let payload = CommitPayload {
            account_id: "acc-1".into(),
            transactions: vec![PayloadTransaction {
                date: "2024-03-01".into(),
                description: "NOMINA".into(),
                amount: Decimal::from_str("1500.00").unwrap(),
                kind: TxnType::Ingreso,
                destination_account_id: None,
                category_id: Some("salary".into()),
            }],
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["accountId"], "acc-1");
        assert_eq!(json["transactions"][0]["type"], "INGRESO");
        assert_eq!(json["transactions"][0]["categoryId"], "salary");
        assert_eq!(json["transactions"][0]["amount"], "1500.00");
        assert!(json["transactions"][0].get("destinationAccountId").is_none());
    }

    #[test]
    fn test_txn_type_parse() {
        assert_eq!(TxnType::parse("traspaso"), Some(TxnType::Traspaso));
        assert_eq!(TxnType::parse(" GASTO "), Some(TxnType::Gasto));
        assert_eq!(TxnType::parse("other"), None);
    }
}
