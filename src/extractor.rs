use rust_decimal::Decimal;
use tracing::debug;

use crate::models::{
    AmountColumns, CandidateEntry, Cell, Direction, FormatDescriptor, RawDocument, Row,
};
use crate::normalize::{amount_from_cell, date_from_cell, direction_from_sign};

pub const MAX_DESCRIPTION_CHARS: usize = 150;
const DETAIL_SEPARATOR: &str = " - ";

fn cell(row: &Row, idx: usize) -> Option<&Cell> {
    row.get(idx)
}

/// A row is data only when its date column looks like a date: a slash token of
/// at least 8 characters, or a numeric day serial.
fn looks_like_date(cell: &Cell) -> bool {
    match cell {
        Cell::Text(s) => s
            .split_whitespace()
            .next()
            .is_some_and(|token| token.contains('/') && token.chars().count() >= 8),
        Cell::Number(_) => date_from_cell(cell).is_some(),
    }
}

pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((byte_idx, _)) => s[..byte_idx].to_string(),
        None => s.to_string(),
    }
}

fn build_description(row: &Row, primary: usize, detail: Option<usize>) -> String {
    let main = cell(row, primary).map(Cell::as_text).unwrap_or_default();
    let extra = detail
        .and_then(|i| cell(row, i))
        .map(Cell::as_text)
        .unwrap_or_default();
    let full = match (main.is_empty(), extra.is_empty()) {
        (_, true) => main,
        (true, false) => extra,
        (false, false) => format!("{main}{DETAIL_SEPARATOR}{extra}"),
    };
    truncate_chars(&full, MAX_DESCRIPTION_CHARS)
}

fn non_zero(cell: Option<&Cell>) -> Option<Decimal> {
    cell.and_then(amount_from_cell).filter(|a| !a.is_zero())
}

/// Amount and direction for one row, or `None` when the row carries no money.
fn resolve_amount(row: &Row, columns: AmountColumns) -> Option<(Decimal, Direction)> {
    match columns {
        AmountColumns::Signed(idx) => {
            let raw = cell(row, idx)?;
            let amount = non_zero(Some(raw))?;
            Some((amount, direction_from_sign(raw)))
        }
        AmountColumns::Split { credit, debit } => {
            // Debit wins when both columns are populated.
            if let Some(amount) = non_zero(cell(row, debit)) {
                return Some((amount, Direction::Expense));
            }
            non_zero(cell(row, credit)).map(|amount| (amount, Direction::Income))
        }
    }
}

fn extract_row(index: usize, row: &Row, descriptor: &FormatDescriptor) -> Option<CandidateEntry> {
    let cols = &descriptor.columns;
    let date_cell = cell(row, cols.date)?;
    if !looks_like_date(date_cell) {
        return None;
    }
    let date = date_from_cell(date_cell)?;
    let (amount, direction) = resolve_amount(row, cols.amount)?;
    Some(CandidateEntry {
        date,
        description: build_description(row, cols.description, cols.detail),
        amount,
        direction,
        source_row_index: index,
    })
}

/// Walk the data rows after `skip_offset` into candidate entries, in row order.
/// Rows without a recognizable date or with a zero/unparsable amount are
/// dropped silently: subtotals and balance lines are not failures.
pub fn extract(
    grid: &RawDocument,
    descriptor: &FormatDescriptor,
    skip_offset: usize,
) -> Vec<CandidateEntry> {
    let data_rows = grid.rows.len().saturating_sub(skip_offset);
    let entries: Vec<CandidateEntry> = grid
        .rows
        .iter()
        .enumerate()
        .skip(skip_offset)
        .filter_map(|(i, row)| extract_row(i, row, descriptor))
        .collect();
    debug!(
        format = descriptor.format_id,
        extracted = entries.len(),
        dropped = data_rows - entries.len(),
        "rows extracted"
    );
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ColumnRoles;
    use crate::sniffer::FormatKind;
    use chrono::NaiveDate;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn descriptor(kind: FormatKind, header_row: Option<usize>) -> FormatDescriptor {
        FormatDescriptor {
            format_id: kind.key(),
            header_row_index: header_row,
            columns: kind.columns(),
            repaired_delimiter: None,
        }
    }

    fn text_row(cells: &[&str]) -> Row {
        cells.iter().map(|c| Cell::text(*c)).collect()
    }

    #[test]
    fn test_extract_signed_layout() {
        let grid = RawDocument::new(vec![
            text_row(&["Fecha", "Descripción", "Importe"]),
            text_row(&["01/03/2024", "SUPERMERCADO ABC", "-49,99"]),
            text_row(&["02/03/2024", "NOMINA EMPRESA", "1.500,00"]),
        ]);
        let d = descriptor(FormatKind::Generic, Some(0));
        let rows = extract(&grid, &d, d.skip_offset());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(rows[0].amount, dec("49.99"));
        assert_eq!(rows[0].direction, Direction::Expense);
        assert_eq!(rows[0].source_row_index, 1);
        assert_eq!(rows[1].amount, dec("1500.00"));
        assert_eq!(rows[1].direction, Direction::Income);
    }

    #[test]
    fn test_non_date_rows_are_skipped() {
        let grid = RawDocument::new(vec![
            text_row(&["Saldo anterior", "", "1.000,00"]),
            text_row(&["1/3/24", "SHORT DATE", "5,00"]),
            text_row(&["01-03-2024", "DASHED DATE", "5,00"]),
            text_row(&["01/03/2024", "REAL", "5,00"]),
            text_row(&["99/99/9999", "BAD DATE", "5,00"]),
        ]);
        let d = descriptor(FormatKind::Generic, None);
        let rows = extract(&grid, &d, 0);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].description, "REAL");
        assert_eq!(rows[0].source_row_index, 3);
    }

    #[test]
    fn test_zero_and_unparsable_amounts_are_dropped() {
        let grid = RawDocument::new(vec![
            text_row(&["01/03/2024", "SUBTOTAL", "0,00"]),
            text_row(&["01/03/2024", "NOTE", "n/a"]),
            text_row(&["01/03/2024", "SHORT ROW"]),
            text_row(&["01/03/2024", "OK", "2,50"]),
        ]);
        let d = descriptor(FormatKind::Generic, None);
        let rows = extract(&grid, &d, 0);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].amount, dec("2.50"));
    }

    #[test]
    fn test_split_columns_direction() {
        // Fecha | Fecha valor | Detalle | Referencia | Cargo | Abono | Saldo
        let grid = RawDocument::new(vec![
            text_row(&["Fecha", "Fecha valor", "Detalle", "Referencia", "Cargo", "Abono", "Saldo"]),
            text_row(&["01/03/2024", "01/03/2024", "TRANSFERENCIA", "REF1", "", "200,00", "1.200,00"]),
            text_row(&["02/03/2024", "02/03/2024", "RECIBO LUZ", "REF2", "60,10", "0,00", "1.139,90"]),
            text_row(&["03/03/2024", "03/03/2024", "RARO", "REF3", "5,00", "7,00", "1.134,90"]),
            text_row(&["04/03/2024", "04/03/2024", "VACIO", "REF4", "", "", "1.134,90"]),
        ]);
        let d = descriptor(FormatKind::Sabadell, Some(0));
        let rows = extract(&grid, &d, d.skip_offset());
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].direction, Direction::Income);
        assert_eq!(rows[0].amount, dec("200"));
        assert_eq!(rows[1].direction, Direction::Expense);
        assert_eq!(rows[1].amount, dec("60.10"));
        assert_eq!(rows[2].direction, Direction::Expense);
        assert_eq!(rows[2].amount, dec("5"));
        assert_eq!(rows[0].description, "TRANSFERENCIA - REF1");
    }

    #[test]
    fn test_description_truncated_to_limit() {
        let long = "Ñ".repeat(200);
        let grid = RawDocument::new(vec![text_row(&["01/03/2024", &long, "1,00"])]);
        let d = descriptor(FormatKind::Generic, None);
        let rows = extract(&grid, &d, 0);
        assert_eq!(rows[0].description.chars().count(), MAX_DESCRIPTION_CHARS);
    }

    #[test]
    fn test_description_without_primary_uses_detail() {
        let columns = ColumnRoles {
            date: 0,
            description: 1,
            detail: Some(2),
            amount: AmountColumns::Signed(3),
        };
        let d = FormatDescriptor {
            format_id: "test",
            header_row_index: None,
            columns,
            repaired_delimiter: None,
        };
        let grid = RawDocument::new(vec![
            text_row(&["01/03/2024", "", "BIZUM JUAN", "10,00"]),
            text_row(&["01/03/2024", "CAFE", "", "-2,00"]),
        ]);
        let rows = extract(&grid, &d, 0);
        assert_eq!(rows[0].description, "BIZUM JUAN");
        assert_eq!(rows[1].description, "CAFE");
    }

    #[test]
    fn test_numeric_cells() {
        let grid = RawDocument::new(vec![
            vec![Cell::Number(45352.0), Cell::text("CUOTA"), Cell::Number(-12.5)],
            vec![Cell::text("Total"), Cell::text(""), Cell::Number(-12.5)],
        ]);
        let d = descriptor(FormatKind::Generic, None);
        let rows = extract(&grid, &d, 0);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(rows[0].amount, dec("12.5"));
        assert_eq!(rows[0].direction, Direction::Expense);
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("abcdef", 3), "abc");
        assert_eq!(truncate_chars("ab", 3), "ab");
        assert_eq!(truncate_chars("ñandú", 4), "ñand");
    }
}
