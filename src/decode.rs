use std::path::Path;

use tracing::warn;

use crate::error::{ExtractoError, Result};
use crate::models::{Cell, RawDocument};
use crate::sniffer::{REPAIR_DELIMITERS, SNIFF_ROWS};

fn is_spreadsheet(file_path: &Path) -> bool {
    file_path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| {
            ["xlsx", "xlsm", "xls", "ods"]
                .iter()
                .any(|x| e.eq_ignore_ascii_case(x))
        })
}

/// Decode a statement file into a grid. Any failure is reported as one
/// `Decode` error so the caller can show "no transactions found".
pub fn decode_file(file_path: &Path, delimiter: char) -> Result<RawDocument> {
    let decoded = if is_spreadsheet(file_path) {
        decode_spreadsheet(file_path)
    } else {
        std::fs::read(file_path)
            .map_err(ExtractoError::from)
            .and_then(|bytes| decode_csv(&bytes, delimiter))
    };
    decoded.map_err(|e| match e {
        ExtractoError::Decode(_) => e,
        other => ExtractoError::Decode(format!("{}: {other}", file_path.display())),
    })
}

/// Bank exports are frequently Latin-1; fall back to it when the bytes are
/// not valid UTF-8.
fn bytes_to_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.trim_start_matches('\u{feff}').to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// Number of lines on which `delim` occurs outside double quotes.
fn lines_with(lines: &[&str], delim: char) -> usize {
    lines
        .iter()
        .filter(|line| {
            let mut quoted = false;
            line.chars().any(|c| {
                if c == '"' {
                    quoted = !quoted;
                }
                !quoted && c == delim
            })
        })
        .count()
}

/// Field separator of a delimited text: the candidate found outside quotes
/// on the most leading lines. The configured delimiter wins ties, so it only
/// loses to a separator that explains more of the file.
pub fn detect_delimiter(text: &str, configured: char) -> char {
    let lines: Vec<&str> = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(SNIFF_ROWS)
        .collect();
    let mut best = (configured, lines_with(&lines, configured));
    for &delim in REPAIR_DELIMITERS {
        let count = lines_with(&lines, delim);
        if count > best.1 {
            best = (delim, count);
        }
    }
    best.0
}

/// Split delimited text into a grid. `delimiter` is the configured default;
/// a different separator is used when it fits the leading lines better.
pub fn decode_csv(bytes: &[u8], delimiter: char) -> Result<RawDocument> {
    if !delimiter.is_ascii() {
        return Err(ExtractoError::Decode(format!(
            "delimiter {delimiter:?} is not a single-byte character"
        )));
    }
    let text = bytes_to_text(bytes);
    let detected = detect_delimiter(&text, delimiter);
    if detected != delimiter {
        warn!(
            configured = %delimiter.escape_default(),
            detected = %detected.escape_default(),
            "field separator differs from the configured one"
        );
    }
    let delimiter = detected;
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter as u8)
        .from_reader(text.as_bytes());
    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        rows.push(record.iter().map(Cell::text).collect());
    }
    Ok(RawDocument::new(rows))
}

#[cfg(feature = "xlsx")]
fn decode_spreadsheet(file_path: &Path) -> Result<RawDocument> {
    use calamine::{Data, Reader};

    let mut workbook = calamine::open_workbook_auto(file_path)
        .map_err(|e| ExtractoError::Decode(format!("failed to open spreadsheet: {e}")))?;
    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| ExtractoError::Decode("spreadsheet has no sheets".into()))?;
    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| ExtractoError::Decode(format!("failed to read sheet {sheet}: {e}")))?;

    let rows = range
        .rows()
        .map(|row| {
            row.iter()
                .map(|data| match data {
                    Data::Float(f) => Cell::Number(*f),
                    Data::Int(i) => Cell::Number(*i as f64),
                    Data::DateTime(dt) => Cell::Number(dt.as_f64()),
                    Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => {
                        Cell::text(s.as_str())
                    }
                    Data::Bool(b) => Cell::text(b.to_string()),
                    Data::Empty | Data::Error(_) => Cell::text(""),
                })
                .collect()
        })
        .collect();
    Ok(RawDocument::new(rows))
}

#[cfg(not(feature = "xlsx"))]
fn decode_spreadsheet(file_path: &Path) -> Result<RawDocument> {
    Err(ExtractoError::Decode(format!(
        "{}: spreadsheet support not compiled in",
        file_path.display()
    )))
}
