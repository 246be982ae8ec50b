use tracing::{info, warn};

use crate::models::{AmountColumns, Cell, ColumnRoles, FormatDescriptor, RawDocument, Row};
use crate::normalize::fold;

/// Leading rows inspected for a signature and for collapsed-row repair.
pub const SNIFF_ROWS: usize = 20;

/// Delimiters tried when rows arrive collapsed into one cell, in tie-break order.
pub(crate) const REPAIR_DELIMITERS: &[char] = &[';', '\t', '|', ','];

// ---------------------------------------------------------------------------
// Known layouts, one variant per institution export.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatKind {
    Bbva,
    Santander,
    Ing,
    Caixabank,
    Sabadell,
    Generic,
}

impl FormatKind {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Bbva => "bbva",
            Self::Santander => "santander",
            Self::Ing => "ing",
            Self::Caixabank => "caixabank",
            Self::Sabadell => "sabadell",
            Self::Generic => "generic",
        }
    }

    /// Substrings that must all appear in one normalized row.
    pub fn signature(&self) -> &'static [&'static str] {
        match self {
            Self::Bbva => &["fecha", "concepto", "divisa"],
            Self::Santander => &["f. operacion", "movimiento", "importe"],
            Self::Ing => &["f. valor", "descripcion", "importe"],
            Self::Caixabank => &["concepto", "fecha valor", "importe"],
            Self::Sabadell => &["valor", "detalle"],
            Self::Generic => &[],
        }
    }

    pub fn columns(&self) -> ColumnRoles {
        match self {
            // Fecha | F.Valor | Concepto | Movimiento | Importe | Divisa | Disponible | Divisa | Observaciones
            Self::Bbva => ColumnRoles {
                date: 0,
                description: 2,
                detail: Some(3),
                amount: AmountColumns::Signed(4),
            },
            // F. Operación | F. Valor | Movimiento | Más datos | Importe | Saldo
            Self::Santander => ColumnRoles {
                date: 0,
                description: 2,
                detail: Some(3),
                amount: AmountColumns::Signed(4),
            },
            // F. VALOR | CATEGORÍA | SUBCATEGORÍA | DESCRIPCIÓN | COMENTARIO | IMAGEN | IMPORTE (€) | SALDO (€)
            Self::Ing => ColumnRoles {
                date: 0,
                description: 3,
                detail: Some(4),
                amount: AmountColumns::Signed(6),
            },
            // Concepto | Fecha | Fecha valor | Importe | Saldo
            Self::Caixabank => ColumnRoles {
                date: 1,
                description: 0,
                detail: None,
                amount: AmountColumns::Signed(3),
            },
            // Fecha | Fecha valor | Detalle | Referencia | Cargo | Abono | Saldo
            Self::Sabadell => ColumnRoles {
                date: 0,
                description: 2,
                detail: Some(3),
                amount: AmountColumns::Split { credit: 5, debit: 4 },
            },
            Self::Generic => ColumnRoles {
                date: 0,
                description: 1,
                detail: None,
                amount: AmountColumns::Signed(2),
            },
        }
    }

    fn matches(&self, normalized_row: &str) -> bool {
        let sig = self.signature();
        !sig.is_empty() && sig.iter().all(|s| normalized_row.contains(s))
    }
}

/// Signature rules in priority order; the first match wins. A layout whose
/// signature is a superset of another's must sit above it, so new formats go
/// in above any weaker rule they would otherwise be shadowed by.
pub const SIGNATURES: &[FormatKind] = &[
    FormatKind::Bbva,
    FormatKind::Santander,
    FormatKind::Ing,
    FormatKind::Caixabank,
    FormatKind::Sabadell,
];

pub fn get_by_key(key: &str) -> Option<FormatKind> {
    SIGNATURES
        .iter()
        .chain(std::iter::once(&FormatKind::Generic))
        .find(|f| f.key() == key)
        .copied()
}

fn normalize_row(row: &Row) -> String {
    row.iter()
        .map(|c| fold(&c.as_text()))
        .collect::<Vec<_>>()
        .join(" | ")
}

// ---------------------------------------------------------------------------
// Collapsed-row repair
// ---------------------------------------------------------------------------

fn collapsed_text(row: &Row) -> Option<&str> {
    match row.as_slice() {
        [Cell::Text(s)] => Some(s.as_str()),
        _ => None,
    }
}

/// Pick the delimiter that explains the most collapsed rows among the
/// leading ones. Needs at least two collapsed rows to act.
pub fn detect_collapsed_delimiter(rows: &[Row]) -> Option<char> {
    let leading = &rows[..rows.len().min(SNIFF_ROWS)];
    let mut best: Option<(char, usize)> = None;
    for &delim in REPAIR_DELIMITERS {
        let count = leading
            .iter()
            .filter_map(collapsed_text)
            .filter(|s| s.contains(delim))
            .count();
        if count >= 2 && best.map_or(true, |(_, c)| count > c) {
            best = Some((delim, count));
        }
    }
    best.map(|(d, _)| d)
}

fn split_collapsed(text: &str, delimiter: char) -> Option<Row> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter as u8)
        .from_reader(text.as_bytes());
    let record = rdr.records().next()?.ok()?;
    Some(record.iter().map(|f| Cell::text(f.trim())).collect())
}

/// Re-split single-cell rows that contain the detected delimiter. Returns the
/// delimiter when a repair was applied.
pub fn repair_collapsed_rows(doc: &mut RawDocument) -> Option<char> {
    let delimiter = detect_collapsed_delimiter(&doc.rows)?;
    warn!(
        delimiter = %delimiter.escape_default(),
        "rows collapsed into single cells, re-splitting"
    );
    for row in doc.rows.iter_mut() {
        let Some(text) = collapsed_text(row) else {
            continue;
        };
        if !text.contains(delimiter) {
            continue;
        }
        if let Some(split) = split_collapsed(text, delimiter) {
            *row = split;
        }
    }
    Some(delimiter)
}

// ---------------------------------------------------------------------------
// sniff
// ---------------------------------------------------------------------------

fn describe(
    kind: FormatKind,
    header_row_index: Option<usize>,
    repaired_delimiter: Option<char>,
) -> FormatDescriptor {
    FormatDescriptor {
        format_id: kind.key(),
        header_row_index,
        columns: kind.columns(),
        repaired_delimiter,
    }
}

fn leading_rows(first_rows: &[Row]) -> (RawDocument, Option<char>) {
    let mut doc = RawDocument::new(first_rows.iter().take(SNIFF_ROWS).cloned().collect());
    let repaired = repair_collapsed_rows(&mut doc);
    (doc, repaired)
}

/// Classify a statement from its leading rows.
pub fn sniff(first_rows: &[Row]) -> FormatDescriptor {
    let (doc, repaired_delimiter) = leading_rows(first_rows);

    for (index, row) in doc.rows.iter().enumerate() {
        let normalized = normalize_row(row);
        if let Some(kind) = SIGNATURES.iter().find(|f| f.matches(&normalized)) {
            info!(format = kind.key(), header_row = index, "statement format detected");
            return describe(*kind, Some(index), repaired_delimiter);
        }
    }

    info!("no known statement format, using generic layout");
    describe(FormatKind::Generic, None, repaired_delimiter)
}

/// Describe the statement as a caller-chosen layout, locating its header row
/// if the signature is present.
pub fn sniff_as(kind: FormatKind, first_rows: &[Row]) -> FormatDescriptor {
    let (doc, repaired_delimiter) = leading_rows(first_rows);
    let header = doc
        .rows
        .iter()
        .position(|row| kind.matches(&normalize_row(row)));
    describe(kind, header, repaired_delimiter)
}
