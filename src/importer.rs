use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::decode::decode_file;
use crate::error::{ExtractoError, Result};
use crate::extractor::extract;
use crate::normalize::parse_iso_date;
use crate::models::{
    CandidateEntry, FormatDescriptor, LedgerEntry, LedgerSnapshot, NormalizedRecord, RawDocument,
};
use crate::sniffer::{repair_collapsed_rows, sniff, sniff_as, FormatKind, SNIFF_ROWS};

#[derive(Debug)]
pub struct Ingested {
    pub descriptor: FormatDescriptor,
    pub candidates: Vec<CandidateEntry>,
    pub checksum: String,
}

pub fn compute_checksum(file_path: &Path) -> Result<String> {
    let data = std::fs::read(file_path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

/// Sniff and extract a decoded grid. Collapsed rows are repaired across the
/// whole grid before the leading rows are classified. `format` skips
/// detection and reads the grid as that layout.
pub fn ingest_grid(
    mut grid: RawDocument,
    format: Option<FormatKind>,
) -> (FormatDescriptor, Vec<CandidateEntry>) {
    let repaired = repair_collapsed_rows(&mut grid);
    let leading = &grid.rows[..grid.rows.len().min(SNIFF_ROWS)];
    let mut descriptor = match format {
        Some(kind) => sniff_as(kind, leading),
        None => sniff(leading),
    };
    descriptor.repaired_delimiter = repaired;
    let candidates = extract(&grid, &descriptor, descriptor.skip_offset());
    (descriptor, candidates)
}

pub fn ingest_file(
    file_path: &Path,
    delimiter: char,
    format: Option<FormatKind>,
) -> Result<Ingested> {
    let grid = decode_file(file_path, delimiter)?;
    let checksum = compute_checksum(file_path)?;
    let (descriptor, candidates) = ingest_grid(grid, format);
    info!(
        file = %file_path.display(),
        format = descriptor.format_id,
        candidates = candidates.len(),
        "statement ingested"
    );
    Ok(Ingested {
        descriptor,
        candidates,
        checksum,
    })
}

#[derive(Deserialize)]
struct SnapshotRecord {
    date: String,
    amount: Decimal,
    description: String,
}

/// Read a ledger snapshot from a JSON array of `{date, amount, description}`.
pub fn load_snapshot_file(file_path: &Path) -> Result<LedgerSnapshot> {
    let content = std::fs::read_to_string(file_path)?;
    parse_snapshot_json(&content)
}

pub fn parse_snapshot_json(content: &str) -> Result<LedgerSnapshot> {
    let records: Vec<SnapshotRecord> = serde_json::from_str(content)?;
    let entries = records
        .into_iter()
        .enumerate()
        .map(|(i, r)| {
            let date = parse_iso_date(&r.date).ok_or_else(|| {
                ExtractoError::Other(format!("ledger entry {i}: invalid date {:?}", r.date))
            })?;
            Ok(LedgerEntry {
                date,
                amount: r.amount,
                description: r.description,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(LedgerSnapshot::new(entries))
}

/// Records already normalized by the document-understanding service.
pub fn load_normalized_file(file_path: &Path) -> Result<Vec<NormalizedRecord>> {
    let content = std::fs::read_to_string(file_path)?;
    Ok(serde_json::from_str(&content)?)
}
