use tracing::debug;

use crate::models::{CandidateEntry, LedgerEntry, LedgerSnapshot, ReviewRecord};

/// Characters of each description compared in the overlap test.
const PREFIX_CHARS: usize = 10;

fn prefix_lower(s: &str) -> String {
    s.trim().to_lowercase().chars().take(PREFIX_CHARS).collect()
}

/// Either side's first ten characters appear in the other description,
/// case-insensitively. Deliberately permissive: a possible duplicate shown to
/// the operator is cheaper than a real one silently admitted.
fn descriptions_overlap(a: &str, b: &str) -> bool {
    let a_lower = a.trim().to_lowercase();
    let b_lower = b.trim().to_lowercase();
    b_lower.contains(&prefix_lower(a)) || a_lower.contains(&prefix_lower(b))
}

pub fn matches_entry(candidate: &CandidateEntry, entry: &LedgerEntry) -> bool {
    candidate.date == entry.date
        && candidate.amount == entry.amount
        && descriptions_overlap(&candidate.description, &entry.description)
}

pub fn is_duplicate(candidate: &CandidateEntry, snapshot: &LedgerSnapshot) -> bool {
    snapshot.entries().iter().any(|e| matches_entry(candidate, e))
}

/// Turn candidates into review records, flagging likely duplicates. Flagged
/// records start unselected but stay in the list.
pub fn flag_duplicates(
    candidates: Vec<CandidateEntry>,
    snapshot: &LedgerSnapshot,
) -> Vec<ReviewRecord> {
    let records: Vec<ReviewRecord> = candidates
        .into_iter()
        .map(|entry| {
            let dup = is_duplicate(&entry, snapshot);
            ReviewRecord {
                entry,
                selected: !dup,
                is_duplicate: dup,
                override_type: None,
                override_category: None,
                override_destination: None,
            }
        })
        .collect();
    debug!(
        candidates = records.len(),
        duplicates = records.iter().filter(|r| r.is_duplicate).count(),
        ledger_entries = snapshot.len(),
        "duplicate detection done"
    );
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Direction;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn candidate(date: (i32, u32, u32), amount: &str, desc: &str) -> CandidateEntry {
        CandidateEntry {
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            description: desc.to_string(),
            amount: Decimal::from_str(amount).unwrap(),
            direction: Direction::Expense,
            source_row_index: 0,
        }
    }

    fn ledger(date: (i32, u32, u32), amount: &str, desc: &str) -> LedgerEntry {
        LedgerEntry {
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            amount: Decimal::from_str(amount).unwrap(),
            description: desc.to_string(),
        }
    }

    #[test]
    fn test_prefix_contained_in_ledger_description() {
        let snap = LedgerSnapshot::new(vec![ledger(
            (2024, 3, 1),
            "49.99",
            "PAGO SUPERMERCADO ABC MADRID",
        )]);
        let records = flag_duplicates(
            vec![candidate((2024, 3, 1), "49.99", "SUPERMERCADO ABC")],
            &snap,
        );
        assert!(records[0].is_duplicate);
        assert!(!records[0].selected);
    }

    #[test]
    fn test_ledger_prefix_contained_in_candidate() {
        let snap = LedgerSnapshot::new(vec![ledger((2024, 3, 1), "10", "netflix")]);
        let c = candidate((2024, 3, 1), "10.00", "COMPRA TARJ NETFLIX.COM");
        assert!(is_duplicate(&c, &snap));
    }

    #[test]
    fn test_signed_ledger_amount_compares_unsigned() {
        let snap = LedgerSnapshot::new(vec![ledger((2024, 3, 1), "-49.99", "Supermercado ABC")]);
        let c = candidate((2024, 3, 1), "49.99", "SUPERMERCADO ABC");
        assert!(is_duplicate(&c, &snap));
    }

    #[test]
    fn test_different_date_or_amount_is_not_duplicate() {
        let snap = LedgerSnapshot::new(vec![ledger((2024, 3, 1), "49.99", "SUPERMERCADO ABC")]);
        assert!(!is_duplicate(&candidate((2024, 3, 2), "49.99", "SUPERMERCADO ABC"), &snap));
        assert!(!is_duplicate(&candidate((2024, 3, 1), "49.98", "SUPERMERCADO ABC"), &snap));
    }

    #[test]
    fn test_unrelated_description_is_not_duplicate() {
        let snap = LedgerSnapshot::new(vec![ledger((2024, 3, 1), "49.99", "GASOLINERA REPSOL")]);
        let records = flag_duplicates(
            vec![candidate((2024, 3, 1), "49.99", "SUPERMERCADO ABC")],
            &snap,
        );
        assert!(!records[0].is_duplicate);
        assert!(records[0].selected);
    }

    #[test]
    fn test_empty_snapshot_selects_everything() {
        let records = flag_duplicates(
            vec![
                candidate((2024, 3, 1), "1", "A"),
                candidate((2024, 3, 2), "2", "B"),
            ],
            &LedgerSnapshot::default(),
        );
        assert!(records.iter().all(|r| r.selected && !r.is_duplicate));
    }
}
