use tracing::info;

use crate::dedup::flag_duplicates;
use crate::error::{ExtractoError, Result};
use crate::models::{
    CandidateEntry, CommitPayload, Direction, LedgerSnapshot, NormalizedRecord,
    PayloadTransaction, ReviewRecord, TxnType,
};

/// The external collaborator that persists a whole batch or nothing.
pub trait LedgerSink {
    /// Append every transaction of the payload; returns how many were stored.
    fn append_batch(&mut self, payload: &CommitPayload) -> Result<usize>;
}

/// Reviewable record list for one import run.
#[derive(Debug, Clone, Default)]
pub struct ImportSession {
    records: Vec<ReviewRecord>,
}

impl ImportSession {
    pub fn new(candidates: Vec<CandidateEntry>, snapshot: &LedgerSnapshot) -> Self {
        Self {
            records: flag_duplicates(candidates, snapshot),
        }
    }

    /// Records coming from the document-understanding path skip sniffing and
    /// extraction and join at duplicate detection. Their row index is their
    /// position in the list.
    pub fn from_normalized(records: Vec<NormalizedRecord>, snapshot: &LedgerSnapshot) -> Self {
        let mut overrides = Vec::with_capacity(records.len());
        let candidates = records
            .into_iter()
            .enumerate()
            .map(|(i, r)| {
                let direction = match r.kind {
                    TxnType::Ingreso => Direction::Income,
                    TxnType::Gasto | TxnType::Traspaso => Direction::Expense,
                };
                overrides.push((r.kind == TxnType::Traspaso).then_some(TxnType::Traspaso));
                CandidateEntry {
                    date: r.date,
                    description: crate::extractor::truncate_chars(
                        r.description.trim(),
                        crate::extractor::MAX_DESCRIPTION_CHARS,
                    ),
                    amount: r.amount.abs(),
                    direction,
                    source_row_index: i,
                }
            })
            .collect();
        let mut session = Self::new(candidates, snapshot);
        for (record, kind) in session.records.iter_mut().zip(overrides) {
            record.override_type = kind;
        }
        session
    }

    pub fn records(&self) -> &[ReviewRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn selected_count(&self) -> usize {
        self.records.iter().filter(|r| r.selected).count()
    }

    pub fn duplicate_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_duplicate).count()
    }

    fn record_mut(&mut self, row: usize) -> Result<&mut ReviewRecord> {
        self.records
            .iter_mut()
            .find(|r| r.entry.source_row_index == row)
            .ok_or(ExtractoError::UnknownRow(row))
    }

    /// Flip one record's selection; returns the new state.
    pub fn toggle(&mut self, row: usize) -> Result<bool> {
        let record = self.record_mut(row)?;
        record.selected = !record.selected;
        Ok(record.selected)
    }

    pub fn set_selected(&mut self, row: usize, selected: bool) -> Result<()> {
        self.record_mut(row)?.selected = selected;
        Ok(())
    }

    /// Select or deselect every record, duplicates included.
    pub fn select_all(&mut self, selected: bool) {
        for record in &mut self.records {
            record.selected = selected;
        }
    }

    pub fn set_type(&mut self, row: usize, kind: Option<TxnType>) -> Result<()> {
        self.record_mut(row)?.override_type = kind;
        Ok(())
    }

    pub fn set_category(&mut self, row: usize, category: Option<String>) -> Result<()> {
        self.record_mut(row)?.override_category = category;
        Ok(())
    }

    pub fn set_destination(&mut self, row: usize, account: Option<String>) -> Result<()> {
        self.record_mut(row)?.override_destination = account;
        Ok(())
    }

    /// Selected transfers that cannot be committed yet.
    pub fn missing_destinations(&self) -> Vec<usize> {
        self.records
            .iter()
            .filter(|r| r.selected && r.effective_type() == TxnType::Traspaso)
            .filter(|r| {
                r.override_destination
                    .as_deref()
                    .map_or(true, |d| d.trim().is_empty())
            })
            .map(|r| r.entry.source_row_index)
            .collect()
    }

    /// Build the batch of selected records. Refuses the whole batch when any
    /// selected transfer has no destination account.
    pub fn build_commit_payload(&self, target_account: &str) -> Result<CommitPayload> {
        let missing = self.missing_destinations();
        if !missing.is_empty() {
            return Err(ExtractoError::MissingDestination(missing));
        }
        let transactions = self
            .records
            .iter()
            .filter(|r| r.selected)
            .map(|r| {
                let kind = r.effective_type();
                PayloadTransaction {
                    date: r.entry.date.format("%Y-%m-%d").to_string(),
                    description: r.entry.description.clone(),
                    amount: r.entry.amount,
                    kind,
                    destination_account_id: match kind {
                        TxnType::Traspaso => r.override_destination.clone(),
                        _ => None,
                    },
                    category_id: r.override_category.clone(),
                }
            })
            .collect();
        Ok(CommitPayload {
            account_id: target_account.to_string(),
            transactions,
        })
    }

    /// Hand the payload to the sink. The session is left untouched either way,
    /// so a failed commit can be retried without re-reading the statement.
    pub fn commit(&self, target_account: &str, sink: &mut dyn LedgerSink) -> Result<usize> {
        let payload = self.build_commit_payload(target_account)?;
        let stored = sink.append_batch(&payload)?;
        info!(account = target_account, stored, "import batch committed");
        Ok(stored)
    }
}
