#![forbid(unsafe_code)]

use traceprint_contracts::record::FingerprintRecord;
use traceprint_contracts::{ContractViolation, Validate};

#[derive(Debug, Clone, PartialEq)]
pub enum StorageError {
    AppendOnlyViolation { table: &'static str },
    ContractViolation(ContractViolation),
}

impl From<ContractViolation> for StorageError {
    fn from(v: ContractViolation) -> Self {
        StorageError::ContractViolation(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FingerprintRowId(pub u64);

/// Append-only row set for captured fingerprints. One row per capture
/// event; rows are never mutated after insert, so concurrent captures need
/// no coordination beyond exclusive access during the append itself.
#[derive(Debug, Clone)]
pub struct FingerprintStore {
    fingerprint_rows: Vec<FingerprintRecord>,
    next_fingerprint_row_id: u64,
}

impl Default for FingerprintStore {
    fn default() -> Self {
        Self::new_in_memory()
    }
}

impl FingerprintStore {
    pub fn new_in_memory() -> Self {
        Self {
            fingerprint_rows: Vec::new(),
            next_fingerprint_row_id: 1,
        }
    }

    pub fn append_fingerprint_row(
        &mut self,
        record: FingerprintRecord,
    ) -> Result<FingerprintRowId, StorageError> {
        record.validate()?;
        let row_id = FingerprintRowId(self.next_fingerprint_row_id);
        self.next_fingerprint_row_id += 1;
        self.fingerprint_rows.push(record);
        Ok(row_id)
    }

    /// The most recent rows ordered by capture timestamp descending,
    /// bounded by `limit`. Rows sharing a timestamp come back latest
    /// append first.
    pub fn recent_fingerprint_rows(&self, limit: usize) -> Vec<&FingerprintRecord> {
        let mut rows: Vec<&FingerprintRecord> = self.fingerprint_rows.iter().rev().collect();
        rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        rows.truncate(limit);
        rows
    }

    pub fn fingerprint_row_count(&self) -> usize {
        self.fingerprint_rows.len()
    }

    /// Rows are append-only; there is no mutation path. This probe exists
    /// so the wiring tests can pin that contract down.
    pub fn attempt_overwrite_fingerprint_row(
        &mut self,
        _row_id: FingerprintRowId,
    ) -> Result<(), StorageError> {
        Err(StorageError::AppendOnlyViolation {
            table: "fingerprints",
        })
    }
}
