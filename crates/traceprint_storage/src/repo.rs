#![forbid(unsafe_code)]

use traceprint_contracts::record::FingerprintRecord;

use crate::fingerprints::{FingerprintRowId, FingerprintStore, StorageError};

/// Typed repository interface for fingerprint capture persistence. The
/// composer and gate only ever see this seam, never the concrete store.
pub trait FingerprintRepo {
    fn append_fingerprint_row(
        &mut self,
        record: FingerprintRecord,
    ) -> Result<FingerprintRowId, StorageError>;
    fn recent_fingerprint_rows(&self, limit: usize) -> Vec<&FingerprintRecord>;
    fn fingerprint_row_count(&self) -> usize;
}

impl FingerprintRepo for FingerprintStore {
    fn append_fingerprint_row(
        &mut self,
        record: FingerprintRecord,
    ) -> Result<FingerprintRowId, StorageError> {
        FingerprintStore::append_fingerprint_row(self, record)
    }

    fn recent_fingerprint_rows(&self, limit: usize) -> Vec<&FingerprintRecord> {
        FingerprintStore::recent_fingerprint_rows(self, limit)
    }

    fn fingerprint_row_count(&self) -> usize {
        FingerprintStore::fingerprint_row_count(self)
    }
}
