#![forbid(unsafe_code)]

pub mod fingerprints;
pub mod repo;

pub use fingerprints::{FingerprintRowId, FingerprintStore, StorageError};
pub use repo::FingerprintRepo;
