#![forbid(unsafe_code)]

use chrono::{DateTime, TimeZone, Utc};
use traceprint_contracts::client::ClientAttributes;
use traceprint_contracts::edge::EdgeAttributes;
use traceprint_contracts::record::{CaptureHash, ClientHash, EdgeHash, FingerprintRecord};
use traceprint_storage::{FingerprintRepo, FingerprintRowId, FingerprintStore, StorageError};

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

fn row(secs: i64, seed: u64) -> FingerprintRecord {
    FingerprintRecord::v1(
        at(secs),
        EdgeAttributes::v1(
            Some(format!("203.0.113.{}", seed % 250)),
            Some("WiringAgent".to_string()),
            None,
            None,
            None,
            None,
            None,
        )
        .unwrap(),
        ClientAttributes::default(),
        EdgeHash::new(format!("{seed:064x}")).unwrap(),
        ClientHash::new(format!("{:064x}", seed + 1)).unwrap(),
        CaptureHash::new(format!("{:064x}", seed + 2)).unwrap(),
    )
    .unwrap()
}

#[test]
fn at_fp_db_01_rows_append_with_sequential_ids() {
    let mut s = FingerprintStore::new_in_memory();
    assert_eq!(s.fingerprint_row_count(), 0);

    let first = s.append_fingerprint_row(row(10, 0x10)).unwrap();
    let second = s.append_fingerprint_row(row(11, 0x20)).unwrap();

    assert_eq!(first, FingerprintRowId(1));
    assert_eq!(second, FingerprintRowId(2));
    assert_eq!(s.fingerprint_row_count(), 2);
}

#[test]
fn at_fp_db_02_recent_rows_are_newest_first_and_bounded() {
    let mut s = FingerprintStore::new_in_memory();
    s.append_fingerprint_row(row(10, 0x10)).unwrap();
    s.append_fingerprint_row(row(30, 0x30)).unwrap();
    s.append_fingerprint_row(row(20, 0x20)).unwrap();

    let all = s.recent_fingerprint_rows(100);
    let stamps: Vec<i64> = all.iter().map(|r| r.timestamp.timestamp()).collect();
    assert_eq!(stamps, vec![30, 20, 10]);

    let bounded = s.recent_fingerprint_rows(2);
    assert_eq!(bounded.len(), 2);
    assert_eq!(bounded[0].timestamp, at(30));
    assert_eq!(bounded[1].timestamp, at(20));
}

#[test]
fn at_fp_db_03_timestamp_ties_come_back_latest_append_first() {
    let mut s = FingerprintStore::new_in_memory();
    s.append_fingerprint_row(row(10, 0x10)).unwrap();
    s.append_fingerprint_row(row(10, 0x40)).unwrap();

    let rows = s.recent_fingerprint_rows(10);
    assert_eq!(rows[0].edge_hash, EdgeHash::new(format!("{:064x}", 0x40)).unwrap());
    assert_eq!(rows[1].edge_hash, EdgeHash::new(format!("{:064x}", 0x10)).unwrap());
}

#[test]
fn at_fp_db_04_append_only_enforced() {
    let mut s = FingerprintStore::new_in_memory();
    let id = s.append_fingerprint_row(row(10, 0x10)).unwrap();
    assert!(matches!(
        s.attempt_overwrite_fingerprint_row(id),
        Err(StorageError::AppendOnlyViolation { .. })
    ));
}

#[test]
fn at_fp_db_05_stored_row_round_trips_exactly() {
    let mut s = FingerprintStore::new_in_memory();
    let record = row(42, 0x50);
    s.append_fingerprint_row(record.clone()).unwrap();

    let rows = s.recent_fingerprint_rows(1);
    assert_eq!(rows[0], &record);
}

#[test]
fn at_fp_db_06_repo_trait_exposes_the_same_wiring() {
    fn drive(repo: &mut dyn FingerprintRepo) {
        repo.append_fingerprint_row(row(10, 0x60)).unwrap();
        assert_eq!(repo.fingerprint_row_count(), 1);
        assert_eq!(repo.recent_fingerprint_rows(5).len(), 1);
    }
    drive(&mut FingerprintStore::new_in_memory());
}
