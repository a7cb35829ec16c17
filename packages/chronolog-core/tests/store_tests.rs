//! Change store integration tests against the on-disk event log.

use std::collections::HashSet;

use ntest::timeout;
use tempfile::tempdir;

use chronolog_core::change::{ChangeReason, ChangeRecord, ChangeSource, Subject};
use chronolog_core::config::LogConfig;
use chronolog_core::region::{BlockPos, Region};
use chronolog_core::store::{ChangeStore, FileRowStore, StoredRow};

fn cube(world: &str, size: i32) -> Region {
    Region::new(world, BlockPos::new(0, 0, 0), BlockPos::new(size - 1, size - 1, size - 1))
}

fn records(world: &str, size: i32) -> Vec<ChangeRecord> {
    let mut out = Vec::new();
    for x in 0..size {
        for y in 0..size {
            for z in 0..size {
                out.push(ChangeRecord::new(
                    world,
                    BlockPos::new(x, y, z),
                    1_000 + out.len() as i64,
                    ChangeSource::actor("miner").unwrap(),
                    ChangeReason::Break,
                    Subject::cell(format!("ore_{}", x + y + z), "air"),
                ));
            }
        }
    }
    out
}

fn positions(records: &[ChangeRecord]) -> HashSet<BlockPos> {
    records.iter().map(|r| r.pos()).collect()
}

#[timeout(2000)]
#[test]
fn test_query_round_trip() {
    let dir = tempdir().unwrap();
    let config = LogConfig {
        data_dir: dir.path().to_path_buf(),
        ..Default::default()
    };
    let store = ChangeStore::open(&config).unwrap();

    let batch = records("overworld", 3);
    let n = batch.len();
    let outcome = store.append_batch(&batch).unwrap();
    assert_eq!(outcome.committed, n);
    assert!(outcome.is_complete());

    // Noise in another world and outside the region.
    store.append_batch(&records("nether", 3)).unwrap();

    let found = store.query("overworld", &cube("overworld", 3), n).unwrap();
    assert_eq!(found.len(), n);
    let expected: HashSet<_> = batch.iter().cloned().map(|r| format!("{:?}", r)).collect();
    let actual: HashSet<_> = found.iter().cloned().map(|r| format!("{:?}", r)).collect();
    assert_eq!(actual, expected);

    let limited = store.query("overworld", &cube("overworld", 3), 5).unwrap();
    assert_eq!(limited.len(), 5);
    assert!(positions(&limited).is_subset(&positions(&batch)));
}

#[timeout(2000)]
#[test]
fn test_records_survive_reopen() {
    let dir = tempdir().unwrap();
    let config = LogConfig {
        data_dir: dir.path().to_path_buf(),
        ..Default::default()
    };
    let batch = records("overworld", 2);
    {
        let store = ChangeStore::open(&config).unwrap();
        store.append_batch(&batch).unwrap();
    }

    let store = ChangeStore::open(&config).unwrap();
    let found = store.query("overworld", &cube("overworld", 2), 100).unwrap();
    assert_eq!(found, batch);
    assert_eq!(store.row_store().next_event_id(), batch.len() as u64 + 1);
}

#[timeout(2000)]
#[test]
fn test_unknown_subject_kind_is_skipped() {
    let dir = tempdir().unwrap();
    let config = LogConfig {
        data_dir: dir.path().to_path_buf(),
        ..Default::default()
    };
    let store = ChangeStore::open(&config).unwrap();

    let valid = records("overworld", 2);
    store.append_batch(&valid).unwrap();

    let mut foreign = StoredRow::from_record(&valid[0]).unwrap();
    foreign.kind = "BIOME".to_string();
    foreign.from = "plains".to_string();
    foreign.to = "desert".to_string();
    store.row_store().append_rows(vec![foreign]).unwrap();

    let found = store.query("overworld", &cube("overworld", 2), 100).unwrap();
    assert_eq!(found.len(), valid.len());
    assert!(found.iter().all(|r| r.subject().is_cell()));
}

#[timeout(2000)]
#[test]
fn test_verify_reports_clean_log() {
    let dir = tempdir().unwrap();
    let config = LogConfig {
        data_dir: dir.path().to_path_buf(),
        sync_on_commit: false,
        ..Default::default()
    };
    let store = ChangeStore::open(&config).unwrap();
    store.append_batch(&records("overworld", 2)).unwrap();
    store.append_batch(&records("overworld", 1)).unwrap();

    let report = FileRowStore::verify(config.log_path()).unwrap();
    assert!(report.is_clean());
    assert_eq!(report.batches, 2);
    assert_eq!(report.rows, 9);
    assert_eq!(report.valid_bytes, report.total_bytes);
}
