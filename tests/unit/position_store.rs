//! Unit tests for the position file.

use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;

use monochromator_motion::config::StepsPerCount;
use monochromator_motion::error::{Error, PersistenceError};
use monochromator_motion::persist::{BAD_MAGIC, GOOD_MAGIC, RECORD_LEN};
use monochromator_motion::{CounterReadout, PersistedRecord, PositionStore, ReadoutSource};

/// Operator input replayed line by line.
struct ScriptedReadout {
    lines: VecDeque<String>,
    prompts: usize,
    rejected: Vec<String>,
}

impl ScriptedReadout {
    fn new(lines: &[&str]) -> Self {
        Self {
            lines: lines.iter().map(|l| l.to_string()).collect(),
            prompts: 0,
            rejected: Vec::new(),
        }
    }
}

impl ReadoutSource for ScriptedReadout {
    fn next_line(&mut self, prompt: &str) -> Option<String> {
        assert!(prompt.contains("X.XX"));
        self.prompts += 1;
        self.lines.pop_front()
    }

    fn reject(&mut self, line: &str, _reason: &str) {
        self.rejected.push(line.to_string());
    }
}

fn store_in(dir: &tempfile::TempDir) -> (PositionStore, PathBuf) {
    let path = dir.path().join("posinfo.bin");
    (PositionStore::new(&path, StepsPerCount::DEFAULT), path)
}

/// Test a missing file is created from the operator readout.
#[test]
fn test_create_from_readout() {
    let dir = tempfile::tempdir().unwrap();
    let (store, path) = store_in(&dir);
    let mut input = ScriptedReadout::new(&["abc", "1.5", "40.00"]);

    let record = store.load(&mut input).unwrap();

    assert_eq!(record, PersistedRecord::valid(10_000, 0));
    assert_eq!(input.prompts, 3);
    assert_eq!(input.rejected, vec!["abc".to_string(), "1.5".to_string()]);
    assert_eq!(fs::read(&path).unwrap(), record.encode().to_vec());
}

/// Test a zero readout is refused and asked again.
#[test]
fn test_zero_readout_refused() {
    let dir = tempfile::tempdir().unwrap();
    let (store, _path) = store_in(&dir);
    let mut input = ScriptedReadout::new(&["0.00", "0.01"]);

    let record = store.load(&mut input).unwrap();
    assert_eq!(input.rejected.len(), 1);
    // 0.01 counts at 250 steps per count truncates to 2 steps.
    assert_eq!(record.current_pos, 2);
}

/// Test the conversion factor is taken from the store.
#[test]
fn test_custom_steps_per_count() {
    let dir = tempfile::tempdir().unwrap();
    let store = PositionStore::new(
        dir.path().join("posinfo.bin"),
        StepsPerCount::new(400).unwrap(),
    );

    let record = store.load(&mut ScriptedReadout::new(&["2.50"])).unwrap();
    assert_eq!(record.current_pos, 1_000);
}

/// Test a readout worth less than one step is refused and asked again.
#[test]
fn test_readout_below_one_step_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("posinfo.bin");
    let store = PositionStore::new(&path, StepsPerCount::new(1).unwrap());
    let mut input = ScriptedReadout::new(&["0.50", "2.00"]);

    let record = store.load(&mut input).unwrap();

    assert_eq!(input.rejected, vec!["0.50".to_string()]);
    assert_eq!(record, PersistedRecord::valid(2, 0));
    assert_eq!(fs::read(&path).unwrap(), record.encode().to_vec());
}

/// Test a clean record loads as stored.
#[test]
fn test_load_valid_record() {
    let dir = tempfile::tempdir().unwrap();
    let (store, _path) = store_in(&dir);
    store.validate_and_store(123_456, -20).unwrap();

    let mut input = ScriptedReadout::new(&[]);
    let record = store.load(&mut input).unwrap();

    assert_eq!(record, PersistedRecord::valid(123_456, -20));
    assert!(record.is_valid());
    assert_eq!(input.prompts, 0);
}

/// Test the on-disk layout is three little-endian words.
#[test]
fn test_on_disk_layout() {
    let dir = tempfile::tempdir().unwrap();
    let (store, path) = store_in(&dir);
    store.validate_and_store(0x0102_0304, 5).unwrap();

    let bytes = fs::read(&path).unwrap();
    assert_eq!(bytes.len(), RECORD_LEN);
    assert_eq!(&bytes[0..4], &[0x04, 0x03, 0x02, 0x01]);
    assert_eq!(&bytes[4..8], &5i32.to_le_bytes());
    assert_eq!(&bytes[8..12], &GOOD_MAGIC.to_le_bytes());
}

/// Test an invalidated file is reported as a crash.
#[test]
fn test_invalidated_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (store, _path) = store_in(&dir);
    store.validate_and_store(5_000, 0).unwrap();
    store.invalidate().unwrap();

    let result = store.load(&mut ScriptedReadout::new(&["1.00"]));
    match result {
        Err(Error::Persistence(PersistenceError::BadSentinel(magic))) => assert_eq!(magic, BAD_MAGIC),
        other => panic!("expected bad sentinel, got {:?}", other),
    }
}

/// Test restoring after an invalidate makes the file loadable again.
#[test]
fn test_store_after_invalidate() {
    let dir = tempfile::tempdir().unwrap();
    let (store, _path) = store_in(&dir);
    store.validate_and_store(5_000, 0).unwrap();
    store.invalidate().unwrap();
    store.validate_and_store(5_250, 100).unwrap();

    let record = store.load(&mut ScriptedReadout::new(&[])).unwrap();
    assert_eq!(record, PersistedRecord::valid(5_250, 100));
}

/// Test a stored zero position is refused.
#[test]
fn test_zero_position_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (store, _path) = store_in(&dir);
    store.validate_and_store(0, 0).unwrap();

    assert!(matches!(
        store.load(&mut ScriptedReadout::new(&[])),
        Err(Error::Persistence(PersistenceError::ZeroPosition))
    ));
}

/// Test a short file is refused and left untouched.
#[test]
fn test_size_mismatch_leaves_file() {
    let dir = tempfile::tempdir().unwrap();
    let (store, path) = store_in(&dir);
    let old_format = [0x10, 0x27, 0, 0, 0xad, 0xda, 0xad, 0xba];
    fs::write(&path, old_format).unwrap();

    match store.load(&mut ScriptedReadout::new(&["1.00"])) {
        Err(Error::Persistence(PersistenceError::SizeMismatch { found, expected })) => {
            assert_eq!(found, 8);
            assert_eq!(expected, RECORD_LEN as u64);
        }
        other => panic!("expected size mismatch, got {:?}", other),
    }
    assert_eq!(fs::read(&path).unwrap(), old_format.to_vec());
}

/// Test a failed load never rewrites the file.
#[test]
fn test_load_does_not_modify_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let (store, path) = store_in(&dir);
    store.validate_and_store(7_000, 3).unwrap();
    store.invalidate().unwrap();
    let before = fs::read(&path).unwrap();

    assert!(store.load(&mut ScriptedReadout::new(&["1.00"])).is_err());
    assert!(store.load(&mut ScriptedReadout::new(&["1.00"])).is_err());
    assert_eq!(fs::read(&path).unwrap(), before);
}

/// Test parent directories are created on first store.
#[test]
fn test_store_creates_parent_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state").join("posinfo.bin");
    let store = PositionStore::new(&path, StepsPerCount::DEFAULT);

    store.validate_and_store(42, 0).unwrap();
    assert_eq!(store.read_record().unwrap(), PersistedRecord::valid(42, 0));
}

/// Test readout parsing and display.
#[test]
fn test_counter_readout_format() {
    assert_eq!("12.50".parse::<CounterReadout>().unwrap().hundredths(), 1_250);
    assert_eq!(" 3.07\n".parse::<CounterReadout>().unwrap().to_string(), "3.07");
    assert!("12".parse::<CounterReadout>().is_err());
    assert!("12.500".parse::<CounterReadout>().is_err());
    assert!("-1.00".parse::<CounterReadout>().is_err());
    assert!("1.0a".parse::<CounterReadout>().is_err());

    let readout = CounterReadout::from_steps(10_000, StepsPerCount::DEFAULT);
    assert_eq!(readout.to_string(), "40.00");
}
