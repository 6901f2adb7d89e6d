//! Many threads writing through one writer while it rotates

use std::collections::HashSet;
use std::fs;
use std::sync::Arc;
use std::thread;

use proven_logger_file::{FileLoggerConfig, RotatingWriter};
use serial_test::serial;
use tempfile::tempdir;

const THREADS: usize = 8;
const RECORDS_PER_THREAD: usize = 250;
const RECORD_LEN: usize = 32;

fn record(thread: usize, seq: usize) -> String {
    let line = format!("t{thread:02}-r{seq:04}-");
    format!("{line}{}\n", "x".repeat(RECORD_LEN - line.len() - 1))
}

#[test]
#[serial]
fn test_concurrent_writes_survive_rotation() {
    let dir = tempdir().unwrap();
    let config = FileLoggerConfig::builder(dir.path(), "app.log")
        .max_bytes(1000)
        .build()
        .unwrap();
    let writer = Arc::new(RotatingWriter::open(config).unwrap());

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let writer = Arc::clone(&writer);
            thread::spawn(move || {
                for r in 0..RECORDS_PER_THREAD {
                    assert_eq!(writer.write(record(t, r).as_bytes()).unwrap(), RECORD_LEN);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    writer.close().unwrap();

    let mut total = 0;
    let mut seen = HashSet::new();
    let mut backups = 0;
    for entry in fs::read_dir(dir.path()).unwrap() {
        let entry = entry.unwrap();
        let name = entry.file_name().into_string().unwrap();
        if name != "app.log" {
            backups += 1;
        }

        let contents = fs::read_to_string(entry.path()).unwrap();
        total += contents.len();
        for line in contents.lines() {
            assert_eq!(line.len(), RECORD_LEN - 1, "torn record {line:?} in {name}");
            assert!(seen.insert(line.to_string()), "duplicate record {line:?}");
        }
    }

    assert_eq!(total, THREADS * RECORDS_PER_THREAD * RECORD_LEN);
    assert_eq!(seen.len(), THREADS * RECORDS_PER_THREAD);
    assert!(backups >= 1);
}

#[test]
#[serial]
fn test_concurrent_writes_with_retention() {
    let dir = tempdir().unwrap();
    let config = FileLoggerConfig::builder(dir.path(), "app.log")
        .max_bytes(256)
        .max_backups(3)
        .compress(true)
        .build()
        .unwrap();
    let writer = Arc::new(RotatingWriter::open(config).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let writer = Arc::clone(&writer);
            thread::spawn(move || {
                for r in 0..100 {
                    writer.write(record(t, r).as_bytes()).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    writer.sync_maintenance();

    let backups: Vec<String> = fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .filter(|name| name != "app.log")
        .collect();
    assert_eq!(backups.len(), 3, "unexpected backups {backups:?}");
    assert!(backups.iter().all(|name| name.ends_with(".log.gz")));
}
