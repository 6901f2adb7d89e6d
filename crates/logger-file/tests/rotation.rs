//! End-to-end rotation behavior against a real directory

use std::fs;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use chrono::{Local, TimeDelta, TimeZone};
use flate2::read::GzDecoder;
use proven_logger_file::{
    Error, FileLoggerConfig, Granularity, IdleProbe, ManualClock, RotatingWriter, RotationMode,
    TracingErrorSink, WriterStatus,
};
use tempfile::tempdir;

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .collect();
    names.sort();
    names
}

fn manual_writer(clock: &ManualClock) -> RotatingWriter {
    RotatingWriter::with_parts(Arc::new(clock.clone()), Arc::new(TracingErrorSink))
}

#[test]
fn test_size_rotation_moves_full_file_aside() {
    let dir = tempdir().unwrap();
    let config = FileLoggerConfig::builder(dir.path(), "app.log")
        .max_bytes(100)
        .build()
        .unwrap();
    let writer = RotatingWriter::open(config).unwrap();

    let record = [b'a'; 60];
    assert_eq!(writer.write(&record).unwrap(), 60);
    assert_eq!(writer.write(&record).unwrap(), 60);

    assert_eq!(file_names(dir.path()), vec!["app.log", "app_1.log"]);
    assert_eq!(fs::metadata(dir.path().join("app_1.log")).unwrap().len(), 60);
    assert_eq!(fs::metadata(dir.path().join("app.log")).unwrap().len(), 60);
    assert_eq!(writer.current_size(), Some(60));
}

#[test]
fn test_no_rotation_below_threshold() {
    let dir = tempdir().unwrap();
    let config = FileLoggerConfig::builder(dir.path(), "app.log")
        .max_bytes(100)
        .build()
        .unwrap();
    let writer = RotatingWriter::open(config).unwrap();

    for _ in 0..11 {
        writer.write(b"12345678\n").unwrap();
    }

    assert_eq!(file_names(dir.path()), vec!["app.log"]);
    assert_eq!(writer.current_size(), Some(99));
    assert_eq!(fs::metadata(dir.path().join("app.log")).unwrap().len(), 99);
}

#[test]
fn test_reaching_threshold_rotates_once() {
    let dir = tempdir().unwrap();
    let config = FileLoggerConfig::builder(dir.path(), "app.log")
        .max_bytes(100)
        .build()
        .unwrap();
    let writer = RotatingWriter::open(config).unwrap();

    writer.write(&[b'x'; 50]).unwrap();
    writer.write(&[b'y'; 50]).unwrap();
    writer.write(&[b'z'; 10]).unwrap();

    assert_eq!(file_names(dir.path()), vec!["app.log", "app_1.log"]);
    assert_eq!(fs::read(dir.path().join("app_1.log")).unwrap(), vec![b'x'; 50]);
    assert_eq!(writer.current_size(), Some(60));
}

#[test]
fn test_oversized_record_goes_to_fresh_file() {
    let dir = tempdir().unwrap();
    let config = FileLoggerConfig::builder(dir.path(), "app.log")
        .max_bytes(10)
        .build()
        .unwrap();
    let writer = RotatingWriter::open(config).unwrap();

    writer.write(&[b'a'; 40]).unwrap();
    assert_eq!(file_names(dir.path()), vec!["app.log"]);

    writer.write(&[b'b'; 40]).unwrap();
    assert_eq!(file_names(dir.path()), vec!["app.log", "app_1.log"]);
    assert_eq!(fs::read(dir.path().join("app.log")).unwrap(), vec![b'b'; 40]);
}

#[test]
fn test_day_boundary_names_backup_after_previous_day() {
    let dir = tempdir().unwrap();
    let clock = ManualClock::new(Local.with_ymd_and_hms(2024, 1, 1, 23, 59, 59).unwrap());
    let writer = manual_writer(&clock);
    let config = FileLoggerConfig::builder(dir.path(), "app.log")
        .granularity(Granularity::Day)
        .idle_probe(IdleProbe::Disabled)
        .build()
        .unwrap();
    writer.configure(config).unwrap();

    writer.write(b"new year's eve\n").unwrap();
    clock.advance(TimeDelta::seconds(2));
    writer.write(b"new year's day\n").unwrap();

    assert_eq!(file_names(dir.path()), vec!["app.log", "app_20240101.log"]);
    assert_eq!(
        fs::read_to_string(dir.path().join("app_20240101.log")).unwrap(),
        "new year's eve\n"
    );
    assert_eq!(
        fs::read_to_string(dir.path().join("app.log")).unwrap(),
        "new year's day\n"
    );
}

#[test]
fn test_clock_stepping_back_keeps_file() {
    let dir = tempdir().unwrap();
    let clock = ManualClock::new(Local.with_ymd_and_hms(2024, 1, 2, 0, 0, 5).unwrap());
    let writer = manual_writer(&clock);
    let config = FileLoggerConfig::builder(dir.path(), "app.log")
        .granularity(Granularity::Day)
        .idle_probe(IdleProbe::Disabled)
        .build()
        .unwrap();
    writer.configure(config).unwrap();

    writer.write(b"just after midnight\n").unwrap();
    clock.set(Local.with_ymd_and_hms(2024, 1, 1, 23, 59, 50).unwrap());
    writer.write(b"clock corrected\n").unwrap();
    assert_eq!(file_names(dir.path()), vec!["app.log"]);

    clock.set(Local.with_ymd_and_hms(2024, 1, 3, 0, 0, 1).unwrap());
    writer.write(b"next day\n").unwrap();
    assert_eq!(file_names(dir.path()), vec!["app.log", "app_20240102.log"]);
}

#[test]
fn test_time_rotation_skips_empty_file() {
    let dir = tempdir().unwrap();
    let clock = ManualClock::new(Local.with_ymd_and_hms(2024, 3, 10, 8, 0, 0).unwrap());
    let writer = manual_writer(&clock);
    let config = FileLoggerConfig::builder(dir.path(), "app.log")
        .granularity(Granularity::Hour)
        .idle_probe(IdleProbe::Disabled)
        .build()
        .unwrap();
    writer.configure(config).unwrap();

    clock.advance(TimeDelta::hours(3));
    assert!(!writer.rotate_if_due().unwrap());
    writer.write(b"late start\n").unwrap();

    assert_eq!(file_names(dir.path()), vec!["app.log"]);
}

#[test]
fn test_month_granularity() {
    let dir = tempdir().unwrap();
    let clock = ManualClock::new(Local.with_ymd_and_hms(2024, 2, 28, 12, 0, 0).unwrap());
    let writer = manual_writer(&clock);
    let config = FileLoggerConfig::builder(dir.path(), "app.log")
        .granularity(Granularity::Month)
        .idle_probe(IdleProbe::Disabled)
        .build()
        .unwrap();
    writer.configure(config).unwrap();

    writer.write(b"february\n").unwrap();
    clock.advance(TimeDelta::days(1));
    writer.write(b"leap day\n").unwrap();
    clock.advance(TimeDelta::days(1));
    writer.write(b"march\n").unwrap();

    assert_eq!(file_names(dir.path()), vec!["app.log", "app_202402.log"]);
    assert_eq!(
        fs::read_to_string(dir.path().join("app_202402.log")).unwrap(),
        "february\nleap day\n"
    );
}

#[test]
fn test_mixed_mode_disambiguates_within_bucket() {
    let dir = tempdir().unwrap();
    let clock = ManualClock::new(Local.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap());
    let writer = manual_writer(&clock);
    let config = FileLoggerConfig::builder(dir.path(), "app.log")
        .mode(RotationMode::Mixed {
            max_bytes: 10,
            granularity: Granularity::Hour,
        })
        .idle_probe(IdleProbe::Disabled)
        .build()
        .unwrap();
    writer.configure(config).unwrap();

    for record in [b"first 10b\n", b"second 10\n", b"third 10b\n"] {
        writer.write(record).unwrap();
    }
    clock.advance(TimeDelta::hours(1));
    writer.write(b"next hour\n").unwrap();

    assert_eq!(
        file_names(dir.path()),
        vec![
            "app.log",
            "app_2024010110.log",
            "app_2024010110_1.log",
            "app_2024010110_2.log",
        ]
    );
    assert_eq!(
        fs::read_to_string(dir.path().join("app_2024010110_2.log")).unwrap(),
        "third 10b\n"
    );
}

#[test]
fn test_compression_and_retention() {
    let dir = tempdir().unwrap();
    let config = FileLoggerConfig::builder(dir.path(), "app.log")
        .max_bytes(10)
        .max_backups(2)
        .compress(true)
        .build()
        .unwrap();
    let writer = RotatingWriter::open(config).unwrap();

    for i in 1..=5 {
        writer.write(format!("record {i:02}\n").as_bytes()).unwrap();
        writer.sync_maintenance();
    }

    assert_eq!(
        file_names(dir.path()),
        vec!["app.log", "app_3.log.gz", "app_4.log.gz"]
    );

    let mut decoded = String::new();
    GzDecoder::new(fs::File::open(dir.path().join("app_4.log.gz")).unwrap())
        .read_to_string(&mut decoded)
        .unwrap();
    assert_eq!(decoded, "record 04\n");
    assert_eq!(
        fs::read_to_string(dir.path().join("app.log")).unwrap(),
        "record 05\n"
    );
}

#[test]
fn test_unlimited_retention_keeps_everything() {
    let dir = tempdir().unwrap();
    let config = FileLoggerConfig::builder(dir.path(), "app.log")
        .max_bytes(5)
        .build()
        .unwrap();
    let writer = RotatingWriter::open(config).unwrap();

    for _ in 0..6 {
        writer.write(b"12345").unwrap();
    }
    writer.sync_maintenance();

    assert_eq!(file_names(dir.path()).len(), 6);
}

#[test]
fn test_existing_backups_are_not_overwritten() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("app_1.log"), b"kept").unwrap();
    fs::write(dir.path().join("app.log"), b"previous run\n").unwrap();
    let config = FileLoggerConfig::builder(dir.path(), "app.log")
        .max_bytes(16)
        .build()
        .unwrap();
    let writer = RotatingWriter::open(config).unwrap();

    writer.write(b"this run\n").unwrap();

    assert_eq!(fs::read(dir.path().join("app_1.log")).unwrap(), b"kept");
    assert_eq!(
        fs::read_to_string(dir.path().join("app_2.log")).unwrap(),
        "previous run\n"
    );
}

#[test]
fn test_write_after_close_fails() {
    let dir = tempdir().unwrap();
    let config = FileLoggerConfig::builder(dir.path(), "app.log")
        .build()
        .unwrap();
    let writer = RotatingWriter::open(config).unwrap();

    writer.close().unwrap();

    assert_eq!(writer.status(), WriterStatus::Closed);
    assert!(matches!(writer.write(b"late\n"), Err(Error::Closed)));
}
