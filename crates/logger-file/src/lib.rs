//! File-based log writer with rotation
//!
//! This crate persists already formatted log records to a file and keeps
//! that file bounded:
//! - Rotation by size, by hour/day/month boundary, or both
//! - Collision-free backup names (`app_20240101.log`, `app_3.log`)
//! - Background gzip compression and retention of rotated backups
//! - Concurrent writers that never interleave with a rotation
//! - A `tracing-subscriber` writer for the formatting side

#![warn(missing_docs, unreachable_pub)]
#![forbid(unsafe_code)]

mod clock;
mod compress;
mod config;
mod error;
pub mod global;
mod handle;
mod idle;
mod maintenance;
mod naming;
mod policy;
mod reporter;
mod retention;
mod size;
mod subscriber;
mod writer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use compress::Compressor;
pub use config::{
    FileLoggerConfig, FileLoggerConfigBuilder, FileTarget, GB, Granularity, IdleProbe, KB, MB,
    RotationMode,
};
pub use error::{Error, Result};
pub use handle::FileHandle;
pub use naming::{BackupNamer, BackupPattern, GZ_EXTENSION, split_base_name};
pub use policy::{RotationPolicy, Trigger, bucket_suffix, crossed_boundary};
pub use reporter::{ErrorSink, TracingErrorSink};
pub use retention::RetentionSweeper;
pub use size::SizeCounter;
pub use subscriber::file_layer;
pub use writer::{RotatingWriter, WriterStatus};
