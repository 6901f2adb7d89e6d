//! Error types for file-based logging

use std::io;
use std::path::PathBuf;

/// Result type for file logger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during file logging
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid target or rotation parameters
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Failed to create log directory
    #[error("Failed to create log directory at {path}: {source}")]
    CreateDirectory {
        /// The path that failed to be created
        path: PathBuf,
        /// The underlying error
        source: io::Error,
    },

    /// Failed to open the live log file
    #[error("Failed to open log file at {path}: {source}")]
    Open {
        /// The live file path
        path: PathBuf,
        /// The underlying error
        source: io::Error,
    },

    /// Write to the live log file failed
    #[error("Failed to write log record: {0}")]
    Write(#[source] io::Error),

    /// Failed to list the log directory while rotating or sweeping
    #[error("Failed to list log directory {path}: {source}")]
    ListDirectory {
        /// The directory being listed
        path: PathBuf,
        /// The underlying error
        source: io::Error,
    },

    /// Failed to rotate log file
    #[error("Failed to rotate log file ({stage}) at {path}: {source}")]
    Rotation {
        /// Which step of the rotation failed
        stage: &'static str,
        /// The file the step operated on
        path: PathBuf,
        /// The underlying error
        source: io::Error,
    },

    /// Failed to compress a rotated backup
    #[error("Failed to compress backup {path}: {source}")]
    Compression {
        /// The uncompressed backup, left in place
        path: PathBuf,
        /// The underlying error
        source: io::Error,
    },

    /// Failed to delete an expired backup
    #[error("Failed to remove expired backup {path}: {source}")]
    Retention {
        /// The backup that could not be removed
        path: PathBuf,
        /// The underlying error
        source: io::Error,
    },

    /// The writer has not been configured, or has been closed
    #[error("Log writer is closed")]
    Closed,

    /// The writer lost its file and is waiting to be reconfigured
    #[error("No log file available")]
    NoFileAvailable,

    /// A record was emitted by the writer's own diagnostics while it held
    /// its lock on this thread
    #[error("Log writer re-entered from its own diagnostics")]
    Reentrant,
}

impl From<Error> for io::Error {
    fn from(error: Error) -> Self {
        match error {
            Error::Write(source) => source,
            other => Self::other(other),
        }
    }
}
