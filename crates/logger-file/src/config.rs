//! Rotation configuration

use crate::error::{Error, Result};

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// One kibibyte, for building size thresholds
pub const KB: u64 = 1 << 10;
/// One mebibyte
pub const MB: u64 = 1 << 20;
/// One gibibyte
pub const GB: u64 = 1 << 30;

/// Location of the live log file: always `directory/base_name`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTarget {
    /// Directory holding the live file and its backups
    pub directory: PathBuf,
    /// File name of the live file
    pub base_name: String,
}

impl FileTarget {
    /// Create a new target
    pub fn new(directory: impl Into<PathBuf>, base_name: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            base_name: base_name.into(),
        }
    }

    /// Path of the live log file
    pub fn live_path(&self) -> PathBuf {
        self.directory.join(&self.base_name)
    }

    /// Directory holding the live file
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn validate(&self) -> Result<()> {
        if self.directory.as_os_str().is_empty() {
            return Err(Error::Configuration(
                "log directory must not be empty".to_string(),
            ));
        }
        if self.base_name.is_empty() {
            return Err(Error::Configuration(
                "log file name must not be empty".to_string(),
            ));
        }
        if self.base_name.contains(['/', '\\']) {
            return Err(Error::Configuration(format!(
                "log file name must not contain a path separator: {}",
                self.base_name
            )));
        }
        Ok(())
    }
}

/// Calendar unit for time-based rotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// Rotate when the local hour changes
    Hour,
    /// Rotate when the local calendar day changes
    Day,
    /// Rotate when the local calendar month changes
    Month,
}

impl Granularity {
    /// `strftime` pattern used for backup suffixes
    pub const fn suffix_format(self) -> &'static str {
        match self {
            Self::Hour => "%Y%m%d%H",
            Self::Day => "%Y%m%d",
            Self::Month => "%Y%m",
        }
    }
}

/// When the live file should be rotated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RotationMode {
    /// Rotate once the file would reach `max_bytes`
    SizeBased {
        /// Size threshold in bytes
        max_bytes: u64,
    },
    /// Rotate on calendar boundaries
    TimeBased {
        /// Boundary unit
        granularity: Granularity,
    },
    /// Rotate on whichever of the two conditions triggers first
    Mixed {
        /// Size threshold in bytes
        max_bytes: u64,
        /// Boundary unit
        granularity: Granularity,
    },
}

impl RotationMode {
    /// Size threshold, if the mode has a size component
    pub const fn max_bytes(&self) -> Option<u64> {
        match self {
            Self::SizeBased { max_bytes } | Self::Mixed { max_bytes, .. } => Some(*max_bytes),
            Self::TimeBased { .. } => None,
        }
    }

    /// Calendar unit, if the mode has a time component
    pub const fn granularity(&self) -> Option<Granularity> {
        match self {
            Self::TimeBased { granularity } | Self::Mixed { granularity, .. } => {
                Some(*granularity)
            }
            Self::SizeBased { .. } => None,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.max_bytes() == Some(0) {
            return Err(Error::Configuration(
                "max_bytes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for RotationMode {
    fn default() -> Self {
        Self::TimeBased {
            granularity: Granularity::Day,
        }
    }
}

/// Background probe that rotates time-bucketed files during idle periods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdleProbe {
    /// Never probe; rotation happens on the next write only
    Disabled,
    /// Probe shortly after the top of every hour
    #[default]
    TopOfHour,
    /// Probe at a fixed interval
    Every(Duration),
}

/// Configuration for a rotating file logger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileLoggerConfig {
    /// Where the live file lives
    pub target: FileTarget,
    /// Rotation trigger
    pub mode: RotationMode,
    /// Number of backups to keep; zero keeps all of them
    pub max_backups: usize,
    /// Gzip backups after rotation
    pub compress: bool,
    /// Idle rotation probe, only armed for modes with a time component
    #[serde(default)]
    pub idle_probe: IdleProbe,
}

impl FileLoggerConfig {
    /// Create a configuration with no retention limit and no compression
    pub fn new(target: FileTarget, mode: RotationMode) -> Self {
        Self {
            target,
            mode,
            max_backups: 0,
            compress: false,
            idle_probe: IdleProbe::default(),
        }
    }

    /// Start building a configuration for `directory/base_name`
    pub fn builder(
        directory: impl Into<PathBuf>,
        base_name: impl Into<String>,
    ) -> FileLoggerConfigBuilder {
        FileLoggerConfigBuilder::new(FileTarget::new(directory, base_name))
    }

    /// Check the configuration for errors
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for an empty directory or file name,
    /// a file name containing a path separator, or a zero size threshold.
    pub fn validate(&self) -> Result<()> {
        self.target.validate()?;
        self.mode.validate()
    }

    /// Whether retention sweeps should run after rotation
    pub const fn retention_enabled(&self) -> bool {
        self.max_backups > 0
    }
}

/// Builder for [`FileLoggerConfig`]
#[derive(Debug, Clone)]
pub struct FileLoggerConfigBuilder {
    config: FileLoggerConfig,
}

impl FileLoggerConfigBuilder {
    fn new(target: FileTarget) -> Self {
        Self {
            config: FileLoggerConfig::new(target, RotationMode::default()),
        }
    }

    /// Rotate by size
    #[must_use]
    pub fn max_bytes(mut self, max_bytes: u64) -> Self {
        self.config.mode = RotationMode::SizeBased { max_bytes };
        self
    }

    /// Rotate by calendar boundary
    #[must_use]
    pub fn granularity(mut self, granularity: Granularity) -> Self {
        self.config.mode = RotationMode::TimeBased { granularity };
        self
    }

    /// Set the rotation mode directly
    #[must_use]
    pub fn mode(mut self, mode: RotationMode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Keep at most `max_backups` backups
    #[must_use]
    pub fn max_backups(mut self, max_backups: usize) -> Self {
        self.config.max_backups = max_backups;
        self
    }

    /// Gzip backups after rotation
    #[must_use]
    pub fn compress(mut self, compress: bool) -> Self {
        self.config.compress = compress;
        self
    }

    /// Configure the idle rotation probe
    #[must_use]
    pub fn idle_probe(mut self, idle_probe: IdleProbe) -> Self {
        self.config.idle_probe = idle_probe;
        self
    }

    /// Validate and build the configuration
    ///
    /// # Errors
    ///
    /// See [`FileLoggerConfig::validate`].
    pub fn build(self) -> Result<FileLoggerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
