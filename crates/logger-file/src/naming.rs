//! Backup file naming
//!
//! Backups live next to the live file and are named
//! `<stem>_<suffix>[_<n>]<extension>`, with `.gz` appended once compressed.
//! The suffix is either a calendar bucket (`20240101`) or a sequence number.

use crate::config::{FileTarget, RotationMode};
use crate::error::{Error, Result};
use crate::policy::bucket_suffix;

use std::fs;
use std::path::Path;

use chrono::{DateTime, Local};
use regex::Regex;

/// Extension appended to compressed backups
pub const GZ_EXTENSION: &str = ".gz";

/// Split `app.log` into `("app", ".log")`
///
/// A name without a dot, or whose only dot is the leading one, is all stem.
pub fn split_base_name(base_name: &str) -> (&str, &str) {
    match base_name.rfind('.') {
        Some(index) if index > 0 => base_name.split_at(index),
        _ => (base_name, ""),
    }
}

/// Recognizes the backups belonging to one base name
#[derive(Debug, Clone)]
pub struct BackupPattern {
    any: Regex,
    sequence: Regex,
}

impl BackupPattern {
    /// Build the matchers for `base_name`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the pattern cannot be compiled.
    pub fn new(base_name: &str) -> Result<Self> {
        let (stem, extension) = split_base_name(base_name);
        let stem = regex::escape(stem);
        let extension = regex::escape(extension);
        let gz = regex::escape(GZ_EXTENSION);

        let compile = |pattern: String| {
            Regex::new(&pattern).map_err(|e| Error::Configuration(e.to_string()))
        };

        Ok(Self {
            any: compile(format!(r"^{stem}_(\d+)(?:_(\d+))?{extension}(?:{gz})?$"))?,
            sequence: compile(format!(r"^{stem}_(\d+){extension}(?:{gz})?$"))?,
        })
    }

    /// Whether `file_name` is a backup of this base name, compressed or not
    pub fn matches(&self, file_name: &str) -> bool {
        self.any.is_match(file_name)
    }

    /// Whether `file_name` is a sequence-numbered backup (`stem_N.ext`)
    pub fn is_sequence(&self, file_name: &str) -> bool {
        self.sequence.is_match(file_name)
    }

    /// Numeric ordering key of a backup: its suffix and collision counter
    pub fn sort_key(&self, file_name: &str) -> Option<(u64, u64)> {
        let captures = self.any.captures(file_name)?;
        let suffix = captures.get(1)?.as_str().parse().unwrap_or(u64::MAX);
        let counter = captures
            .get(2)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0);
        Some((suffix, counter))
    }
}

/// Picks the next free backup name for a rotation
#[derive(Debug)]
pub struct BackupNamer<'a> {
    target: &'a FileTarget,
    pattern: &'a BackupPattern,
    compress: bool,
}

impl<'a> BackupNamer<'a> {
    /// Namer for `target`; `compress` also treats `.gz` siblings as taken
    pub const fn new(target: &'a FileTarget, pattern: &'a BackupPattern, compress: bool) -> Self {
        Self {
            target,
            pattern,
            compress,
        }
    }

    /// Compute a backup name that collides with nothing on disk
    ///
    /// Time-stamped modes name the backup after the bucket containing
    /// `stamp`; size-based mode numbers it after the existing backups.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ListDirectory`] if the directory cannot be listed.
    pub fn compute_name(&self, mode: RotationMode, stamp: &DateTime<Local>) -> Result<String> {
        let (stem, extension) = split_base_name(&self.target.base_name);

        match mode.granularity() {
            Some(granularity) => {
                let prefix = format!("{stem}_{}", bucket_suffix(granularity, stamp));
                let candidate = format!("{prefix}{extension}");
                if !self.is_taken(&candidate) {
                    return Ok(candidate);
                }
                Ok(self.probe(&prefix, extension, 1))
            }
            None => {
                let existing = self.count_sequence_backups()?;
                Ok(self.probe(stem, extension, existing + 1))
            }
        }
    }

    /// First `<prefix>_<n><extension>` not taken, counting up from `start`
    fn probe(&self, prefix: &str, extension: &str, start: u64) -> String {
        let mut n = start;
        loop {
            let candidate = format!("{prefix}_{n}{extension}");
            if !self.is_taken(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    fn count_sequence_backups(&self) -> Result<u64> {
        let directory = self.target.directory();
        let entries = fs::read_dir(directory).map_err(|source| Error::ListDirectory {
            path: directory.to_path_buf(),
            source,
        })?;

        let mut count = 0;
        for entry in entries {
            let entry = entry.map_err(|source| Error::ListDirectory {
                path: directory.to_path_buf(),
                source,
            })?;
            if let Some(name) = entry.file_name().to_str() {
                if self.pattern.is_sequence(name) {
                    count += 1;
                }
            }
        }
        Ok(count)
    }

    fn is_taken(&self, name: &str) -> bool {
        let directory = self.target.directory();
        exists(&directory.join(name))
            || (self.compress && exists(&directory.join(format!("{name}{GZ_EXTENSION}"))))
    }
}

fn exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}
