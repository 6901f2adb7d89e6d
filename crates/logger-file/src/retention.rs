//! Deletion of backups beyond the retention limit

use crate::error::{Error, Result};
use crate::naming::BackupPattern;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use parking_lot::Mutex;
use tracing::debug;

/// Serializes sweeps so two of them never act on the same listing
static SWEEP_LOCK: Mutex<()> = parking_lot::const_mutex(());

/// Keeps the `max_backups` most recent backups of one base name
#[derive(Debug, Clone)]
pub struct RetentionSweeper {
    pattern: BackupPattern,
}

impl RetentionSweeper {
    /// Sweeper for backups recognized by `pattern`
    pub const fn new(pattern: BackupPattern) -> Self {
        Self { pattern }
    }

    /// Delete the oldest backups in `directory` beyond `max_backups`
    ///
    /// Compressed and uncompressed backups count alike. Returns the removed
    /// paths; a second sweep with nothing new to remove is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ListDirectory`] if the directory cannot be read, or
    /// [`Error::Retention`] for the first backup that could not be removed.
    /// Removal continues past individual failures.
    pub fn sweep(&self, directory: &Path, max_backups: usize) -> Result<Vec<PathBuf>> {
        let _guard = SWEEP_LOCK.lock();

        let mut backups = self.list_backups(directory)?;
        if backups.len() <= max_backups {
            return Ok(Vec::new());
        }

        backups.sort_by(|a, b| a.modified.cmp(&b.modified).then(a.key.cmp(&b.key)));
        let excess = backups.len() - max_backups;

        let mut removed = Vec::with_capacity(excess);
        let mut first_error = None;
        for backup in backups.into_iter().take(excess) {
            match fs::remove_file(&backup.path) {
                Ok(()) => {
                    debug!("Removed expired backup {}", backup.path.display());
                    removed.push(backup.path);
                }
                Err(source) => {
                    if first_error.is_none() {
                        first_error = Some(Error::Retention {
                            path: backup.path,
                            source,
                        });
                    }
                }
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(removed),
        }
    }

    fn list_backups(&self, directory: &Path) -> Result<Vec<Backup>> {
        let list_error = |source| Error::ListDirectory {
            path: directory.to_path_buf(),
            source,
        };

        let mut backups = Vec::new();
        for entry in fs::read_dir(directory).map_err(list_error)? {
            let entry = entry.map_err(list_error)?;
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            let Some(key) = self.pattern.sort_key(&name) else {
                continue;
            };
            // Entries can vanish between listing and stat.
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }
            backups.push(Backup {
                path: entry.path(),
                modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                key,
            });
        }
        Ok(backups)
    }
}

struct Backup {
    path: PathBuf,
    modified: SystemTime,
    key: (u64, u64),
}
