//! The live file descriptor

use crate::error::{Error, Result};

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Open append-mode handle on the live log file
#[derive(Debug)]
pub struct FileHandle {
    file: File,
    path: PathBuf,
}

impl FileHandle {
    /// Open (creating if needed) the file at `path` for appending, creating
    /// its directory first
    ///
    /// # Errors
    ///
    /// Returns [`Error::CreateDirectory`] or [`Error::Open`].
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|source| Error::CreateDirectory {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| Error::Open {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Append one record
    ///
    /// Takes `&self`: append-mode writes through a shared handle never
    /// overwrite each other.
    pub fn write(&self, buf: &[u8]) -> io::Result<usize> {
        (&self.file).write_all(buf)?;
        Ok(buf.len())
    }

    /// Size and modification time as seen by the OS
    pub fn stat(&self) -> io::Result<(u64, SystemTime)> {
        let metadata = self.file.metadata()?;
        Ok((metadata.len(), metadata.modified()?))
    }

    /// Flush to disk and release the descriptor
    pub fn close(self) -> io::Result<()> {
        self.file.sync_all()
    }

    /// Path this handle was opened at
    pub fn path(&self) -> &Path {
        &self.path
    }
}
