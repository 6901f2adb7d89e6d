//! Gzip compression of rotated backups

use crate::error::{Error, Result};
use crate::naming::GZ_EXTENSION;

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::{Compression, GzBuilder};
use tracing::{debug, warn};

/// Streams a backup into a `.gz` sibling
#[derive(Debug, Clone, Copy)]
pub struct Compressor {
    level: Compression,
}

impl Compressor {
    /// Compressor using the given gzip level
    pub const fn new(level: Compression) -> Self {
        Self { level }
    }

    /// Compress `source` into `source.gz` and remove `source`
    ///
    /// The uncompressed file is only removed once the archive is complete;
    /// on failure any partial archive is deleted and `source` is left alone.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Compression`] if reading, encoding, or writing fails.
    pub fn compress(&self, source: &Path) -> Result<PathBuf> {
        let mut archive = source.as_os_str().to_owned();
        archive.push(GZ_EXTENSION);
        let archive = PathBuf::from(archive);

        if let Err(source_error) = self.encode(source, &archive) {
            if let Err(e) = fs::remove_file(&archive) {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!("Failed to remove partial archive {}: {}", archive.display(), e);
                }
            }
            return Err(Error::Compression {
                path: source.to_path_buf(),
                source: source_error,
            });
        }

        fs::remove_file(source).map_err(|e| Error::Compression {
            path: source.to_path_buf(),
            source: e,
        })?;

        debug!("Compressed {} -> {}", source.display(), archive.display());
        Ok(archive)
    }

    fn encode(&self, source: &Path, archive: &Path) -> io::Result<()> {
        let mut input = BufReader::new(File::open(source)?);

        let mut builder = GzBuilder::new();
        if let Some(name) = source.file_name().and_then(|n| n.to_str()) {
            builder = builder.filename(name);
        }

        let output = BufWriter::new(File::create(archive)?);
        let mut encoder = builder.write(output, self.level);
        io::copy(&mut input, &mut encoder)?;

        let mut output = encoder.finish()?;
        output.flush()?;
        output.get_ref().sync_all()
    }
}

impl Default for Compressor {
    fn default() -> Self {
        Self::new(Compression::default())
    }
}
