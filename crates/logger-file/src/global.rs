//! Optional process-wide writer
//!
//! The engine never reaches for this instance; it exists for applications
//! that want a single log file without threading a handle around.

use crate::error::{Error, Result};
use crate::writer::RotatingWriter;

use std::sync::OnceLock;

static GLOBAL_WRITER: OnceLock<RotatingWriter> = OnceLock::new();

/// Install `writer` as the process-wide writer
///
/// # Errors
///
/// Hands `writer` back if a global writer was already installed.
pub fn init(writer: RotatingWriter) -> std::result::Result<&'static RotatingWriter, RotatingWriter> {
    let mut pending = Some(writer);
    let installed = GLOBAL_WRITER.get_or_init(|| pending.take().unwrap_or_default());
    match pending {
        Some(rejected) => Err(rejected),
        None => Ok(installed),
    }
}

/// The process-wide writer, if installed
pub fn get() -> Option<&'static RotatingWriter> {
    GLOBAL_WRITER.get()
}

/// Write one record through the process-wide writer
///
/// # Errors
///
/// Returns [`Error::Closed`] if no global writer is installed, otherwise
/// whatever [`RotatingWriter::write`] returns.
pub fn write(buf: &[u8]) -> Result<usize> {
    get().ok_or(Error::Closed)?.write(buf)
}
