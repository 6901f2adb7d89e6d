//! Side channel for errors nobody is waiting on

use crate::error::Error;

use tracing::error;

/// Receives errors from background maintenance and failed rotations
pub trait ErrorSink: Send + Sync + 'static {
    /// Report an error; must not block for long or panic
    fn report(&self, error: &Error);
}

/// Reports errors as `tracing` events
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn report(&self, error: &Error) {
        error!("File logger error: {}", error);
    }
}

impl<F> ErrorSink for F
where
    F: Fn(&Error) + Send + Sync + 'static,
{
    fn report(&self, error: &Error) {
        self(error);
    }
}
