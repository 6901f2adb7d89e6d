//! `tracing-subscriber` integration
//!
//! Formatting is left to a `fmt` layer; each formatted event reaches the
//! writer as one `write` call.

use crate::writer::RotatingWriter;

use std::sync::Arc;

use tracing::Subscriber;
use tracing_subscriber::Layer;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::registry::LookupSpan;

impl<'a> MakeWriter<'a> for RotatingWriter {
    type Writer = &'a RotatingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self
    }
}

/// A plain-text `fmt` layer appending to `writer`
pub fn file_layer<S>(writer: Arc<RotatingWriter>) -> impl Layer<S> + Send + Sync
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
}
