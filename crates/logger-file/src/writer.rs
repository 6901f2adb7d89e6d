//! Rotating file writer
//!
//! [`RotatingWriter`] owns the live file of one log target. Ordinary writes
//! share a read lock and append through the same descriptor; a rotation takes
//! the write lock, so it never overlaps a write and every record lands whole
//! in either the old file or the new one.

use crate::clock::{Clock, SystemClock};
use crate::compress::Compressor;
use crate::config::FileLoggerConfig;
use crate::error::{Error, Result};
use crate::handle::FileHandle;
use crate::idle::IdleProbeHandle;
use crate::maintenance::{MaintenanceWorker, RotatedBackup};
use crate::naming::{BackupNamer, BackupPattern};
use crate::policy::{RotationPolicy, Trigger, local_from_unix};
use crate::reporter::{ErrorSink, TracingErrorSink};
use crate::retention::RetentionSweeper;
use crate::size::SizeCounter;

use std::cell::RefCell;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Weak};
use std::time::UNIX_EPOCH;

use chrono::{DateTime, Local};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

/// Seconds to wait before retrying a rotation that could not complete
const ROTATION_RETRY_SECS: i64 = 60;

thread_local! {
    /// Writers this thread is currently inside, by address; a writer may emit
    /// `tracing` events routed straight back to itself
    static ENTERED_WRITERS: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

/// Marks one writer as entered on the current thread
struct ReentrancyGuard {
    writer: usize,
}

impl ReentrancyGuard {
    fn enter(shared: &Shared) -> Result<Self> {
        let writer = std::ptr::from_ref(shared) as usize;
        ENTERED_WRITERS.with_borrow_mut(|entered| {
            if entered.contains(&writer) {
                return Err(Error::Reentrant);
            }
            entered.push(writer);
            Ok(Self { writer })
        })
    }
}

impl Drop for ReentrancyGuard {
    fn drop(&mut self) {
        ENTERED_WRITERS.with_borrow_mut(|entered| entered.retain(|w| *w != self.writer));
    }
}

/// Outcome of a rotation attempt that left the writer usable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rotation {
    Completed,
    /// The live file was kept; the next attempt waits for `retry_after`
    Deferred,
}

/// Lifecycle of a [`RotatingWriter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterStatus {
    /// Not configured, or closed
    Closed,
    /// Accepting writes
    Open,
    /// The live file could not be (re)opened; writes fail until reconfigured
    Degraded,
}

/// Mutable per-file state, replaced wholesale on reconfiguration
struct RotationState {
    current_size: SizeCounter,
    /// Unix seconds of the most recent write
    last_write: AtomicI64,
    open_handle: Option<FileHandle>,
    /// Unix seconds before which no rotation is attempted again
    retry_after: Option<i64>,
}

impl RotationState {
    fn last_write(&self, fallback: DateTime<Local>) -> DateTime<Local> {
        local_from_unix(self.last_write.load(Ordering::Acquire), fallback)
    }
}

/// A configured target together with its rotation state
struct ActiveTarget {
    config: FileLoggerConfig,
    policy: RotationPolicy,
    pattern: BackupPattern,
    state: RotationState,
}

impl ActiveTarget {
    fn trigger(&self, incoming: u64, now: &DateTime<Local>) -> Option<Trigger> {
        self.state.open_handle.as_ref()?;
        if let Some(retry_after) = self.state.retry_after {
            if now.timestamp() < retry_after {
                return None;
            }
        }
        let last_write = self.state.last_write(*now);
        self.policy.trigger(
            self.state.current_size.get(),
            &last_write,
            incoming,
            now,
        )
    }

    fn handle(&self) -> Result<&FileHandle> {
        self.state.open_handle.as_ref().ok_or(Error::NoFileAvailable)
    }
}

struct Shared {
    target: RwLock<Option<ActiveTarget>>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn ErrorSink>,
    maintenance: MaintenanceWorker,
}

/// Thread-safe rotating log file writer
///
/// Each call to [`write`](Self::write) should carry one complete,
/// already formatted record.
pub struct RotatingWriter {
    shared: Arc<Shared>,
    /// Held across configure/close so probe threads are swapped one at a time
    idle_probe: Mutex<Option<IdleProbeHandle>>,
}

impl RotatingWriter {
    /// Create an unconfigured writer using the wall clock and `tracing` for
    /// error reports
    pub fn new() -> Self {
        Self::with_parts(Arc::new(SystemClock), Arc::new(TracingErrorSink))
    }

    /// Create an unconfigured writer with an explicit clock and error sink
    pub fn with_parts(clock: Arc<dyn Clock>, sink: Arc<dyn ErrorSink>) -> Self {
        let maintenance = MaintenanceWorker::spawn(Compressor::default(), Arc::clone(&sink));
        Self {
            shared: Arc::new(Shared {
                target: RwLock::new(None),
                clock,
                sink,
                maintenance,
            }),
            idle_probe: Mutex::new(None),
        }
    }

    /// Create a writer and configure it in one step
    ///
    /// # Errors
    ///
    /// See [`configure`](Self::configure).
    pub fn open(config: FileLoggerConfig) -> Result<Self> {
        let writer = Self::new();
        writer.configure(config)?;
        Ok(writer)
    }

    /// (Re)initialize the writer for `config`, closing any open file
    ///
    /// An invalid configuration is rejected without touching the current
    /// state. If the live file cannot be opened the writer is left
    /// [`Degraded`](WriterStatus::Degraded) and the error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for invalid settings, or the error
    /// that prevented the live file from being opened.
    pub fn configure(&self, config: FileLoggerConfig) -> Result<()> {
        config.validate()?;
        let pattern = BackupPattern::new(&config.target.base_name)?;
        let guard = ReentrancyGuard::enter(&self.shared)?;

        let mut idle_probe = self.idle_probe.lock();
        // Joined before taking the target lock, which the probe also takes.
        idle_probe.take();

        let mut target = self.shared.target.write();
        if let Some(previous) = target.take() {
            close_handle(previous.state.open_handle);
        }

        let now = self.shared.clock.now();
        let live_path = config.target.live_path();
        let (state, result) = match FileHandle::open(&live_path) {
            Ok(handle) => {
                let (size, last_write) = reconcile(&handle, &now);
                let state = RotationState {
                    current_size: SizeCounter::new(size),
                    last_write: AtomicI64::new(last_write),
                    open_handle: Some(handle),
                    retry_after: None,
                };
                (state, Ok(()))
            }
            Err(e) => {
                let state = RotationState {
                    current_size: SizeCounter::new(0),
                    last_write: AtomicI64::new(now.timestamp()),
                    open_handle: None,
                    retry_after: None,
                };
                (state, Err(e))
            }
        };

        let opened = result.is_ok();
        let mode = config.mode;
        let schedule = config.idle_probe;
        *target = Some(ActiveTarget {
            policy: RotationPolicy::new(mode),
            pattern,
            config,
            state,
        });
        drop(target);

        if opened && mode.granularity().is_some() {
            let shared = Arc::downgrade(&self.shared);
            *idle_probe = IdleProbeHandle::spawn(schedule, Arc::clone(&self.shared.clock), move || {
                probe_idle(&shared)
            });
        }

        drop(guard);
        match &result {
            Ok(()) => info!("Logging to {} ({:?})", live_path.display(), mode),
            Err(e) => error!("Failed to open log file {}: {}", live_path.display(), e),
        }
        result
    }

    /// Append one record, rotating first if the policy requires it
    ///
    /// Returns the number of bytes written, which is always `buf.len()` on
    /// success.
    ///
    /// # Errors
    ///
    /// A rotation that fails while the live file stays usable does not fail
    /// the write: the record is appended to the live file, the error goes to
    /// the [`ErrorSink`], and rotation is retried after a back-off.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] before configuration or after
    /// [`close`](Self::close), [`Error::NoFileAvailable`] while degraded,
    /// the error that left the writer degraded if a rotation lost the live
    /// file, or [`Error::Write`].
    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        let _guard = ReentrancyGuard::enter(&self.shared)?;
        let now = self.shared.clock.now();
        let incoming = buf.len() as u64;

        let rotation_due = {
            let target = self.shared.target.read();
            let active = target.as_ref().ok_or(Error::Closed)?;
            active.handle()?;
            if buf.is_empty() {
                return Ok(0);
            }
            active.trigger(incoming, &now).is_some()
        };

        if rotation_due {
            let mut target = self.shared.target.write();
            let active = target.as_mut().ok_or(Error::Closed)?;
            // Another writer may have rotated while we waited for the lock.
            if let Some(trigger) = active.trigger(incoming, &now) {
                self.shared.rotate(active, trigger, &now)?;
            }
        }

        let target = self.shared.target.read();
        let active = target.as_ref().ok_or(Error::Closed)?;
        let written = active.handle()?.write(buf).map_err(Error::Write)?;
        active.state.current_size.add(written as u64);
        active
            .state
            .last_write
            .fetch_max(now.timestamp(), Ordering::AcqRel);
        Ok(written)
    }

    /// Flush and close the live file; the writer becomes
    /// [`Closed`](WriterStatus::Closed)
    ///
    /// Closing an already closed writer does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Write`] if the final flush to disk fails.
    pub fn close(&self) -> Result<()> {
        let mut idle_probe = self.idle_probe.lock();
        idle_probe.take();

        let Some(previous) = self.shared.target.write().take() else {
            return Ok(());
        };

        info!("Closing log file {}", previous.config.target.live_path().display());
        match previous.state.open_handle {
            Some(handle) => handle.close().map_err(Error::Write),
            None => Ok(()),
        }
    }

    /// Rotate now if the policy says a rotation is due, without writing
    ///
    /// Returns whether a rotation happened. A deferred rotation returns
    /// `false` and reports its error to the [`ErrorSink`].
    ///
    /// # Errors
    ///
    /// Returns the rotation error, if any.
    pub fn rotate_if_due(&self) -> Result<bool> {
        self.shared.rotate_if_due()
    }

    /// Wait until compression and retention work queued so far has finished
    pub fn sync_maintenance(&self) {
        self.shared.maintenance.sync();
    }

    /// Current lifecycle state
    pub fn status(&self) -> WriterStatus {
        match self.shared.target.read().as_ref() {
            None => WriterStatus::Closed,
            Some(active) if active.state.open_handle.is_some() => WriterStatus::Open,
            Some(_) => WriterStatus::Degraded,
        }
    }

    /// Bytes written to the live file since it was opened or last rotated
    pub fn current_size(&self) -> Option<u64> {
        self.shared
            .target
            .read()
            .as_ref()
            .map(|active| active.state.current_size.get())
    }

    /// Path of the live file, if configured
    pub fn live_path(&self) -> Option<PathBuf> {
        self.shared
            .target
            .read()
            .as_ref()
            .map(|active| active.config.target.live_path())
    }

    /// Active configuration, if any
    pub fn config(&self) -> Option<FileLoggerConfig> {
        self.shared
            .target
            .read()
            .as_ref()
            .map(|active| active.config.clone())
    }
}

impl Default for RotatingWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RotatingWriter {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            error!("Failed to close log file during drop: {}", e);
        }
    }
}

impl io::Write for &RotatingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        RotatingWriter::write(*self, buf).map_err(Into::into)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Write for RotatingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        RotatingWriter::write(self, buf).map_err(Into::into)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Shared {
    fn rotate_if_due(&self) -> Result<bool> {
        let _guard = ReentrancyGuard::enter(self)?;
        let now = self.clock.now();
        let mut target = self.target.write();
        let Some(active) = target.as_mut() else {
            return Ok(false);
        };
        match active.trigger(0, &now) {
            Some(trigger) => self
                .rotate(active, trigger, &now)
                .map(|rotation| rotation == Rotation::Completed),
            None => Ok(false),
        }
    }

    /// Close, rename, and reopen the live file. Caller holds the write lock.
    ///
    /// Fails only when the live file could not be reopened, which leaves the
    /// writer degraded.
    fn rotate(
        &self,
        active: &mut ActiveTarget,
        trigger: Trigger,
        now: &DateTime<Local>,
    ) -> Result<Rotation> {
        let config = &active.config;
        let live_path = config.target.live_path();
        let stamp = active.state.last_write(*now);

        // Named before anything is closed, so a failure leaves the file open.
        let namer = BackupNamer::new(&config.target, &active.pattern, config.compress);
        let backup_name = match namer.compute_name(config.mode, &stamp) {
            Ok(name) => name,
            Err(e) => {
                self.sink.report(&e);
                return Ok(defer(active, now));
            }
        };
        let backup_path = config.target.directory().join(&backup_name);

        debug!(
            "Rotating {} -> {} ({:?})",
            live_path.display(),
            backup_path.display(),
            trigger
        );

        close_handle(active.state.open_handle.take());

        if let Err(source) = fs::rename(&live_path, &backup_path) {
            let error = Error::Rotation {
                stage: "rename",
                path: live_path.clone(),
                source,
            };
            self.sink.report(&error);
            // Keep appending to the oversized file rather than lose records.
            reopen(active, &live_path)?;
            return Ok(defer(active, now));
        }

        if config.compress || config.retention_enabled() {
            let retention = config.retention_enabled().then(|| {
                (
                    RetentionSweeper::new(active.pattern.clone()),
                    config.max_backups,
                )
            });
            self.maintenance.submit(RotatedBackup {
                path: backup_path,
                compress: config.compress,
                retention,
            });
        }

        reopen(active, &live_path)?;
        active.state.current_size.reset();
        active.state.retry_after = None;
        active
            .state
            .last_write
            .store(now.timestamp(), Ordering::Release);
        Ok(Rotation::Completed)
    }
}

/// Give up on this rotation for now; the live file stays as it is
fn defer(active: &mut ActiveTarget, now: &DateTime<Local>) -> Rotation {
    warn!(
        "Rotation of {} deferred for {}s",
        active.config.target.live_path().display(),
        ROTATION_RETRY_SECS
    );
    active.state.retry_after = Some(now.timestamp() + ROTATION_RETRY_SECS);
    Rotation::Deferred
}

/// Open a fresh handle on the live path, or leave the writer degraded
fn reopen(active: &mut ActiveTarget, live_path: &Path) -> Result<()> {
    let handle = FileHandle::open(live_path).inspect_err(|e| {
        error!("Log file unavailable after rotation: {}", e);
    })?;
    active.state.open_handle = Some(handle);
    Ok(())
}

fn probe_idle(shared: &Weak<Shared>) -> bool {
    let Some(shared) = shared.upgrade() else {
        return false;
    };
    if let Err(e) = shared.rotate_if_due() {
        shared.sink.report(&e);
    }
    true
}

fn close_handle(handle: Option<FileHandle>) {
    if let Some(handle) = handle {
        let path = handle.path().to_path_buf();
        if let Err(e) = handle.close() {
            warn!("Failed to close log file {}: {}", path.display(), e);
        }
    }
}

/// On-disk size and effective last-write time of a freshly opened file
fn reconcile(handle: &FileHandle, now: &DateTime<Local>) -> (u64, i64) {
    match handle.stat() {
        Ok((0, _)) => (0, now.timestamp()),
        Ok((size, modified)) => {
            let modified = modified
                .duration_since(UNIX_EPOCH)
                .ok()
                .and_then(|d| i64::try_from(d.as_secs()).ok())
                .unwrap_or_else(|| now.timestamp());
            (size, modified)
        }
        Err(e) => {
            warn!("Failed to stat log file {}: {}", handle.path().display(), e);
            (0, now.timestamp())
        }
    }
}
