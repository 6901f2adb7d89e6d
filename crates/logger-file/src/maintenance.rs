//! Background compression and retention after a rotation

use crate::compress::Compressor;
use crate::reporter::ErrorSink;
use crate::retention::RetentionSweeper;

use std::path::PathBuf;
use std::sync::{Arc, mpsc};
use std::thread;

use tracing::{debug, error, warn};

/// Follow-up work for one rotated backup
#[derive(Debug)]
pub(crate) struct RotatedBackup {
    /// The freshly renamed backup
    pub(crate) path: PathBuf,
    /// Gzip the backup
    pub(crate) compress: bool,
    /// Sweep the backup's directory down to this many backups
    pub(crate) retention: Option<(RetentionSweeper, usize)>,
}

/// Commands for the maintenance thread
#[derive(Debug)]
enum MaintenanceCommand {
    Rotated(RotatedBackup),
    Sync(mpsc::Sender<()>),
    Shutdown,
}

/// Runs rotation follow-ups on a dedicated thread
///
/// Tasks are fire-and-forget: failures go to the [`ErrorSink`], never back
/// to a writer.
pub(crate) struct MaintenanceWorker {
    command_sender: mpsc::Sender<MaintenanceCommand>,
    worker_thread: Option<thread::JoinHandle<()>>,
}

impl MaintenanceWorker {
    /// Spawn the maintenance thread
    pub(crate) fn spawn(compressor: Compressor, sink: Arc<dyn ErrorSink>) -> Self {
        let (command_sender, command_receiver) = mpsc::channel();

        let worker_thread = thread::Builder::new()
            .name("log-maintenance".to_string())
            .spawn(move || run(&command_receiver, compressor, sink.as_ref()));

        let worker_thread = match worker_thread {
            Ok(handle) => Some(handle),
            Err(e) => {
                error!("Failed to spawn log maintenance thread: {}", e);
                None
            }
        };

        Self {
            command_sender,
            worker_thread,
        }
    }

    /// Queue follow-up work for a rotated backup
    pub(crate) fn submit(&self, task: RotatedBackup) {
        if self.worker_thread.is_none() {
            warn!(
                "Log maintenance unavailable, leaving {} as is",
                task.path.display()
            );
            return;
        }
        if let Err(e) = self.command_sender.send(MaintenanceCommand::Rotated(task)) {
            error!("Failed to queue log maintenance: {}", e);
        }
    }

    /// Block until every task submitted so far has finished
    pub(crate) fn sync(&self) {
        if self.worker_thread.is_none() {
            return;
        }
        let (ack_sender, ack_receiver) = mpsc::channel();
        if self
            .command_sender
            .send(MaintenanceCommand::Sync(ack_sender))
            .is_ok()
        {
            let _ = ack_receiver.recv();
        }
    }
}

impl Drop for MaintenanceWorker {
    fn drop(&mut self) {
        if let Some(handle) = self.worker_thread.take() {
            if let Err(e) = self.command_sender.send(MaintenanceCommand::Shutdown) {
                error!("Failed to send shutdown command during drop: {}", e);
            }
            if let Err(e) = handle.join() {
                error!("Failed to join log maintenance thread: {:?}", e);
            }
        }
    }
}

fn run(
    command_receiver: &mpsc::Receiver<MaintenanceCommand>,
    compressor: Compressor,
    sink: &dyn ErrorSink,
) {
    while let Ok(command) = command_receiver.recv() {
        match command {
            MaintenanceCommand::Rotated(task) => process(task, compressor, sink),
            MaintenanceCommand::Sync(ack) => {
                let _ = ack.send(());
            }
            MaintenanceCommand::Shutdown => {
                debug!("Shutting down log maintenance thread");
                break;
            }
        }
    }
}

fn process(task: RotatedBackup, compressor: Compressor, sink: &dyn ErrorSink) {
    if task.compress {
        if let Err(e) = compressor.compress(&task.path) {
            warn!("Keeping uncompressed backup {}", task.path.display());
            sink.report(&e);
        }
    }

    if let Some((sweeper, max_backups)) = task.retention {
        let directory = match task.path.parent() {
            Some(directory) => directory,
            None => return,
        };
        if let Err(e) = sweeper.sweep(directory, max_backups) {
            sink.report(&e);
        }
    }
}
