//! Idle-period rotation probe
//!
//! Rotation is normally decided lazily on the next write. For time-bucketed
//! modes this thread additionally pokes the writer now and then, so a file
//! that stops receiving writes still gets rotated once its bucket closes.

use crate::clock::Clock;
use crate::config::IdleProbe;
use crate::policy::next_top_of_hour;

use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;

use tracing::{debug, error};

/// Slack past the top of the hour so the probe lands in the new bucket
const TOP_OF_HOUR_SLACK: Duration = Duration::from_secs(1);

/// Fallback wait when the clock yields an unusable delay
const FALLBACK_WAIT: Duration = Duration::from_secs(60);

/// Running probe thread; stopped and joined on drop
pub(crate) struct IdleProbeHandle {
    stop_sender: mpsc::Sender<()>,
    probe_thread: Option<thread::JoinHandle<()>>,
}

impl IdleProbeHandle {
    /// Start probing on `schedule`
    ///
    /// `probe` returns `false` once there is nothing left to probe, which
    /// ends the thread. Returns `None` for [`IdleProbe::Disabled`].
    pub(crate) fn spawn<F>(schedule: IdleProbe, clock: Arc<dyn Clock>, probe: F) -> Option<Self>
    where
        F: Fn() -> bool + Send + 'static,
    {
        if schedule == IdleProbe::Disabled {
            return None;
        }

        let (stop_sender, stop_receiver) = mpsc::channel::<()>();

        let spawned = thread::Builder::new()
            .name("log-idle-probe".to_string())
            .spawn(move || {
                loop {
                    let wait = next_wait(schedule, clock.as_ref());
                    match stop_receiver.recv_timeout(wait) {
                        Err(mpsc::RecvTimeoutError::Timeout) => {
                            if !probe() {
                                break;
                            }
                        }
                        Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!("Idle rotation probe stopped");
            });

        match spawned {
            Ok(handle) => Some(Self {
                stop_sender,
                probe_thread: Some(handle),
            }),
            Err(e) => {
                error!("Failed to spawn idle rotation probe: {}", e);
                None
            }
        }
    }
}

impl Drop for IdleProbeHandle {
    fn drop(&mut self) {
        let _ = self.stop_sender.send(());
        if let Some(handle) = self.probe_thread.take() {
            if let Err(e) = handle.join() {
                error!("Failed to join idle rotation probe: {:?}", e);
            }
        }
    }
}

fn next_wait(schedule: IdleProbe, clock: &dyn Clock) -> Duration {
    match schedule {
        IdleProbe::Every(interval) => interval,
        IdleProbe::TopOfHour => {
            let now = clock.now();
            (next_top_of_hour(&now) - now)
                .to_std()
                .map_or(FALLBACK_WAIT, |wait| wait + TOP_OF_HOUR_SLACK)
        }
        IdleProbe::Disabled => FALLBACK_WAIT,
    }
}
