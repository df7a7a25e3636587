//! Periodic screenshot scheduling inside the tracker loop.

use std::sync::Arc;

use chrono::Utc;
use tokio::time::Instant;

use crate::models::ActivityState;
use crate::probes::SharedSystemProbe;
use crate::screenshot::ScreenshotWorker;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

/// Elapsed-time gate that submits a capture request every
/// `interval_secs` of wall time, independent of the loop's poll cadence.
///
/// Submission is fire-and-forget: the worker owns dedup, persistence and
/// backpressure. The scheduler only decides *when* and snapshots *which
/// window* at that moment.
pub struct ScreenshotScheduler {
    worker: Arc<ScreenshotWorker>,
    probe: SharedSystemProbe,
    interval_secs: f64,
    last_submit: Option<Instant>,
    announced: bool,
}

impl ScreenshotScheduler {
    pub fn new(worker: Arc<ScreenshotWorker>, probe: SharedSystemProbe, interval_secs: f64) -> Self {
        Self {
            worker,
            probe,
            interval_secs,
            last_submit: None,
            announced: false,
        }
    }

    /// Called once per loop tick. Submits when the interval has elapsed
    /// since the previous submission (the first tick always submits).
    pub fn maybe_submit(&mut self, state: &ActivityState, idle_seconds: f64) {
        if !self.announced {
            self.announced = true;
            log_info!(
                "Screenshot scheduling active (every {:.0}s)",
                self.interval_secs
            );
        }

        if let Some(last) = self.last_submit {
            if last.elapsed().as_secs_f64() < self.interval_secs {
                return;
            }
        }
        self.last_submit = Some(Instant::now());

        // Resolve the window handle now, not in the worker: by the time the
        // request is processed the foreground window may have moved on.
        let Some(handle) = self.probe.foreground_handle() else {
            log_debug!("No foreground window handle, skipping screenshot submission");
            return;
        };

        self.worker.submit(
            handle,
            Utc::now(),
            state.app.clone(),
            state.title.clone(),
            idle_seconds,
        );
    }
}
