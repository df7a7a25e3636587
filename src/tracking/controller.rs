//! Tracker session lifecycle.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::WorklensConfig;
use crate::models::TrackerEvent;
use crate::probes::SharedSystemProbe;
use crate::resources::ResourceMonitor;
use crate::screenshot::ScreenshotWorker;

use super::finalizer::EventFinalizer;
use super::idle::IdleTracker;
use super::interaction::InteractionDetector;
use super::loop_worker::TrackerLoop;
use super::scheduler::ScreenshotScheduler;
use super::state_change::StateChangeDetector;
use super::transitions::{PromptFn, PromptGate, TransitionCallback, TransitionHandler};

const ENABLE_LOGS: bool = true;

use crate::log_info;

/// Everything a tracker session needs from its embedder.
pub struct TrackerParts {
    pub probe: SharedSystemProbe,
    pub config: WorklensConfig,
    pub resources: ResourceMonitor,
    /// Periodic screenshots are scheduled only when a worker is supplied.
    pub screenshot_worker: Option<Arc<ScreenshotWorker>>,
    pub transition_callback: Option<TransitionCallback>,
    pub prompt: Option<PromptFn>,
}

/// Owns the spawned tracker loop and its cancellation token.
pub struct TrackerController {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl TrackerController {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Spawn the tracker loop. The returned receiver yields activity spans
    /// and idle resumptions until `stop` is called or the loop exits.
    pub fn start(&mut self, parts: TrackerParts) -> Result<mpsc::Receiver<TrackerEvent>> {
        if self.handle.is_some() {
            bail!("tracker already running");
        }

        let tracker = parts.config.tracker;
        let (tx, rx) = mpsc::channel(64);
        let cancel_token = CancellationToken::new();

        let scheduler = parts.screenshot_worker.map(|worker| {
            ScreenshotScheduler::new(
                worker,
                Arc::clone(&parts.probe),
                tracker.screenshot_interval_secs,
            )
        });

        let loop_worker = TrackerLoop {
            probe: parts.probe,
            state_change: StateChangeDetector::new(tracker.merge_threshold_secs),
            idle: IdleTracker::new(
                tracker.minimum_idle_duration_secs,
                tracker.resumption_cooldown_secs,
            ),
            interaction: InteractionDetector::new(
                tracker.idle_threshold_secs,
                tracker.interaction_threshold_secs,
            ),
            finalizer: EventFinalizer::new(),
            transitions: TransitionHandler::new(
                parts.config.transitions,
                PromptGate::new(),
                parts.transition_callback,
                parts.prompt,
            ),
            scheduler,
            resources: parts.resources,
            config: tracker,
            events: tx,
            cancel: cancel_token.clone(),
        };

        let handle = tokio::spawn(loop_worker.run());

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        log_info!("Tracker started");
        Ok(rx)
    }

    /// Cancel the loop and wait for it to finish. The final open span is
    /// flushed to the event channel before the task exits.
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("tracker loop task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }
}

impl Default for TrackerController {
    fn default() -> Self {
        Self::new()
    }
}
