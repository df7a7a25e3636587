//! The polling loop that turns probe observations into activity events.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::TrackerConfig;
use crate::context::extract_context;
use crate::models::{ActivityState, TrackerEvent};
use crate::probes::SharedSystemProbe;
use crate::resources::{idle_poll_interval, should_throttle_polling, ResourceMonitor};

use super::finalizer::EventFinalizer;
use super::idle::IdleTracker;
use super::interaction::InteractionDetector;
use super::scheduler::ScreenshotScheduler;
use super::state_change::StateChangeDetector;
use super::transitions::TransitionHandler;

const ENABLE_LOGS: bool = true;

use crate::log_info;

/// One tracker session's loop state. Built by the controller, consumed by
/// [`TrackerLoop::run`].
pub(crate) struct TrackerLoop {
    pub(crate) probe: SharedSystemProbe,
    pub(crate) config: TrackerConfig,
    pub(crate) state_change: StateChangeDetector,
    pub(crate) idle: IdleTracker,
    pub(crate) interaction: InteractionDetector,
    pub(crate) finalizer: EventFinalizer,
    pub(crate) transitions: TransitionHandler,
    pub(crate) scheduler: Option<ScreenshotScheduler>,
    pub(crate) resources: ResourceMonitor,
    pub(crate) events: mpsc::Sender<TrackerEvent>,
    pub(crate) cancel: CancellationToken,
}

impl TrackerLoop {
    pub(crate) async fn run(mut self) {
        log_info!(
            "Tracker loop started (poll every {:.1}s)",
            self.config.poll_interval_secs
        );

        loop {
            let now = Utc::now();
            let Some(sleep_secs) = self.tick(now).await else {
                // Event receiver dropped; nobody is listening anymore
                log_info!("Tracker event channel closed, stopping loop");
                return;
            };

            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs_f64(sleep_secs)) => {}
                _ = self.cancel.cancelled() => {
                    log_info!("Tracker loop shutting down");
                    break;
                }
            }
        }

        self.finalize_open_span().await;
    }

    /// One observation cycle. Returns the seconds to sleep before the next
    /// tick, or `None` once the event channel is closed.
    async fn tick(&mut self, now: DateTime<Utc>) -> Option<f64> {
        let snapshot = self.probe.active_window();
        let idle_seconds = snapshot
            .as_ref()
            .map(|s| s.idle_seconds)
            .unwrap_or_else(|| self.probe.idle_seconds());
        let is_idle = idle_seconds >= self.config.idle_threshold_secs;

        // Resumption is emitted before the span for the new active state
        // starts, so consumers see idle end, then activity begin
        if let Some(resumption) = self.idle.update_idle_state(is_idle, idle_seconds, now) {
            if self
                .events
                .send(TrackerEvent::IdleResumption(resumption))
                .await
                .is_err()
            {
                return None;
            }
        }

        let is_locked_or_screensaver =
            self.probe.is_workstation_locked() || self.probe.is_screensaver_active();

        let interaction_level = self.interaction.classify(
            idle_seconds,
            self.probe.keyboard_activity(),
            self.probe.mouse_activity(),
            now,
        );

        let (app, title, context, cmdline) = match snapshot {
            Some(s) => {
                let context = s
                    .context
                    .or_else(|| extract_context(s.app.as_deref(), s.title.as_deref()));
                (s.app, s.title, context, s.cmdline)
            }
            None => (None, None, None, None),
        };

        let state = ActivityState {
            app,
            title,
            context,
            cmdline,
            is_idle,
            is_locked_or_screensaver,
            interaction_level,
        };

        if let Some(scheduler) = &mut self.scheduler {
            scheduler.maybe_submit(&state, idle_seconds);
        }

        self.state_change.log_lock_transitions(is_locked_or_screensaver);

        if self.state_change.has_changed(&state, now) {
            if let Some((prev, start)) = self.state_change.take_current() {
                if let Some(event) = self.finalizer.finalize(&prev, start, now, None) {
                    if self
                        .events
                        .send(TrackerEvent::Activity(event))
                        .await
                        .is_err()
                    {
                        return None;
                    }
                }
            }
            self.state_change.start_new_event(state.clone(), now);
        }

        self.transitions
            .check_for_transitions(&state, idle_seconds, now);
        self.transitions.update_previous_state(&state);

        let sample = self.resources.record().await;
        let base = if should_throttle_polling(&sample, self.resources.config()) {
            self.resources.config().throttled_poll_interval_secs
        } else {
            self.config.poll_interval_secs
        };

        Some(idle_poll_interval(
            idle_seconds,
            base,
            self.resources.config(),
        ))
    }

    /// On shutdown the open span is closed at the current instant so the
    /// timeline ends where tracking ended, not at the last state change.
    async fn finalize_open_span(&mut self) {
        let Some((state, start)) = self.state_change.take_current() else {
            return;
        };

        if let Some(event) = self.finalizer.finalize(&state, start, Utc::now(), None) {
            let _ = self.events.send(TrackerEvent::Activity(event)).await;
        }

        log_info!(
            "Tracker loop finished: {} events, {} flickers merged",
            self.finalizer.total_events(),
            self.state_change.merged_events()
        );
    }
}
