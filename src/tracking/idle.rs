//! Idle period tracking and resumption events.

use chrono::{DateTime, Utc};

use crate::models::IdleResumptionEvent;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

/// Detects idle→active transitions and emits a resumption event when the
/// idle period was long enough.
///
/// A "peak idle seconds" accumulator starts when idle begins and grows
/// monotonically while idle persists; it is what the resumption event
/// carries, and it always resets once the edge has been processed.
pub struct IdleTracker {
    minimum_idle_duration_secs: f64,
    resumption_cooldown_secs: f64,
    was_idle: bool,
    last_resumption: Option<DateTime<Utc>>,
    peak_idle_seconds: f64,
}

impl IdleTracker {
    pub fn new(minimum_idle_duration_secs: f64, resumption_cooldown_secs: f64) -> Self {
        Self {
            minimum_idle_duration_secs,
            resumption_cooldown_secs,
            was_idle: false,
            last_resumption: None,
            peak_idle_seconds: 0.0,
        }
    }

    /// Fold in this tick's idle observation. Returns a resumption event on
    /// the idle→active edge when the peak idle period met the minimum and
    /// the emission cooldown has elapsed.
    pub fn update_idle_state(
        &mut self,
        is_idle: bool,
        idle_seconds: f64,
        now: DateTime<Utc>,
    ) -> Option<IdleResumptionEvent> {
        let mut resumption = None;

        if self.was_idle && !is_idle {
            if self.peak_idle_seconds >= self.minimum_idle_duration_secs {
                let mut should_emit = true;
                if let Some(last) = self.last_resumption {
                    let since_last = (now - last).num_milliseconds() as f64 / 1000.0;
                    // Flaky idle detection can fire the edge repeatedly;
                    // suppress anything inside the cooldown
                    if since_last < self.resumption_cooldown_secs {
                        should_emit = false;
                        log_debug!(
                            "Suppressing duplicate resumption event (last: {since_last:.1}s ago)"
                        );
                    }
                }

                if should_emit {
                    log_info!(
                        "User resumed after {:.1} minutes idle",
                        self.peak_idle_seconds / 60.0
                    );
                    self.last_resumption = Some(now);
                    resumption = Some(IdleResumptionEvent {
                        resumption_timestamp: now,
                        idle_duration: self.peak_idle_seconds,
                    });
                }
            }

            // Peak resets whether or not an event went out
            self.peak_idle_seconds = 0.0;
        }

        if is_idle && !self.was_idle {
            self.peak_idle_seconds = idle_seconds;
            log_debug!("User went idle (idle_seconds={idle_seconds:.1}s)");
        } else if is_idle {
            self.peak_idle_seconds = self.peak_idle_seconds.max(idle_seconds);
        }

        self.was_idle = is_idle;
        resumption
    }
}
