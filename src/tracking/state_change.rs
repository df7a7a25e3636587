//! State change detection and flicker merging.
//!
//! Owns the currently tracked span and decides when an observed state differs
//! enough to start a new one. Changes that revert within the merge threshold
//! are treated as accidental switches and folded into the current span.

use chrono::{DateTime, Utc};

use crate::models::ActivityState;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

pub struct StateChangeDetector {
    merge_threshold_secs: f64,
    current: Option<ActivityState>,
    span_start: Option<DateTime<Utc>>,
    merged_events: u64,
    was_locked: bool,
}

impl StateChangeDetector {
    pub fn new(merge_threshold_secs: f64) -> Self {
        Self {
            merge_threshold_secs,
            current: None,
            span_start: None,
            merged_events: 0,
            was_locked: false,
        }
    }

    /// Whether `new_state` differs enough from the tracked state to warrant a
    /// new span. A change observed less than `merge_threshold_secs` into the
    /// current span is counted as a merge and reported as "no change".
    pub fn has_changed(&mut self, new_state: &ActivityState, now: DateTime<Utc>) -> bool {
        let Some(current) = &self.current else {
            return true;
        };

        if current.same_span(new_state) {
            return false;
        }

        if let Some(start) = self.span_start {
            let elapsed = (now - start).num_milliseconds() as f64 / 1000.0;
            if elapsed < self.merge_threshold_secs {
                // Too quick, likely an accidental switch
                self.merged_events += 1;
                log_debug!(
                    "Merging flicker after {elapsed:.2}s (threshold {}s)",
                    self.merge_threshold_secs
                );
                return false;
            }
        }

        true
    }

    /// Replace the tracked span with a new one starting now.
    pub fn start_new_event(&mut self, state: ActivityState, now: DateTime<Utc>) {
        self.current = Some(state);
        self.span_start = Some(now);
    }

    /// The tracked span and its start time, if one is open.
    pub fn current(&self) -> Option<(&ActivityState, DateTime<Utc>)> {
        match (&self.current, self.span_start) {
            (Some(state), Some(start)) => Some((state, start)),
            _ => None,
        }
    }

    /// Drop the tracked span, returning what was open.
    pub fn take_current(&mut self) -> Option<(ActivityState, DateTime<Utc>)> {
        match (self.current.take(), self.span_start.take()) {
            (Some(state), Some(start)) => Some((state, start)),
            _ => None,
        }
    }

    /// Log lock/screensaver transitions once per edge, not every tick.
    pub fn log_lock_transitions(&mut self, is_locked_or_screensaver: bool) {
        if is_locked_or_screensaver && !self.was_locked {
            log_info!("Workstation locked/screensaver active, switching to Off state");
            self.was_locked = true;
        } else if !is_locked_or_screensaver && self.was_locked {
            log_info!("Workstation unlocked/screensaver deactivated, resuming tracking");
            self.was_locked = false;
        }
    }

    pub fn merged_events(&self) -> u64 {
        self.merged_events
    }
}
