//! Span finalization into activity events.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{ActivityEvent, ActivityState, EventState};

/// Minimum meaningful span length; anything shorter is dropped.
const MIN_EVENT_DURATION_SECS: f64 = 0.5;

/// Converts an in-flight span into a finished, timestamped record.
pub struct EventFinalizer {
    total_events: u64,
}

impl EventFinalizer {
    pub fn new() -> Self {
        Self { total_events: 0 }
    }

    /// Finalize a span that started at `start`. Returns `None` for spans
    /// shorter than the minimum granularity.
    ///
    /// The emitted state is derived with priority Off > Inactive > Active.
    pub fn finalize(
        &mut self,
        state: &ActivityState,
        start: DateTime<Utc>,
        now: DateTime<Utc>,
        metadata: Option<HashMap<String, String>>,
    ) -> Option<ActivityEvent> {
        let duration = (now - start).num_milliseconds() as f64 / 1000.0;
        if duration < MIN_EVENT_DURATION_SECS {
            return None;
        }

        let event_state = if state.is_locked_or_screensaver {
            EventState::Off
        } else if state.is_idle {
            EventState::Inactive
        } else {
            EventState::Active
        };

        self.total_events += 1;

        Some(ActivityEvent {
            id: Uuid::new_v4(),
            start_time: start,
            end_time: now,
            duration_seconds: (duration * 100.0).round() / 100.0,
            app: state.app.clone(),
            title: state.title.clone(),
            context: state.context.clone(),
            cmdline: state.cmdline.clone(),
            is_idle: state.is_idle,
            state: event_state,
            interaction_level: state.interaction_level,
            metadata,
        })
    }

    pub fn total_events(&self) -> u64 {
        self.total_events
    }
}

impl Default for EventFinalizer {
    fn default() -> Self {
        Self::new()
    }
}
