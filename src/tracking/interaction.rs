//! Interaction level classification.
//!
//! Classifies each tick as Idle, Typing, Clicking or Passive from the
//! activity booleans the probe reports. Keyboard wins over mouse; either
//! stays sticky for a short recency window so a pause between keystrokes
//! does not flip the level.

use chrono::{DateTime, Utc};

use crate::models::InteractionLevel;

pub struct InteractionDetector {
    idle_threshold_secs: f64,
    interaction_threshold_secs: f64,
    last_typing: Option<DateTime<Utc>>,
    last_click: Option<DateTime<Utc>>,
}

impl InteractionDetector {
    pub fn new(idle_threshold_secs: f64, interaction_threshold_secs: f64) -> Self {
        Self {
            idle_threshold_secs,
            interaction_threshold_secs,
            last_typing: None,
            last_click: None,
        }
    }

    /// Classify the current tick. The recency timestamps are only updated
    /// when activity is actually observed, never on classification alone.
    pub fn classify(
        &mut self,
        idle_seconds: f64,
        keyboard_active: bool,
        mouse_active: bool,
        now: DateTime<Utc>,
    ) -> InteractionLevel {
        if idle_seconds >= self.idle_threshold_secs {
            return InteractionLevel::Idle;
        }

        if keyboard_active {
            self.last_typing = Some(now);
            return InteractionLevel::Typing;
        }

        if mouse_active {
            self.last_click = Some(now);
            return InteractionLevel::Clicking;
        }

        if self.within_window(self.last_typing, now) {
            return InteractionLevel::Typing;
        }

        if self.within_window(self.last_click, now) {
            return InteractionLevel::Clicking;
        }

        InteractionLevel::Passive
    }

    fn within_window(&self, last: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        last.map(|t| {
            let age = (now - t).num_milliseconds() as f64 / 1000.0;
            age < self.interaction_threshold_secs
        })
        .unwrap_or(false)
    }
}
