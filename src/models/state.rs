//! In-flight tracking state.
//!
//! `WindowSnapshot` is what the probe reports each poll tick; `ActivityState`
//! is the candidate span assembled from it. The state change detector owns
//! exactly one `ActivityState` at a time and replaces it (never mutates it)
//! when a new span starts.

use serde::{Deserialize, Serialize};

use super::event::InteractionLevel;

/// Raw observation of the foreground window at one poll tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowSnapshot {
    /// Application identifier (executable name or bundle id).
    pub app: Option<String>,
    pub title: Option<String>,
    /// Extracted context (URL, mail subject, or file path).
    pub context: Option<String>,
    /// Redacted process command line, when available.
    pub cmdline: Option<Vec<String>>,
    /// Idle seconds at sample time.
    pub idle_seconds: f64,
}

/// The currently tracked span of unchanged activity.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityState {
    pub app: Option<String>,
    pub title: Option<String>,
    pub context: Option<String>,
    pub cmdline: Option<Vec<String>>,
    pub is_idle: bool,
    pub is_locked_or_screensaver: bool,
    pub interaction_level: InteractionLevel,
}

impl ActivityState {
    /// Span-boundary comparison: app, title, idle flag, lock flag.
    /// Context and interaction level changes alone do not end a span.
    pub fn same_span(&self, other: &ActivityState) -> bool {
        self.app == other.app
            && self.title == other.title
            && self.is_idle == other.is_idle
            && self.is_locked_or_screensaver == other.is_locked_or_screensaver
    }
}
