//! Finalized event data models.
//!
//! Represents the immutable records emitted by the tracker loop once a span
//! of activity has ended or the user has resumed from a long idle period.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Derived state of a finalized span.
///
/// Priority when deriving: `Off` (locked/screensaver) > `Inactive` (idle) > `Active`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum EventState {
    Active,
    Inactive,
    Off,
}

impl EventState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventState::Active => "Active",
            EventState::Inactive => "Inactive",
            EventState::Off => "Off",
        }
    }
}

/// Classified level of user interaction during a span.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum InteractionLevel {
    Idle,
    Typing,
    Clicking,
    Passive,
}

impl InteractionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionLevel::Idle => "Idle",
            InteractionLevel::Typing => "Typing",
            InteractionLevel::Clicking => "Clicking",
            InteractionLevel::Passive => "Passive",
        }
    }
}

/// A single finalized activity span, ready for storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEvent {
    pub id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Rounded to two decimal places; always >= 0.5 for emitted events.
    pub duration_seconds: f64,
    pub app: Option<String>,
    pub title: Option<String>,
    /// Extracted context (URL, mail subject, or file path).
    pub context: Option<String>,
    /// Redacted process command line, when available.
    pub cmdline: Option<Vec<String>>,
    pub is_idle: bool,
    pub state: EventState,
    pub interaction_level: InteractionLevel,
    /// Optional externally-supplied metadata (UI automation context).
    pub metadata: Option<HashMap<String, String>>,
}

/// Emitted when the user resumes work after a significant idle period.
///
/// At most one per idle period, and never more often than the resumption
/// cooldown, to keep flaky idle detection from firing duplicates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdleResumptionEvent {
    pub resumption_timestamp: DateTime<Utc>,
    /// Peak idle seconds observed during the idle period.
    pub idle_duration: f64,
}

/// Output item of the tracker loop event stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum TrackerEvent {
    Activity(ActivityEvent),
    IdleResumption(IdleResumptionEvent),
}
