//! Task transition detection and prompt gating.
//!
//! Detects semantically meaningful switches (returning from a break,
//! drifting into the inbox, hopping through the file browser) and records
//! them through a callback. A user-facing prompt is additionally raised,
//! but only outside the prompt cooldown, and never while another prompt is
//! already on screen.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use chrono::{DateTime, Utc};

use crate::config::TransitionConfig;
use crate::models::ActivityState;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    IdleReturn,
    InboxBrowsing,
    ExplorerNavigation,
}

impl TransitionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionKind::IdleReturn => "idle_return",
            TransitionKind::InboxBrowsing => "inbox_browsing",
            TransitionKind::ExplorerNavigation => "explorer_navigation",
        }
    }
}

/// Record of a detected transition, passed to the record callback.
#[derive(Debug, Clone)]
pub struct TransitionRecord {
    pub timestamp: DateTime<Utc>,
    pub kind: TransitionKind,
    pub app: Option<String>,
    pub title: Option<String>,
}

pub type TransitionCallback = Arc<dyn Fn(TransitionRecord) + Send + Sync>;
pub type PromptFn = Arc<dyn Fn(TransitionKind, PromptToken) + Send + Sync>;

/// Caller-owned token gate ensuring at most one prompt is showing.
///
/// The gate is created by whoever owns the UI surface and handed into the
/// transition handler; the handler never consults ambient state to find out
/// whether a dialog is up.
#[derive(Clone, Default)]
pub struct PromptGate {
    showing: Arc<AtomicBool>,
}

impl PromptGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the gate. Returns a token that releases it on drop, or `None`
    /// if a prompt is already showing.
    pub fn try_begin(&self) -> Option<PromptToken> {
        if self
            .showing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            Some(PromptToken {
                showing: Arc::clone(&self.showing),
            })
        } else {
            None
        }
    }

    pub fn is_showing(&self) -> bool {
        self.showing.load(Ordering::Acquire)
    }
}

pub struct PromptToken {
    showing: Arc<AtomicBool>,
}

impl Drop for PromptToken {
    fn drop(&mut self) {
        self.showing.store(false, Ordering::Release);
    }
}

const INBOX_KEYWORDS: &[&str] = &["inbox", "- outlook", "mail"];
const EXPLORER_KEYWORDS: &[&str] = &["file explorer", "documents", "downloads"];
const FOCUSED_EDIT_APPS: &[&str] = &["winword.exe", "excel.exe", "acrord32.exe"];

/// Pattern detector over consecutive window observations.
pub struct TransitionDetector {
    idle_return_threshold_secs: f64,
}

impl TransitionDetector {
    pub fn new(idle_return_threshold_secs: f64) -> Self {
        Self {
            idle_return_threshold_secs,
        }
    }

    /// Classify the current observation against the previous one.
    pub fn detect(
        &self,
        app: Option<&str>,
        title: Option<&str>,
        prev_app: Option<&str>,
        prev_title: Option<&str>,
        idle_seconds: f64,
    ) -> Option<TransitionKind> {
        // Never interrupt sustained editing in a focused-edit app
        if let (Some(app), Some(prev_app)) = (app, prev_app) {
            let app_lower = app.to_ascii_lowercase();
            if FOCUSED_EDIT_APPS.contains(&app_lower.as_str())
                && prev_app.eq_ignore_ascii_case(app)
            {
                return None;
            }
        }

        if idle_seconds >= self.idle_return_threshold_secs {
            return Some(TransitionKind::IdleReturn);
        }

        if let Some(title) = title {
            let title_lower = title.to_ascii_lowercase();
            if INBOX_KEYWORDS.iter().any(|kw| title_lower.contains(kw)) {
                let prev_matches = prev_title
                    .map(|t| {
                        let t = t.to_ascii_lowercase();
                        INBOX_KEYWORDS.iter().any(|kw| t.contains(kw))
                    })
                    .unwrap_or(false);
                if prev_title.is_some() && !prev_matches {
                    return Some(TransitionKind::InboxBrowsing);
                }
            }

            if EXPLORER_KEYWORDS.iter().any(|kw| title_lower.contains(kw)) && prev_app != app {
                return Some(TransitionKind::ExplorerNavigation);
            }
        }

        None
    }
}

/// Applies cooldown and idle-deferral policy on top of the detector.
pub struct TransitionHandler {
    detector: TransitionDetector,
    config: TransitionConfig,
    record_callback: Option<TransitionCallback>,
    prompt: Option<PromptFn>,
    gate: PromptGate,
    prev_app: Option<String>,
    prev_title: Option<String>,
    last_prompt_time: Option<DateTime<Utc>>,
    deferred_prompt: Option<TransitionKind>,
    was_idle: bool,
}

impl TransitionHandler {
    pub fn new(
        config: TransitionConfig,
        gate: PromptGate,
        record_callback: Option<TransitionCallback>,
        prompt: Option<PromptFn>,
    ) -> Self {
        Self {
            detector: TransitionDetector::new(config.idle_return_threshold_secs),
            config,
            record_callback,
            prompt,
            gate,
            prev_app: None,
            prev_title: None,
            last_prompt_time: None,
            deferred_prompt: None,
            was_idle: false,
        }
    }

    /// Examine the current state for a transition. Records every detection;
    /// prompts only when the cooldown allows and the user is at the machine.
    pub fn check_for_transitions(
        &mut self,
        state: &ActivityState,
        idle_seconds: f64,
        now: DateTime<Utc>,
    ) {
        // A prompt deferred during idle fires once the user is back
        let is_currently_idle = idle_seconds >= self.config.prompt_idle_threshold_secs;
        let user_just_returned = self.was_idle && !is_currently_idle;
        self.was_idle = is_currently_idle;

        if user_just_returned {
            if let Some(kind) = self.deferred_prompt.take() {
                log_info!(
                    "User returned from idle, showing deferred prompt: {}",
                    kind.as_str()
                );
                self.try_show_prompt(kind, idle_seconds, now);
            }
        }

        let Some(kind) = self.detector.detect(
            state.app.as_deref(),
            state.title.as_deref(),
            self.prev_app.as_deref(),
            self.prev_title.as_deref(),
            idle_seconds,
        ) else {
            return;
        };

        log_info!("Transition detected: {}", kind.as_str());

        // Recorded regardless of prompt cooldown
        if let Some(callback) = &self.record_callback {
            callback(TransitionRecord {
                timestamp: now,
                kind,
                app: state.app.clone(),
                title: state.title.clone(),
            });
        }

        if let Some(last) = self.last_prompt_time {
            let since_last = (now - last).num_milliseconds() as f64 / 1000.0;
            if since_last < self.config.prompt_cooldown_secs {
                log_debug!("Skipping prompt due to cooldown");
                return;
            }
        }

        if self.config.prompt_enabled {
            self.try_show_prompt(kind, idle_seconds, now);
        }
    }

    /// Remember the observed state for the next tick's comparison.
    pub fn update_previous_state(&mut self, state: &ActivityState) {
        self.prev_app = state.app.clone();
        self.prev_title = state.title.clone();
    }

    fn try_show_prompt(&mut self, kind: TransitionKind, idle_seconds: f64, now: DateTime<Utc>) {
        let Some(prompt) = &self.prompt else {
            return;
        };

        if idle_seconds >= self.config.prompt_idle_threshold_secs {
            log_info!(
                "User is idle ({idle_seconds:.0}s), deferring prompt until return"
            );
            self.deferred_prompt = Some(kind);
            return;
        }

        let Some(token) = self.gate.try_begin() else {
            log_debug!("Prompt already showing, skipping new prompt");
            return;
        };

        prompt(kind, token);
        self.last_prompt_time = Some(now);
    }
}
