//! Activity tracking: the polling loop and its detectors.

mod controller;
mod finalizer;
mod idle;
mod interaction;
mod loop_worker;
mod scheduler;
mod state_change;
mod transitions;

pub use controller::{TrackerController, TrackerParts};
pub use finalizer::EventFinalizer;
pub use idle::IdleTracker;
pub use interaction::InteractionDetector;
pub use scheduler::ScreenshotScheduler;
pub use state_change::StateChangeDetector;
pub use transitions::{
    PromptFn, PromptGate, PromptToken, TransitionCallback, TransitionDetector, TransitionHandler,
    TransitionKind, TransitionRecord,
};
