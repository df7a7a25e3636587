//! Worklens: workstation activity tracking with screenshot deduplication.
//!
//! The tracker polls OS probes for the foreground window and input state,
//! folds the readings into contiguous activity spans, and streams finished
//! spans over a channel. Alongside it, a screenshot worker captures the
//! active window periodically and on notable user actions, using perceptual
//! hashing to avoid persisting near-identical frames.
//!
//! Platform specifics live behind the traits in [`probes`]; everything else
//! is portable and testable with scripted probes.

pub mod config;
pub mod context;
pub mod models;
pub mod probes;
pub mod resources;
pub mod screenshot;
pub mod tracking;
mod utils;

pub use config::{
    ConfigStore, ResourceConfig, ScreenshotConfig, TrackerConfig, TransitionConfig, WorklensConfig,
};
pub use models::{
    ActivityEvent, ActivityState, EventState, IdleResumptionEvent, InteractionLevel, TrackerEvent,
    WindowSnapshot,
};
pub use resources::ResourceMonitor;
pub use screenshot::{ActionKind, ActionScreenshotWorker, ScreenshotWorker};
pub use tracking::{TrackerController, TrackerParts};

/// Initialize logging (reads RUST_LOG env var). Call once at startup;
/// library tests and embedders that configure their own logger skip it.
pub fn init_logging() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
}
