pub mod action_worker;
pub mod comparison;
pub mod persistence;
pub mod phash;
pub mod worker;

pub use action_worker::{ActionKind, ActionScreenshotWorker, ActionStatsSnapshot};
pub use comparison::{ComparisonResult, ScreenshotAction, ScreenshotMetadata};
pub use worker::{InsertScreenshotFn, ScreenshotRecord, ScreenshotWorker, WorkerStatsSnapshot};
