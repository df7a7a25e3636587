pub mod event;
pub mod state;

pub use event::{ActivityEvent, EventState, IdleResumptionEvent, InteractionLevel, TrackerEvent};
pub use state::{ActivityState, WindowSnapshot};
