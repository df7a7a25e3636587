//! OS probe trait seams.
//!
//! All platform-specific observation (foreground window, idle time, lock
//! state, input activity, pixel capture) sits behind these traits so the
//! tracking core can be driven by a real platform layer in production and a
//! scripted probe in tests. Probe failure is always absence: every call that
//! can fail returns `Option`/a safe default rather than an error.

use std::sync::Arc;

use image::RgbaImage;

use crate::models::WindowSnapshot;

/// Opaque platform window identifier (HWND, CGWindowID, X11 window, ...).
///
/// Captured at submission time, not at execution time: the foreground window
/// may change before a worker thread gets to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub u64);

/// Foreground window, idle and input observation.
pub trait SystemProbe: Send + Sync {
    /// Current foreground window, or `None` if it cannot be determined.
    fn active_window(&self) -> Option<WindowSnapshot>;

    /// Seconds since the last keyboard/mouse input.
    fn idle_seconds(&self) -> f64;

    fn is_workstation_locked(&self) -> bool;

    fn is_screensaver_active(&self) -> bool;

    /// Whether any key is currently pressed. Activity only, never content.
    fn keyboard_activity(&self) -> bool;

    /// Whether a mouse button is currently pressed.
    fn mouse_activity(&self) -> bool;

    /// Handle of the foreground window, for screenshot submission.
    fn foreground_handle(&self) -> Option<WindowHandle>;
}

/// Rasterizes a window into a bitmap.
pub trait CaptureProbe: Send + Sync {
    /// Capture the window's pixels, or `None` if the window is gone,
    /// minimized, or capture is otherwise unavailable.
    fn capture_window(&self, handle: WindowHandle) -> Option<RgbaImage>;
}

/// Battery reading from the platform power source, if one exists.
#[derive(Debug, Clone, Copy)]
pub struct BatteryReading {
    pub percent: f32,
    pub plugged: bool,
}

/// Battery observation for power-aware throttling.
pub trait PowerProbe: Send + Sync {
    /// Current battery state, or `None` on machines without a battery.
    fn battery(&self) -> Option<BatteryReading>;
}

/// Desktop default: no battery, never throttles on power.
pub struct NoBattery;

impl PowerProbe for NoBattery {
    fn battery(&self) -> Option<BatteryReading> {
        None
    }
}

pub type SharedSystemProbe = Arc<dyn SystemProbe>;
pub type SharedCaptureProbe = Arc<dyn CaptureProbe>;
pub type SharedPowerProbe = Arc<dyn PowerProbe>;
