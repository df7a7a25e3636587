//! Action-triggered screenshot capture.
//!
//! Fires on user actions (click, enter, drag) supplied by an external event
//! source. Unlike the periodic worker there is no deduplication; instead a
//! throttle over a shared last-capture-time collapses near-simultaneous
//! actions, and at most two captures run concurrently.
//!
//! The foreground window handle is resolved inside `notify_action`, before
//! any task is spawned: by the time a worker runs, the foreground window may
//! already be a different one.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::{Duration, Instant};

use super::persistence::{resize_if_needed, save_jpeg, screenshot_path};
use super::worker::{InsertScreenshotFn, ScreenshotRecord};
use crate::config::ScreenshotConfig;
use crate::probes::{SharedCaptureProbe, SharedSystemProbe, WindowHandle};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

/// Concurrent captures allowed for action screenshots.
const ACTION_POOL_SIZE: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Click,
    Enter,
    Drag,
    Drop,
    Focus,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Click => "click",
            ActionKind::Enter => "enter",
            ActionKind::Drag => "drag",
            ActionKind::Drop => "drop",
            ActionKind::Focus => "focus",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionStatsSnapshot {
    pub triggered: u64,
    pub throttled: u64,
    pub saved: u64,
}

#[derive(Default)]
struct ActionStats {
    triggered: std::sync::atomic::AtomicU64,
    throttled: std::sync::atomic::AtomicU64,
    saved: std::sync::atomic::AtomicU64,
}

pub struct ActionScreenshotWorker {
    screenshot_dir: PathBuf,
    system: SharedSystemProbe,
    capture: SharedCaptureProbe,
    insert: InsertScreenshotFn,
    config: ScreenshotConfig,
    throttle_secs: f64,
    /// Shared last-capture-time; the throttle lock collapsing action bursts.
    last_capture: Arc<Mutex<Option<Instant>>>,
    pool: Arc<Semaphore>,
    stats: Arc<ActionStats>,
    enabled: bool,
}

impl ActionScreenshotWorker {
    pub fn new(
        screenshot_dir: PathBuf,
        system: SharedSystemProbe,
        capture: SharedCaptureProbe,
        insert: InsertScreenshotFn,
        config: ScreenshotConfig,
        throttle_secs: f64,
        enabled: bool,
    ) -> Self {
        if enabled {
            log_info!(
                "ActionScreenshotWorker initialized: {}",
                screenshot_dir.display()
            );
        } else {
            log_info!("ActionScreenshotWorker disabled");
        }

        Self {
            screenshot_dir,
            system,
            capture,
            insert,
            config,
            throttle_secs,
            last_capture: Arc::new(Mutex::new(None)),
            pool: Arc::new(Semaphore::new(ACTION_POOL_SIZE)),
            stats: Arc::new(ActionStats::default()),
            enabled,
        }
    }

    /// React to a user action. Resolves the foreground window now, applies
    /// the throttle, and spawns the capture if a pool slot is free.
    pub async fn notify_action(&self, action: ActionKind) {
        use std::sync::atomic::Ordering;

        if !self.enabled {
            return;
        }
        self.stats.triggered.fetch_add(1, Ordering::Relaxed);

        {
            let mut last = self.last_capture.lock().await;
            if let Some(previous) = *last {
                if previous.elapsed().as_secs_f64() < self.throttle_secs {
                    self.stats.throttled.fetch_add(1, Ordering::Relaxed);
                    log_debug!("Throttling {} screenshot", action.as_str());
                    return;
                }
            }
            *last = Some(Instant::now());
        }

        // Handle must come from the event moment, not the worker
        let Some(handle) = self.system.foreground_handle() else {
            log_warn!("No foreground window for {} screenshot", action.as_str());
            return;
        };

        let Ok(permit) = Arc::clone(&self.pool).try_acquire_owned() else {
            log_debug!("Action capture pool busy, dropping {}", action.as_str());
            return;
        };

        let capture = Arc::clone(&self.capture);
        let insert = Arc::clone(&self.insert);
        let stats = Arc::clone(&self.stats);
        let config = self.config.clone();
        let dir = self.screenshot_dir.clone();

        tokio::spawn(async move {
            let _permit = permit;
            if let Err(err) = capture_action(capture, insert, stats, config, dir, action, handle).await
            {
                log_error!("Action screenshot failed: {err:?}");
            }
        });
    }

    pub fn stats(&self) -> ActionStatsSnapshot {
        use std::sync::atomic::Ordering;
        ActionStatsSnapshot {
            triggered: self.stats.triggered.load(Ordering::Relaxed),
            throttled: self.stats.throttled.load(Ordering::Relaxed),
            saved: self.stats.saved.load(Ordering::Relaxed),
        }
    }
}

async fn capture_action(
    capture: SharedCaptureProbe,
    insert: InsertScreenshotFn,
    stats: Arc<ActionStats>,
    config: ScreenshotConfig,
    dir: PathBuf,
    action: ActionKind,
    handle: WindowHandle,
) -> Result<()> {
    let img = tokio::task::spawn_blocking(move || capture.capture_window(handle))
        .await
        .context("action capture worker join failed")?;

    let Some(img) = img else {
        log_warn!("Capture failed for {} action", action.as_str());
        return Ok(());
    };

    let img = resize_if_needed(img, config.max_dimension);
    let timestamp = Utc::now();
    let file_path = screenshot_path(&dir, timestamp, Some(action.as_str()));

    let quality = config.quality;
    let path_for_save = file_path.clone();
    tokio::task::spawn_blocking(move || save_jpeg(&img, &path_for_save, quality))
        .await
        .context("action save worker join failed")??;

    insert(ScreenshotRecord {
        captured_at: timestamp,
        file_path,
        app: None,
        title: None,
        dhash: None,
    });

    stats.saved.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    log_info!("Saved {} screenshot", action.as_str());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WindowSnapshot;
    use crate::probes::{CaptureProbe, SystemProbe};
    use image::RgbaImage;
    use std::sync::Mutex as StdMutex;

    struct FixedProbe;

    impl SystemProbe for FixedProbe {
        fn active_window(&self) -> Option<WindowSnapshot> {
            None
        }
        fn idle_seconds(&self) -> f64 {
            0.0
        }
        fn is_workstation_locked(&self) -> bool {
            false
        }
        fn is_screensaver_active(&self) -> bool {
            false
        }
        fn keyboard_activity(&self) -> bool {
            false
        }
        fn mouse_activity(&self) -> bool {
            false
        }
        fn foreground_handle(&self) -> Option<WindowHandle> {
            Some(WindowHandle(7))
        }
    }

    struct SolidCapture;

    impl CaptureProbe for SolidCapture {
        fn capture_window(&self, _handle: WindowHandle) -> Option<RgbaImage> {
            Some(RgbaImage::from_pixel(32, 32, image::Rgba([9, 9, 9, 255])))
        }
    }

    #[tokio::test]
    async fn burst_of_actions_is_throttled_to_one_capture() {
        let dir = tempfile::tempdir().unwrap();
        let records: Arc<StdMutex<Vec<ScreenshotRecord>>> = Arc::default();
        let sink = Arc::clone(&records);
        let insert: InsertScreenshotFn = Arc::new(move |record| {
            sink.lock().unwrap().push(record);
        });

        let worker = ActionScreenshotWorker::new(
            dir.path().to_path_buf(),
            Arc::new(FixedProbe),
            Arc::new(SolidCapture),
            insert,
            ScreenshotConfig::default(),
            0.5,
            true,
        );

        worker.notify_action(ActionKind::Click).await;
        worker.notify_action(ActionKind::Click).await;
        worker.notify_action(ActionKind::Enter).await;

        // Let the spawned capture finish
        tokio::time::sleep(Duration::from_millis(300)).await;

        let stats = worker.stats();
        assert_eq!(stats.triggered, 3);
        assert_eq!(stats.throttled, 2);
        assert_eq!(stats.saved, 1);

        let records = records.lock().unwrap();
        assert_eq!(records.len(), 1);
        // Action screenshots carry no hash: they are never deduplicated
        assert!(records[0].dhash.is_none());
    }

    #[tokio::test]
    async fn disabled_worker_ignores_actions() {
        let dir = tempfile::tempdir().unwrap();
        let insert: InsertScreenshotFn = Arc::new(|_| {});
        let worker = ActionScreenshotWorker::new(
            dir.path().to_path_buf(),
            Arc::new(FixedProbe),
            Arc::new(SolidCapture),
            insert,
            ScreenshotConfig::default(),
            0.5,
            false,
        );

        worker.notify_action(ActionKind::Click).await;
        assert_eq!(worker.stats().triggered, 0);
    }
}
