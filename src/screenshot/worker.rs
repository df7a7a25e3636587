//! Asynchronous screenshot capture worker.
//!
//! A single worker task behind a bounded channel: `submit` never blocks the
//! poll loop, and with one worker captures are ordered and non-overlapping,
//! so the retained "last screenshot" state has exactly one writer. Each unit
//! of work runs capture -> compare -> save-new-or-overwrite -> insert record.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use image::RgbaImage;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use super::comparison::{
    compare_screenshots, PixelSamples, ScreenshotAction, ScreenshotMetadata,
};
use super::persistence::{resize_if_needed, save_jpeg, screenshot_path};
use super::phash::compute_dhash;
use crate::config::ScreenshotConfig;
use crate::probes::{SharedCaptureProbe, WindowHandle};
use crate::resources::ResourceMonitor;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

/// Window dimensions past this are treated as malformed capture targets.
const MAX_CAPTURE_DIMENSION: u32 = 10_000;

/// Queue depth for pending capture requests.
const SUBMIT_QUEUE_DEPTH: usize = 8;

/// Pixel tolerance for the pre-hash fast path.
const QUICK_CHECK_TOLERANCE: u8 = 10;

/// Record handed to the insert callback for each newly saved screenshot.
#[derive(Debug, Clone)]
pub struct ScreenshotRecord {
    pub captured_at: DateTime<Utc>,
    pub file_path: PathBuf,
    pub app: Option<String>,
    pub title: Option<String>,
    /// Absent for action screenshots, which are not deduplicated.
    pub dhash: Option<String>,
}

pub type InsertScreenshotFn = Arc<dyn Fn(ScreenshotRecord) + Send + Sync>;

#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerStatsSnapshot {
    pub submitted: u64,
    pub captured: u64,
    pub saved: u64,
    pub overwritten: u64,
    pub skipped: u64,
}

#[derive(Default)]
pub(crate) struct WorkerStats {
    submitted: AtomicU64,
    captured: AtomicU64,
    saved: AtomicU64,
    overwritten: AtomicU64,
    skipped: AtomicU64,
}

impl WorkerStats {
    pub(crate) fn snapshot(&self) -> WorkerStatsSnapshot {
        WorkerStatsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            captured: self.captured.load(Ordering::Relaxed),
            saved: self.saved.load(Ordering::Relaxed),
            overwritten: self.overwritten.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn skip(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }
}

struct CaptureRequest {
    handle: WindowHandle,
    timestamp: DateTime<Utc>,
    app: Option<String>,
    title: Option<String>,
    idle_seconds: f64,
}

/// State retained between captures; touched only by the worker task.
struct LastScreenshot {
    metadata: ScreenshotMetadata,
    samples: PixelSamples,
    saved_at: Instant,
}

pub struct ScreenshotWorker {
    tx: std::sync::Mutex<Option<mpsc::Sender<CaptureRequest>>>,
    handle: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
    stats: Arc<WorkerStats>,
}

impl ScreenshotWorker {
    pub fn new(
        screenshot_dir: PathBuf,
        capture: SharedCaptureProbe,
        insert: InsertScreenshotFn,
        config: ScreenshotConfig,
        resources: Option<ResourceMonitor>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(SUBMIT_QUEUE_DEPTH);
        let cancel = CancellationToken::new();
        let stats = Arc::new(WorkerStats::default());

        let task = WorkerTask {
            rx,
            cancel: cancel.clone(),
            stats: Arc::clone(&stats),
            screenshot_dir,
            capture,
            insert,
            config,
            resources,
            last: None,
        };
        let handle = tokio::spawn(task.run());

        Self {
            tx: std::sync::Mutex::new(Some(tx)),
            handle: tokio::sync::Mutex::new(Some(handle)),
            cancel,
            stats,
        }
    }

    /// Enqueue a capture request. Never blocks; a full queue counts as a skip.
    pub fn submit(
        &self,
        handle: WindowHandle,
        timestamp: DateTime<Utc>,
        app: Option<String>,
        title: Option<String>,
        idle_seconds: f64,
    ) {
        let submitted = self.stats.submitted.fetch_add(1, Ordering::Relaxed) + 1;
        log_debug!("Screenshot submitted #{submitted} for {app:?}");

        let guard = self.tx.lock().unwrap();
        let Some(tx) = guard.as_ref() else {
            self.stats.skip();
            return;
        };

        let request = CaptureRequest {
            handle,
            timestamp,
            app,
            title,
            idle_seconds,
        };
        if let Err(err) = tx.try_send(request) {
            self.stats.skip();
            log_warn!("Screenshot queue rejected request: {err}");
        }
    }

    pub fn stats(&self) -> WorkerStatsSnapshot {
        self.stats.snapshot()
    }

    /// Stop the worker. With `wait`, pending requests drain first; without,
    /// outstanding work is cancelled. Either way waits at most `timeout`.
    pub async fn shutdown(&self, wait: bool, timeout: Duration) {
        let stats = self.stats.snapshot();
        log_info!(
            "ScreenshotWorker shutting down. Stats: submitted={}, captured={}, saved={}, overwritten={}, skipped={}",
            stats.submitted,
            stats.captured,
            stats.saved,
            stats.overwritten,
            stats.skipped
        );

        // Closing the channel lets the worker drain and exit on its own
        self.tx.lock().unwrap().take();
        if !wait {
            self.cancel.cancel();
        }

        if let Some(handle) = self.handle.lock().await.take() {
            if tokio::time::timeout(timeout, handle).await.is_err() {
                log_warn!("Screenshot worker did not stop within {timeout:?}, cancelling");
                self.cancel.cancel();
            }
        }
    }
}

struct WorkerTask {
    rx: mpsc::Receiver<CaptureRequest>,
    cancel: CancellationToken,
    stats: Arc<WorkerStats>,
    screenshot_dir: PathBuf,
    capture: SharedCaptureProbe,
    insert: InsertScreenshotFn,
    config: ScreenshotConfig,
    resources: Option<ResourceMonitor>,
    last: Option<LastScreenshot>,
}

impl WorkerTask {
    async fn run(mut self) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    log_info!("Screenshot worker cancelled");
                    break;
                }
                request = self.rx.recv() => {
                    let Some(request) = request else { break };
                    if let Err(err) = self.process(request).await {
                        log_error!("Screenshot capture failed: {err:?}");
                    }
                }
            }
        }
    }

    async fn process(&mut self, request: CaptureRequest) -> Result<()> {
        if request.idle_seconds > self.config.idle_skip_secs {
            log_debug!("Skipping screenshot: idle {:.0}s", request.idle_seconds);
            self.stats.skip();
            return Ok(());
        }

        if let Some(resources) = &self.resources {
            if resources.should_skip_screenshot().await {
                log_debug!("Skipping screenshot: resource constraints");
                self.stats.skip();
                return Ok(());
            }
        }

        if let Some(app) = &request.app {
            if self.config.skip_apps.iter().any(|skip| skip == app) {
                log_debug!("Skipping screenshot: {app}");
                self.stats.skip();
                return Ok(());
            }
        }

        let capture = Arc::clone(&self.capture);
        let window = request.handle;
        let img = tokio::task::spawn_blocking(move || capture.capture_window(window))
            .await
            .context("screenshot capture worker join failed")?;

        let Some(img) = img else {
            log_info!("Screenshot capture failed for {:?} (window issue)", request.app);
            self.stats.skip();
            return Ok(());
        };

        let (width, height) = img.dimensions();
        if width == 0 || height == 0 || width > MAX_CAPTURE_DIMENSION || height > MAX_CAPTURE_DIMENSION
        {
            log_warn!("Rejecting malformed capture: {width}x{height}");
            self.stats.skip();
            return Ok(());
        }

        self.stats.captured.fetch_add(1, Ordering::Relaxed);
        log_debug!("Screenshot captured ({width}x{height})");

        let img = resize_if_needed(img, self.config.max_dimension);

        // Fast path: five sampled pixels before any hashing
        if let Some(last) = &self.last {
            if last.samples.matches(&img, QUICK_CHECK_TOLERANCE) {
                return self.overwrite(img, request.timestamp, None).await;
            }
        }

        let hash_input = img.clone();
        let current_hash = tokio::task::spawn_blocking(move || compute_dhash(&hash_input))
            .await
            .context("phash worker join failed")?;

        let seconds_since_save = self
            .last
            .as_ref()
            .map(|last| last.saved_at.elapsed().as_secs_f64())
            .unwrap_or(f64::MAX);

        let result = compare_screenshots(
            &current_hash,
            self.last.as_ref().map(|last| &last.metadata),
            request.app.as_deref(),
            request.title.as_deref(),
            seconds_since_save,
            &self.config,
        );

        match result.action {
            ScreenshotAction::Overwrite => {
                self.overwrite(img, request.timestamp, Some(current_hash)).await
            }
            ScreenshotAction::SaveNew => {
                self.save_new(img, request.timestamp, request.app, request.title, current_hash)
                    .await
            }
        }
    }

    async fn save_new(
        &mut self,
        img: RgbaImage,
        timestamp: DateTime<Utc>,
        app: Option<String>,
        title: Option<String>,
        dhash: String,
    ) -> Result<()> {
        let file_path = screenshot_path(&self.screenshot_dir, timestamp, app.as_deref());

        let samples = PixelSamples::from_image(&img);
        let quality = self.config.quality;
        let path_for_save = file_path.clone();
        tokio::task::spawn_blocking(move || save_jpeg(&img, &path_for_save, quality))
            .await
            .context("screenshot save worker join failed")??;

        self.last = Some(LastScreenshot {
            metadata: ScreenshotMetadata {
                file_path: file_path.clone(),
                dhash: dhash.clone(),
                captured_at: timestamp,
                app: app.clone(),
                title: title.clone(),
            },
            samples,
            saved_at: Instant::now(),
        });

        (self.insert)(ScreenshotRecord {
            captured_at: timestamp,
            file_path: file_path.clone(),
            app,
            title,
            dhash: Some(dhash),
        });

        self.stats.saved.fetch_add(1, Ordering::Relaxed);
        log_info!("Saved new screenshot: {}", file_path.display());
        Ok(())
    }

    async fn overwrite(
        &mut self,
        img: RgbaImage,
        timestamp: DateTime<Utc>,
        dhash: Option<String>,
    ) -> Result<()> {
        let Some(last) = &mut self.last else {
            log_warn!("No previous screenshot to overwrite");
            return Ok(());
        };

        let file_path = last.metadata.file_path.clone();
        let samples = PixelSamples::from_image(&img);
        let quality = self.config.quality;
        let path_for_save = file_path.clone();
        tokio::task::spawn_blocking(move || save_jpeg(&img, &path_for_save, quality))
            .await
            .context("screenshot save worker join failed")??;

        // Only the hash and timestamp move; the file reference stays put
        if let Some(dhash) = dhash {
            last.metadata.dhash = dhash;
        }
        last.metadata.captured_at = timestamp;
        last.samples = samples;

        self.stats.overwritten.fetch_add(1, Ordering::Relaxed);
        log_info!(
            "Overwritten screenshot: {}",
            file_path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probes::CaptureProbe;
    use std::sync::Mutex;

    struct FakeCapture {
        frames: Mutex<Vec<Option<RgbaImage>>>,
    }

    impl FakeCapture {
        fn new(frames: Vec<Option<RgbaImage>>) -> Self {
            Self {
                frames: Mutex::new(frames),
            }
        }
    }

    impl CaptureProbe for FakeCapture {
        fn capture_window(&self, _handle: WindowHandle) -> Option<RgbaImage> {
            let mut frames = self.frames.lock().unwrap();
            if frames.is_empty() {
                None
            } else {
                frames.remove(0)
            }
        }
    }

    fn solid(rgba: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(64, 64, image::Rgba(rgba))
    }

    fn recording_insert() -> (InsertScreenshotFn, Arc<Mutex<Vec<ScreenshotRecord>>>) {
        let records: Arc<Mutex<Vec<ScreenshotRecord>>> = Arc::default();
        let sink = Arc::clone(&records);
        let insert: InsertScreenshotFn = Arc::new(move |record| {
            sink.lock().unwrap().push(record);
        });
        (insert, records)
    }

    #[tokio::test]
    async fn first_capture_saves_then_identical_capture_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let capture = Arc::new(FakeCapture::new(vec![
            Some(solid([40, 80, 120, 255])),
            Some(solid([40, 80, 120, 255])),
        ]));
        let (insert, records) = recording_insert();

        let worker = ScreenshotWorker::new(
            dir.path().to_path_buf(),
            capture,
            insert,
            ScreenshotConfig::default(),
            None,
        );

        let now = Utc::now();
        worker.submit(WindowHandle(1), now, Some("chrome.exe".into()), Some("Docs".into()), 0.0);
        worker.submit(WindowHandle(1), now, Some("chrome.exe".into()), Some("Docs".into()), 0.0);
        worker.shutdown(true, Duration::from_secs(5)).await;

        let stats = worker.stats();
        assert_eq!(stats.submitted, 2);
        assert_eq!(stats.captured, 2);
        assert_eq!(stats.saved, 1);
        assert_eq!(stats.overwritten, 1);

        // Only the initial save produces an insert record
        let records = records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].dhash.is_some());
        assert!(records[0].file_path.exists());
    }

    #[tokio::test]
    async fn excluded_apps_and_failed_captures_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let capture = Arc::new(FakeCapture::new(vec![None]));
        let (insert, records) = recording_insert();

        let worker = ScreenshotWorker::new(
            dir.path().to_path_buf(),
            capture,
            insert,
            ScreenshotConfig::default(),
            None,
        );

        let now = Utc::now();
        // Lock screen app: skipped before any capture
        worker.submit(WindowHandle(1), now, Some("LockApp.exe".into()), None, 0.0);
        // Probe returns None: skipped too
        worker.submit(WindowHandle(2), now, Some("chrome.exe".into()), None, 0.0);
        worker.shutdown(true, Duration::from_secs(5)).await;

        let stats = worker.stats();
        assert_eq!(stats.skipped, 2);
        assert_eq!(stats.saved, 0);
        assert!(records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn deep_idle_submissions_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let capture = Arc::new(FakeCapture::new(vec![Some(solid([1, 2, 3, 255]))]));
        let (insert, _records) = recording_insert();

        let worker = ScreenshotWorker::new(
            dir.path().to_path_buf(),
            capture,
            insert,
            ScreenshotConfig::default(),
            None,
        );

        worker.submit(WindowHandle(1), Utc::now(), Some("chrome.exe".into()), None, 120.0);
        worker.shutdown(true, Duration::from_secs(5)).await;

        let stats = worker.stats();
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.captured, 0);
    }

    #[tokio::test]
    async fn dissimilar_captures_save_separate_files() {
        let dir = tempfile::tempdir().unwrap();
        // Perpendicular ramps produce opposite gradient-hash bits
        let ramp_x = RgbaImage::from_fn(128, 128, |x, _| image::Rgba([(x * 2) as u8, 0, 0, 255]));
        let ramp_y = RgbaImage::from_fn(128, 128, |_, y| image::Rgba([(y * 2) as u8, 0, 0, 255]));
        let capture = Arc::new(FakeCapture::new(vec![Some(ramp_x), Some(ramp_y)]));
        let (insert, records) = recording_insert();

        let worker = ScreenshotWorker::new(
            dir.path().to_path_buf(),
            capture,
            insert,
            ScreenshotConfig::default(),
            None,
        );

        let now = Utc::now();
        worker.submit(WindowHandle(1), now, Some("a.exe".into()), Some("one".into()), 0.0);
        worker.submit(
            WindowHandle(1),
            now + chrono::Duration::seconds(1),
            Some("b.exe".into()),
            Some("two".into()),
            0.0,
        );
        worker.shutdown(true, Duration::from_secs(5)).await;

        assert_eq!(worker.stats().saved, 2);
        assert_eq!(records.lock().unwrap().len(), 2);
    }
}
