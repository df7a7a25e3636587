//! Screenshot comparison and deduplication policy.
//!
//! Decides whether a fresh capture becomes a new file or overwrites the
//! previous one. The threshold is context-sensitive: a changed window should
//! rarely overwrite (only visually indistinguishable returns to the same
//! content), while in-window redraw tolerates much more drift.

use chrono::{DateTime, Utc};
use image::RgbaImage;
use std::path::PathBuf;

use super::phash::similarity;
use crate::config::ScreenshotConfig;

const ENABLE_LOGS: bool = true;

use crate::log_info;

/// Metadata retained for the most recently saved screenshot.
#[derive(Debug, Clone)]
pub struct ScreenshotMetadata {
    pub file_path: PathBuf,
    pub dhash: String,
    pub captured_at: DateTime<Utc>,
    pub app: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenshotAction {
    SaveNew,
    Overwrite,
}

/// Outcome of comparing the current capture with the previous one.
#[derive(Debug, Clone)]
pub struct ComparisonResult {
    pub action: ScreenshotAction,
    pub similarity: Option<f64>,
}

/// Threshold decision over an already computed similarity score.
pub fn decide(
    similarity: f64,
    window_changed: bool,
    seconds_since_save: f64,
    config: &ScreenshotConfig,
) -> ScreenshotAction {
    let threshold = if window_changed {
        config.threshold_identical_different_window
    } else {
        config.threshold_identical_same_window
    };

    if similarity >= threshold {
        return ScreenshotAction::Overwrite;
    }

    // Moderate similarity still collapses when the last save was recent
    if similarity >= config.threshold_significant
        && seconds_since_save < config.recent_save_window_secs
    {
        return ScreenshotAction::Overwrite;
    }

    ScreenshotAction::SaveNew
}

/// Compare the current capture's hash against the previous screenshot.
pub fn compare_screenshots(
    current_hash: &str,
    previous: Option<&ScreenshotMetadata>,
    current_app: Option<&str>,
    current_title: Option<&str>,
    seconds_since_save: f64,
    config: &ScreenshotConfig,
) -> ComparisonResult {
    let Some(previous) = previous else {
        return ComparisonResult {
            action: ScreenshotAction::SaveNew,
            similarity: None,
        };
    };

    let score = similarity(current_hash, &previous.dhash);

    let window_changed = current_app != previous.app.as_deref()
        || current_title != previous.title.as_deref();

    if window_changed {
        if current_app != previous.app.as_deref() {
            log_info!(
                "App changed: {:?} -> {:?}, using strict threshold {}",
                previous.app,
                current_app,
                config.threshold_identical_different_window
            );
        } else {
            log_info!(
                "Window title changed (same app {:?}), using strict threshold {}",
                current_app,
                config.threshold_identical_different_window
            );
        }
    }

    ComparisonResult {
        action: decide(score, window_changed, seconds_since_save, config),
        similarity: Some(score),
    }
}

/// Five sampled pixels (corners plus center) from a saved screenshot.
///
/// Fast-path check before hashing: if the new capture matches all five
/// samples within tolerance, it is near-certainly the same frame.
#[derive(Debug, Clone)]
pub struct PixelSamples {
    size: (u32, u32),
    samples: [[u8; 4]; 5],
}

impl PixelSamples {
    pub fn from_image(img: &RgbaImage) -> Self {
        let (width, height) = img.dimensions();
        let points = Self::points(width, height);
        let mut samples = [[0u8; 4]; 5];
        for (slot, (x, y)) in samples.iter_mut().zip(points) {
            *slot = img.get_pixel(x, y).0;
        }
        Self {
            size: (width, height),
            samples,
        }
    }

    /// Whether `img` matches the sampled pixels within `tolerance` per channel.
    pub fn matches(&self, img: &RgbaImage, tolerance: u8) -> bool {
        if img.dimensions() != self.size {
            return false;
        }
        let points = Self::points(self.size.0, self.size.1);
        for (expected, (x, y)) in self.samples.iter().zip(points) {
            let actual = img.get_pixel(x, y).0;
            for channel in 0..3 {
                if expected[channel].abs_diff(actual[channel]) > tolerance {
                    return false;
                }
            }
        }
        true
    }

    fn points(width: u32, height: u32) -> [(u32, u32); 5] {
        [
            (0, 0),
            (width - 1, 0),
            (0, height - 1),
            (width - 1, height - 1),
            (width / 2, height / 2),
        ]
    }
}
