//! Screenshot file naming and JPEG persistence.
//!
//! Files land in date-keyed subdirectories with timestamp-derived names:
//! `{dir}/2025-12-09/2025-12-09_23-25-05_chrome.jpg`.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use image::codecs::jpeg::JpegEncoder;
use image::{imageops, DynamicImage, RgbaImage};

/// Path for a screenshot captured at `timestamp` of `app`.
pub fn screenshot_path(dir: &Path, timestamp: DateTime<Utc>, app: Option<&str>) -> PathBuf {
    let date_dir = dir.join(timestamp.format("%Y-%m-%d").to_string());
    let stamp = timestamp.format("%Y-%m-%d_%H-%M-%S").to_string();
    let filename = format!("{stamp}_{}.jpg", sanitize_app_name(app));
    date_dir.join(filename)
}

/// App names get embedded in the filename; keep them filesystem-safe.
fn sanitize_app_name(app: Option<&str>) -> String {
    let name = app.unwrap_or("unknown");
    let name = name.strip_suffix(".exe").unwrap_or(name);
    let sanitized: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    sanitized.chars().take(20).collect()
}

/// Downscale if either dimension exceeds `max_dimension`, preserving aspect.
pub fn resize_if_needed(img: RgbaImage, max_dimension: u32) -> RgbaImage {
    let (width, height) = img.dimensions();
    let max_dim = width.max(height);
    if max_dim <= max_dimension {
        return img;
    }

    let scale = f64::from(max_dimension) / f64::from(max_dim);
    let new_width = (f64::from(width) * scale) as u32;
    let new_height = (f64::from(height) * scale) as u32;
    imageops::resize(
        &img,
        new_width.max(1),
        new_height.max(1),
        imageops::FilterType::Lanczos3,
    )
}

/// Encode as JPEG at the given quality, creating parent directories.
pub fn save_jpeg(img: &RgbaImage, path: &Path, quality: u8) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    // JPEG has no alpha channel
    let rgb = DynamicImage::ImageRgba8(img.clone()).to_rgb8();

    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let encoder = JpegEncoder::new_with_quality(&mut writer, quality);
    rgb.write_with_encoder(encoder)
        .with_context(|| format!("Failed to encode {}", path.display()))?;
    Ok(())
}
