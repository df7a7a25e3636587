use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock};

/// Tracking loop and detector thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackerConfig {
    /// How often to poll the active window (seconds).
    pub poll_interval_secs: f64,
    /// Idle seconds before the user is considered idle.
    pub idle_threshold_secs: f64,
    /// State changes reverting within this window are merged as flickers.
    pub merge_threshold_secs: f64,
    /// Minimum idle period before a resumption event is emitted.
    pub minimum_idle_duration_secs: f64,
    /// Minimum real-time gap between two resumption events.
    pub resumption_cooldown_secs: f64,
    /// Recency window for typing/clicking classification.
    pub interaction_threshold_secs: f64,
    /// Seconds between periodic screenshot submissions.
    pub screenshot_interval_secs: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 1.0,
            idle_threshold_secs: 180.0,
            merge_threshold_secs: 2.0,
            minimum_idle_duration_secs: 180.0,
            resumption_cooldown_secs: 60.0,
            interaction_threshold_secs: 5.0,
            screenshot_interval_secs: 10.0,
        }
    }
}

/// Screenshot capture, comparison and persistence thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScreenshotConfig {
    /// Similarity threshold when the window has not changed.
    pub threshold_identical_same_window: f64,
    /// Stricter threshold when app or title changed.
    pub threshold_identical_different_window: f64,
    /// Moderate similarity above this still overwrites when recent.
    pub threshold_significant: f64,
    /// Moderate-similarity overwrite window (seconds since last save).
    pub recent_save_window_secs: f64,
    /// JPEG quality, 1-100.
    pub quality: u8,
    /// Images larger than this on either axis get downscaled.
    pub max_dimension: u32,
    /// Skip capture entirely once the user has been idle this long.
    pub idle_skip_secs: f64,
    /// Apps never captured (lock screen, logon UI).
    pub skip_apps: Vec<String>,
}

impl Default for ScreenshotConfig {
    fn default() -> Self {
        Self {
            threshold_identical_same_window: 0.90,
            threshold_identical_different_window: 0.99,
            threshold_significant: 0.70,
            recent_save_window_secs: 60.0,
            quality: 65,
            max_dimension: 1920,
            idle_skip_secs: 30.0,
            skip_apps: vec![
                "LockApp.exe".into(),
                "ScreenSaver.scr".into(),
                "LogonUI.exe".into(),
            ],
        }
    }
}

/// Resource-pressure thresholds for adaptive throttling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourceConfig {
    /// System CPU % above which polling slows down.
    pub cpu_throttle_percent: f32,
    /// System CPU % above which screenshots are skipped.
    pub cpu_skip_screenshot_percent: f32,
    /// Battery % below which screenshots are skipped while unplugged.
    pub battery_threshold_percent: f32,
    /// Process RSS MB above which caches should be cleared.
    pub memory_threshold_mb: f64,
    /// Poll interval while throttled (seconds).
    pub throttled_poll_interval_secs: f64,
    /// Idle seconds past which the extended-idle interval applies.
    pub extended_idle_threshold_secs: f64,
    /// Poll interval during extended idle (seconds).
    pub extended_idle_poll_interval_secs: f64,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            cpu_throttle_percent: 80.0,
            cpu_skip_screenshot_percent: 90.0,
            battery_threshold_percent: 20.0,
            memory_threshold_mb: 200.0,
            throttled_poll_interval_secs: 5.0,
            extended_idle_threshold_secs: 600.0,
            extended_idle_poll_interval_secs: 10.0,
        }
    }
}

/// Transition detection thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransitionConfig {
    /// Idle seconds treated as a break the user is returning from.
    pub idle_return_threshold_secs: f64,
    /// Minimum seconds between user-facing transition prompts.
    pub prompt_cooldown_secs: f64,
    /// Idle seconds above which prompts are deferred until the user returns.
    pub prompt_idle_threshold_secs: f64,
    pub prompt_enabled: bool,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            idle_return_threshold_secs: 300.0,
            prompt_cooldown_secs: 600.0,
            prompt_idle_threshold_secs: 60.0,
            prompt_enabled: true,
        }
    }
}

/// Top-level configuration, persisted as JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorklensConfig {
    pub tracker: TrackerConfig,
    pub screenshot: ScreenshotConfig,
    pub resources: ResourceConfig,
    pub transitions: TransitionConfig,
}

/// JSON-on-disk config store. Missing or unreadable files fall back to
/// defaults; individual unknown fields are ignored by serde.
pub struct ConfigStore {
    path: PathBuf,
    data: RwLock<WorklensConfig>,
}

impl ConfigStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            WorklensConfig::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn get(&self) -> WorklensConfig {
        self.data.read().unwrap().clone()
    }

    pub fn update(&self, config: WorklensConfig) -> Result<()> {
        {
            let mut guard = self.data.write().unwrap();
            *guard = config;
            self.persist(&guard)?;
        }
        Ok(())
    }

    fn persist(&self, data: &WorklensConfig) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write config to {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_policy_parameters() {
        let config = WorklensConfig::default();
        assert_eq!(config.tracker.merge_threshold_secs, 2.0);
        assert_eq!(config.tracker.minimum_idle_duration_secs, 180.0);
        assert_eq!(config.screenshot.threshold_identical_different_window, 0.99);
        assert_eq!(config.screenshot.threshold_significant, 0.70);
        assert_eq!(config.resources.cpu_throttle_percent, 80.0);
        assert_eq!(config.transitions.prompt_cooldown_secs, 600.0);
    }

    #[test]
    fn store_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let store = ConfigStore::new(path.clone()).unwrap();
        let mut config = store.get();
        config.tracker.poll_interval_secs = 2.5;
        store.update(config).unwrap();

        let reloaded = ConfigStore::new(path).unwrap();
        assert_eq!(reloaded.get().tracker.poll_interval_secs, 2.5);
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{not json").unwrap();

        let store = ConfigStore::new(path).unwrap();
        assert_eq!(store.get().tracker.poll_interval_secs, 1.0);
    }
}
