//! Resource sampling and adaptive throttling policy.
//!
//! The decisions themselves are pure functions over a `ResourceSample`, so
//! throttling behavior is testable with synthetic samples; `ResourceMonitor`
//! wraps `sysinfo` to produce real samples and folds them into running
//! peak/average aggregates (no history is retained).

use std::sync::Arc;

use serde::Serialize;
use sysinfo::{Pid, ProcessesToUpdate, System};
use tokio::sync::Mutex;

use crate::config::ResourceConfig;
use crate::probes::{BatteryReading, SharedPowerProbe};

const ENABLE_LOGS: bool = true;

use crate::log_debug;

/// Read-only snapshot of current resource usage.
#[derive(Debug, Clone)]
pub struct ResourceSample {
    /// System-wide CPU usage percent.
    pub cpu_percent: f32,
    /// This process's resident memory in MB.
    pub memory_mb: f64,
    pub battery: Option<BatteryReading>,
    pub thread_count: usize,
}

/// Running aggregates over recorded samples.
#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ResourceStats {
    pub peak_cpu: f32,
    pub peak_memory_mb: f64,
    pub avg_cpu: f32,
    pub avg_memory_mb: f64,
    pub samples_count: u64,
}

/// Polling slows down (1s -> 5s) when system CPU is above the threshold.
pub fn should_throttle_polling(sample: &ResourceSample, config: &ResourceConfig) -> bool {
    sample.cpu_percent > config.cpu_throttle_percent
}

/// Screenshots are skipped under heavy CPU load or low unplugged battery.
pub fn should_skip_screenshot(sample: &ResourceSample, config: &ResourceConfig) -> bool {
    if sample.cpu_percent > config.cpu_skip_screenshot_percent {
        return true;
    }
    if let Some(battery) = sample.battery {
        if !battery.plugged && battery.percent < config.battery_threshold_percent {
            return true;
        }
    }
    false
}

/// Caches should be dropped once resident memory crosses the threshold.
pub fn should_clear_cache(sample: &ResourceSample, config: &ResourceConfig) -> bool {
    sample.memory_mb > config.memory_threshold_mb
}

/// Poll interval adjusted for extended idle, independent of the CPU throttle.
pub fn idle_poll_interval(idle_seconds: f64, base_interval: f64, config: &ResourceConfig) -> f64 {
    if idle_seconds > config.extended_idle_threshold_secs {
        config.extended_idle_poll_interval_secs
    } else {
        base_interval
    }
}

struct MonitorState {
    system: System,
    pid: Pid,
    stats: ResourceStats,
    total_cpu: f64,
    total_memory_mb: f64,
}

/// Shared, clonable resource monitor backed by `sysinfo`.
pub struct ResourceMonitor {
    inner: Arc<Mutex<MonitorState>>,
    config: ResourceConfig,
    power: SharedPowerProbe,
}

impl ResourceMonitor {
    pub fn new(config: ResourceConfig, power: SharedPowerProbe) -> Self {
        let mut system = System::new();
        let pid = Pid::from_u32(std::process::id());

        // Establish a baseline; the first CPU reading is always zero
        system.refresh_cpu_usage();
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]));

        Self {
            inner: Arc::new(Mutex::new(MonitorState {
                system,
                pid,
                stats: ResourceStats::default(),
                total_cpu: 0.0,
                total_memory_mb: 0.0,
            })),
            config,
            power,
        }
    }

    pub fn config(&self) -> &ResourceConfig {
        &self.config
    }

    /// Take a fresh sample of CPU, memory, battery and thread count.
    pub async fn sample(&self) -> ResourceSample {
        let mut state = self.inner.lock().await;
        let pid = state.pid;
        state.system.refresh_cpu_usage();
        state.system.refresh_processes(ProcessesToUpdate::Some(&[pid]));

        let cpu_percent = state.system.global_cpu_usage();
        let (memory_mb, thread_count) = match state.system.process(pid) {
            Some(process) => {
                let memory_mb = process.memory() as f64 / 1024.0 / 1024.0;
                #[cfg(target_os = "linux")]
                let threads = process.tasks().map(|t| t.len()).unwrap_or(0);
                #[cfg(not(target_os = "linux"))]
                let threads = 0;
                (memory_mb, threads)
            }
            None => (0.0, 0),
        };

        ResourceSample {
            cpu_percent,
            memory_mb,
            battery: self.power.battery(),
            thread_count,
        }
    }

    pub async fn should_throttle_polling(&self) -> bool {
        let sample = self.sample().await;
        should_throttle_polling(&sample, &self.config)
    }

    pub async fn should_skip_screenshot(&self) -> bool {
        let sample = self.sample().await;
        let skip = should_skip_screenshot(&sample, &self.config);
        if skip {
            log_debug!(
                "Skipping screenshot: cpu={:.1}%, battery={:?}",
                sample.cpu_percent,
                sample.battery
            );
        }
        skip
    }

    pub async fn should_clear_cache(&self) -> bool {
        let sample = self.sample().await;
        should_clear_cache(&sample, &self.config)
    }

    /// Sample and fold into the running peak/average statistics.
    pub async fn record(&self) -> ResourceSample {
        let sample = self.sample().await;
        let mut state = self.inner.lock().await;

        if sample.cpu_percent > state.stats.peak_cpu {
            state.stats.peak_cpu = sample.cpu_percent;
        }
        if sample.memory_mb > state.stats.peak_memory_mb {
            state.stats.peak_memory_mb = sample.memory_mb;
        }

        state.total_cpu += f64::from(sample.cpu_percent);
        state.total_memory_mb += sample.memory_mb;
        state.stats.samples_count += 1;
        state.stats.avg_cpu = (state.total_cpu / state.stats.samples_count as f64) as f32;
        state.stats.avg_memory_mb = state.total_memory_mb / state.stats.samples_count as f64;

        log_debug!(
            "Resource sample: cpu={:.1}%, memory={:.1}MB, threads={}",
            sample.cpu_percent,
            sample.memory_mb,
            sample.thread_count
        );

        sample
    }

    pub async fn statistics(&self) -> ResourceStats {
        self.inner.lock().await.stats.clone()
    }
}

impl Clone for ResourceMonitor {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            config: self.config.clone(),
            power: Arc::clone(&self.power),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probes::NoBattery;

    fn sample(cpu: f32, memory_mb: f64, battery: Option<BatteryReading>) -> ResourceSample {
        ResourceSample {
            cpu_percent: cpu,
            memory_mb,
            battery,
            thread_count: 4,
        }
    }

    #[test]
    fn throttles_polling_above_cpu_threshold() {
        let config = ResourceConfig::default();
        assert!(should_throttle_polling(&sample(85.0, 50.0, None), &config));
        assert!(!should_throttle_polling(&sample(50.0, 50.0, None), &config));
    }

    #[test]
    fn skips_screenshot_under_heavy_cpu() {
        let config = ResourceConfig::default();
        assert!(should_skip_screenshot(&sample(95.0, 50.0, None), &config));
        assert!(!should_skip_screenshot(&sample(85.0, 50.0, None), &config));
    }

    #[test]
    fn skips_screenshot_on_low_unplugged_battery() {
        let config = ResourceConfig::default();
        let low_unplugged = sample(
            10.0,
            50.0,
            Some(BatteryReading {
                percent: 15.0,
                plugged: false,
            }),
        );
        assert!(should_skip_screenshot(&low_unplugged, &config));

        let low_plugged = sample(
            10.0,
            50.0,
            Some(BatteryReading {
                percent: 15.0,
                plugged: true,
            }),
        );
        assert!(!should_skip_screenshot(&low_plugged, &config));
    }

    #[test]
    fn clears_cache_above_memory_threshold() {
        let config = ResourceConfig::default();
        assert!(should_clear_cache(&sample(10.0, 250.0, None), &config));
        assert!(!should_clear_cache(&sample(10.0, 150.0, None), &config));
    }

    #[test]
    fn extended_idle_stretches_poll_interval() {
        let config = ResourceConfig::default();
        assert_eq!(idle_poll_interval(700.0, 1.0, &config), 10.0);
        assert_eq!(idle_poll_interval(30.0, 1.0, &config), 1.0);
        // Independent of whatever base the CPU throttle picked
        assert_eq!(idle_poll_interval(700.0, 5.0, &config), 10.0);
    }

    #[tokio::test]
    async fn record_accumulates_statistics() {
        let monitor = ResourceMonitor::new(ResourceConfig::default(), Arc::new(NoBattery));
        monitor.record().await;
        monitor.record().await;

        let stats = monitor.statistics().await;
        assert_eq!(stats.samples_count, 2);
        assert!(stats.peak_memory_mb >= stats.avg_memory_mb);
    }
}
