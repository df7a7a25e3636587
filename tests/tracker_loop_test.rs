//! End-to-end tests for the tracker loop: scripted probes in, events out.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use worklens::probes::{NoBattery, SystemProbe, WindowHandle};
use worklens::{
    ResourceMonitor, TrackerController, TrackerEvent, TrackerParts, WindowSnapshot, WorklensConfig,
};

/// Probe whose readings are set by the test while the loop runs.
struct ScriptedProbe {
    inner: Mutex<ScriptedState>,
}

#[derive(Clone)]
struct ScriptedState {
    app: Option<String>,
    title: Option<String>,
    idle_seconds: f64,
    locked: bool,
}

impl ScriptedProbe {
    fn new(app: &str, title: &str) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(ScriptedState {
                app: Some(app.to_string()),
                title: Some(title.to_string()),
                idle_seconds: 0.0,
                locked: false,
            }),
        })
    }

    fn set_window(&self, app: &str, title: &str) {
        let mut state = self.inner.lock().unwrap();
        state.app = Some(app.to_string());
        state.title = Some(title.to_string());
    }

    fn set_idle(&self, idle_seconds: f64) {
        self.inner.lock().unwrap().idle_seconds = idle_seconds;
    }
}

impl SystemProbe for ScriptedProbe {
    fn active_window(&self) -> Option<WindowSnapshot> {
        let state = self.inner.lock().unwrap();
        Some(WindowSnapshot {
            app: state.app.clone(),
            title: state.title.clone(),
            context: None,
            cmdline: None,
            idle_seconds: state.idle_seconds,
        })
    }

    fn idle_seconds(&self) -> f64 {
        self.inner.lock().unwrap().idle_seconds
    }

    fn is_workstation_locked(&self) -> bool {
        self.inner.lock().unwrap().locked
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
        None
    }
}

/// Fast-polling config that never throttles, merges within `merge_secs`.
fn test_config(merge_secs: f64) -> WorklensConfig {
    let mut config = WorklensConfig::default();
    config.tracker.poll_interval_secs = 0.05;
    config.tracker.merge_threshold_secs = merge_secs;
    config.tracker.idle_threshold_secs = 1.0;
    config.tracker.minimum_idle_duration_secs = 3.0;
    config.tracker.resumption_cooldown_secs = 0.0;
    // Keep adaptive throttling out of the timing-sensitive tests
    config.resources.cpu_throttle_percent = 1000.0;
    config.resources.extended_idle_threshold_secs = 1e9;
    config.transitions.prompt_enabled = false;
    config
}

fn parts(probe: Arc<ScriptedProbe>, config: WorklensConfig) -> TrackerParts {
    let resources = ResourceMonitor::new(config.resources.clone(), Arc::new(NoBattery));
    TrackerParts {
        probe,
        config,
        resources,
        screenshot_worker: None,
        transition_callback: None,
        prompt: None,
    }
}

async fn drain(mut rx: tokio::sync::mpsc::Receiver<TrackerEvent>) -> Vec<TrackerEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn window_switch_produces_contiguous_spans() {
    let probe = ScriptedProbe::new("chrome.exe", "Docs");
    let mut controller = TrackerController::new();
    let rx = controller.start(parts(probe.clone(), test_config(0.2))).unwrap();

    tokio::time::sleep(Duration::from_millis(700)).await;
    probe.set_window("code.exe", "main.rs");
    tokio::time::sleep(Duration::from_millis(700)).await;

    controller.stop().await.unwrap();
    let events = drain(rx).await;

    let spans: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            TrackerEvent::Activity(a) => Some(a),
            _ => None,
        })
        .collect();

    assert_eq!(spans.len(), 2, "expected two spans, got {spans:?}");
    assert_eq!(spans[0].app.as_deref(), Some("chrome.exe"));
    assert_eq!(spans[1].app.as_deref(), Some("code.exe"));
    // The first span ends exactly where the second begins
    assert_eq!(spans[0].end_time, spans[1].start_time);
    assert!(spans[0].duration_seconds >= 0.5);
    assert!(spans[1].duration_seconds >= 0.5);
}

#[tokio::test]
async fn brief_flicker_is_merged_into_one_span() {
    let probe = ScriptedProbe::new("chrome.exe", "Docs");
    let mut controller = TrackerController::new();
    // Merge window longer than the whole flicker sequence
    let rx = controller.start(parts(probe.clone(), test_config(5.0))).unwrap();

    tokio::time::sleep(Duration::from_millis(400)).await;
    probe.set_window("slack.exe", "Inbox");
    tokio::time::sleep(Duration::from_millis(150)).await;
    probe.set_window("chrome.exe", "Docs");
    tokio::time::sleep(Duration::from_millis(400)).await;

    controller.stop().await.unwrap();
    let events = drain(rx).await;

    let spans: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            TrackerEvent::Activity(a) => Some(a),
            _ => None,
        })
        .collect();

    assert_eq!(spans.len(), 1, "flicker should not split the span: {spans:?}");
    assert_eq!(spans[0].app.as_deref(), Some("chrome.exe"));
}

#[tokio::test]
async fn idle_period_emits_resumption_event() {
    let probe = ScriptedProbe::new("chrome.exe", "Docs");
    let mut controller = TrackerController::new();
    let rx = controller.start(parts(probe.clone(), test_config(0.2))).unwrap();

    tokio::time::sleep(Duration::from_millis(600)).await;
    // Reported idle time exceeds both the idle threshold (1s) and the
    // minimum idle duration (3s)
    probe.set_idle(240.0);
    tokio::time::sleep(Duration::from_millis(600)).await;
    probe.set_idle(0.0);
    tokio::time::sleep(Duration::from_millis(600)).await;

    controller.stop().await.unwrap();
    let events = drain(rx).await;

    let resumptions: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            TrackerEvent::IdleResumption(r) => Some(r),
            _ => None,
        })
        .collect();
    assert_eq!(resumptions.len(), 1, "events: {events:?}");
    assert!((resumptions[0].idle_duration - 240.0).abs() < f64::EPSILON);

    // The idle stretch shows up as its own inactive span
    let idle_spans = events
        .iter()
        .filter(|e| matches!(e, TrackerEvent::Activity(a) if a.is_idle))
        .count();
    assert_eq!(idle_spans, 1);
}

#[tokio::test]
async fn start_twice_is_rejected() {
    let probe = ScriptedProbe::new("chrome.exe", "Docs");
    let mut controller = TrackerController::new();
    let _rx = controller.start(parts(probe.clone(), test_config(0.2))).unwrap();

    assert!(controller.start(parts(probe, test_config(0.2))).is_err());
    controller.stop().await.unwrap();
}
