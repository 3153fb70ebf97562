// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Throttled, window-averaged resource monitor.
//!
//! ```text
//! get_resources()
//!     │  interval elapsed?
//!     ├── yes → probe.sample() → push into per-resource windows
//!     ▼
//!  window means  →  ResourceSnapshot
//! ```
//!
//! Callers never see raw samples, only moving averages, so a single noisy
//! reading cannot flip a scheduling decision.

use crate::snapshot::now_ms;
use crate::{Resource, ResourceProbe, ResourceSnapshot, SampleWindow, SystemProbe};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Monitor tuning knobs.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Minimum time between two probe samples, in milliseconds.
    pub sample_interval_ms: u64,
    /// Number of samples kept per resource.
    pub window_size: usize,
    /// Percent available reported for CPU and memory when the probe fails.
    pub fallback_available_pct: f64,
    /// Whether to query the accelerator at all.
    pub gpu_detection: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: 1000,
            window_size: 10,
            fallback_available_pct: 10.0,
            gpu_detection: true,
        }
    }
}

impl MonitorConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }
}

#[derive(Debug, Default)]
struct MonitorState {
    windows: BTreeMap<Resource, SampleWindow>,
    last_sample: Option<Instant>,
    samples_taken: u64,
    probe_failures: u64,
}

/// Process-wide resource monitor, shared by reference between schedulers.
///
/// All state sits behind one mutex: concurrent callers either observe the
/// previous averages or wait for the in-flight sample, never a half-updated
/// set of windows.
pub struct ResourceMonitor {
    probe: Box<dyn ResourceProbe>,
    config: MonitorConfig,
    state: Mutex<MonitorState>,
}

impl ResourceMonitor {
    /// Creates a monitor over the given probe.
    pub fn new(probe: Box<dyn ResourceProbe>, config: MonitorConfig) -> Self {
        Self {
            probe,
            config,
            state: Mutex::new(MonitorState::default()),
        }
    }

    /// Creates a monitor that reads the live system.
    pub fn system(config: MonitorConfig) -> Self {
        let probe = SystemProbe::new(config.gpu_detection);
        Self::new(Box::new(probe), config)
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Returns smoothed availability, re-sampling if the interval elapsed.
    pub fn get_resources(&self) -> ResourceSnapshot {
        let mut state = self.lock();
        let due = state
            .last_sample
            .map_or(true, |t| t.elapsed() >= self.config.sample_interval());
        if due {
            self.take_sample(&mut state);
        }
        Self::averages_of(&state)
    }

    /// Forces a sample regardless of the throttle interval.
    pub fn refresh(&self) -> ResourceSnapshot {
        let mut state = self.lock();
        self.take_sample(&mut state);
        Self::averages_of(&state)
    }

    /// Current window averages without sampling. Read-only.
    pub fn averages(&self) -> ResourceSnapshot {
        let state = self.lock();
        Self::averages_of(&state)
    }

    /// Normalised trend in `[-1, 1]` for one resource; 0 when unknown.
    pub fn get_trend(&self, resource: Resource) -> f64 {
        let state = self.lock();
        state
            .windows
            .get(&resource)
            .map(SampleWindow::trend)
            .unwrap_or(0.0)
    }

    /// Trends for every tracked resource.
    pub fn trends(&self) -> BTreeMap<Resource, f64> {
        let state = self.lock();
        state
            .windows
            .iter()
            .map(|(r, w)| (*r, w.trend()))
            .collect()
    }

    /// Number of probe samples taken so far (including failed ones).
    pub fn sample_count(&self) -> u64 {
        self.lock().samples_taken
    }

    /// Number of probe failures so far.
    pub fn failure_count(&self) -> u64 {
        self.lock().probe_failures
    }

    /// A panic mid-sample leaves the windows intact, so a poisoned lock is
    /// recovered rather than propagated.
    fn lock(&self) -> MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take_sample(&self, state: &mut MonitorState) {
        state.samples_taken += 1;
        state.last_sample = Some(Instant::now());

        let reading = match self.probe.sample() {
            Ok(reading) => reading,
            Err(e) => {
                state.probe_failures += 1;
                tracing::warn!(
                    "probe '{}' failed ({e}); assuming {:.0}% available",
                    self.probe.name(),
                    self.config.fallback_available_pct,
                );
                ResourceSnapshot::from_percentages([
                    (Resource::Cpu, self.config.fallback_available_pct),
                    (Resource::Memory, self.config.fallback_available_pct),
                ])
            }
        };

        // Resources that disappeared (e.g. GPU driver unloaded) stop being tracked.
        state.windows.retain(|r, _| reading.contains(*r));
        for (resource, pct) in reading.iter() {
            state
                .windows
                .entry(resource)
                .or_insert_with(|| SampleWindow::new(self.config.window_size))
                .push(pct);
        }

        tracing::debug!("{}", reading.summary());
    }

    fn averages_of(state: &MonitorState) -> ResourceSnapshot {
        let mut snap = ResourceSnapshot::from_percentages(
            state
                .windows
                .iter()
                .filter_map(|(r, w)| w.mean().map(|m| (*r, m))),
        );
        snap.taken_at_ms = now_ms();
        snap
    }
}

impl std::fmt::Debug for ResourceMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceMonitor")
            .field("probe", &self.probe.name())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MonitorError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Replays a fixed sequence of readings, repeating the last one.
    struct ScriptedProbe {
        readings: Vec<Option<ResourceSnapshot>>,
        calls: Arc<AtomicUsize>,
    }

    impl ResourceProbe for ScriptedProbe {
        fn name(&self) -> &str {
            "scripted"
        }

        fn sample(&self) -> Result<ResourceSnapshot, MonitorError> {
            let i = self.calls.fetch_add(1, Ordering::SeqCst);
            let idx = i.min(self.readings.len() - 1);
            self.readings[idx].clone().ok_or(MonitorError::NotAvailable {
                path: "scripted".into(),
            })
        }
    }

    fn cpu_mem(cpu: f64, mem: f64) -> Option<ResourceSnapshot> {
        Some(ResourceSnapshot::from_percentages([
            (Resource::Cpu, cpu),
            (Resource::Memory, mem),
        ]))
    }

    fn monitor(readings: Vec<Option<ResourceSnapshot>>, interval_ms: u64) -> (ResourceMonitor, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let probe = ScriptedProbe {
            readings,
            calls: Arc::clone(&calls),
        };
        let config = MonitorConfig {
            sample_interval_ms: interval_ms,
            window_size: 3,
            ..Default::default()
        };
        (ResourceMonitor::new(Box::new(probe), config), calls)
    }

    #[test]
    fn test_throttled_sampling() {
        let (m, calls) = monitor(vec![cpu_mem(50.0, 50.0)], 60_000);
        m.get_resources();
        m.get_resources();
        m.get_resources();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_window_average() {
        let (m, _) = monitor(
            vec![cpu_mem(90.0, 60.0), cpu_mem(60.0, 60.0), cpu_mem(30.0, 60.0)],
            0,
        );
        m.get_resources();
        m.get_resources();
        let snap = m.get_resources();
        assert!((snap.get(Resource::Cpu).unwrap() - 60.0).abs() < 1e-9);
        assert!((m.get_trend(Resource::Cpu) - (-0.6)).abs() < 1e-9);
        assert_eq!(m.get_trend(Resource::Memory), 0.0);
    }

    #[test]
    fn test_probe_failure_yields_conservative_default() {
        let (m, _) = monitor(vec![None], 0);
        let snap = m.get_resources();
        assert_eq!(snap.get(Resource::Cpu), Some(10.0));
        assert_eq!(snap.get(Resource::Memory), Some(10.0));
        assert!(snap.get(Resource::Gpu).is_none());
        assert_eq!(m.failure_count(), 1);
    }

    #[test]
    fn test_vanished_resource_is_dropped() {
        let with_gpu = Some(ResourceSnapshot::from_percentages([
            (Resource::Cpu, 50.0),
            (Resource::Gpu, 80.0),
        ]));
        let (m, _) = monitor(vec![with_gpu, cpu_mem(50.0, 50.0)], 0);
        assert!(m.get_resources().contains(Resource::Gpu));
        assert!(!m.get_resources().contains(Resource::Gpu));
    }

    #[test]
    fn test_unknown_trend_is_zero() {
        let (m, _) = monitor(vec![cpu_mem(50.0, 50.0)], 0);
        assert_eq!(m.get_trend(Resource::Vram), 0.0);
    }

    #[test]
    fn test_refresh_bypasses_throttle() {
        let (m, calls) = monitor(vec![cpu_mem(50.0, 50.0)], 60_000);
        m.get_resources();
        m.refresh();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(m.sample_count(), 2);
    }

    #[test]
    fn test_concurrent_readers() {
        let (m, _) = monitor(vec![cpu_mem(40.0, 40.0)], 0);
        let m = Arc::new(m);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let m = Arc::clone(&m);
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        let snap = m.get_resources();
                        assert_eq!(snap.get(Resource::Cpu), Some(40.0));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(m.sample_count(), 200);
    }

    /// Panics on its first call, then reports steady readings.
    struct PanicOnceProbe {
        calls: AtomicUsize,
    }

    impl ResourceProbe for PanicOnceProbe {
        fn name(&self) -> &str {
            "panic-once"
        }

        fn sample(&self) -> Result<ResourceSnapshot, MonitorError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("probe blew up mid-sample");
            }
            Ok(ResourceSnapshot::from_percentages([(Resource::Cpu, 70.0)]))
        }
    }

    #[test]
    fn test_recovers_after_probe_panic() {
        let m = ResourceMonitor::new(
            Box::new(PanicOnceProbe {
                calls: AtomicUsize::new(0),
            }),
            MonitorConfig::default(),
        );
        let first = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| m.refresh()));
        assert!(first.is_err());
        assert!(m.state.is_poisoned());

        let snap = m.refresh();
        assert_eq!(snap.get(Resource::Cpu), Some(70.0));
        assert_eq!(m.sample_count(), 2);
        assert!(m.averages().contains(Resource::Cpu));
    }
}
