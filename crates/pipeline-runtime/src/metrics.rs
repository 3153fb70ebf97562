// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Operational metrics.
//!
//! [`MetricsSink`] is the outbound seam: scalar gauges and counters,
//! fire-and-forget. Implementations must not block and cannot fail the
//! caller. [`RequestMetrics`] is the per-request record returned with
//! every generation result.
//!
//! Metric names used by the orchestrator:
//!
//! | Name | Kind |
//! |---|---|
//! | `solver.duration_ms` | gauge |
//! | `solver.success` / `solver.failure` | counter |
//! | `schedule.fallback` | counter |
//! | `resource.<name>.available_pct` | gauge |
//! | `stage.<name>.duration_ms` | gauge |
//! | `errors.<stage>.<kind>` | counter |
//! | `cache.hit` / `cache.miss` | counter |

use stage_model::Stage;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Destination for scalar metrics.
pub trait MetricsSink: Send + Sync {
    /// Sets `name` to `value`.
    fn gauge(&self, name: &str, value: f64);

    /// Adds `delta` to `name`.
    fn counter(&self, name: &str, delta: u64);
}

/// Emits every metric as a `tracing` event on the `metrics` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMetrics;

impl MetricsSink for TracingMetrics {
    fn gauge(&self, name: &str, value: f64) {
        tracing::debug!(target: "metrics", metric = name, value, "gauge");
    }

    fn counter(&self, name: &str, delta: u64) {
        tracing::debug!(target: "metrics", metric = name, delta, "counter");
    }
}

/// Everything a [`MetricsRecorder`] has seen.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct MetricsSnapshot {
    pub gauges: BTreeMap<String, f64>,
    pub counters: BTreeMap<String, u64>,
}

impl MetricsSnapshot {
    pub fn counter(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    pub fn gauge(&self, name: &str) -> Option<f64> {
        self.gauges.get(name).copied()
    }
}

/// In-memory sink keeping the last gauge value and running counter totals.
#[derive(Debug, Default)]
pub struct MetricsRecorder {
    inner: Mutex<MetricsSnapshot>,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, MetricsSnapshot> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MetricsSink for MetricsRecorder {
    fn gauge(&self, name: &str, value: f64) {
        self.lock().gauges.insert(name.to_string(), value);
    }

    fn counter(&self, name: &str, delta: u64) {
        *self.lock().counters.entry(name.to_string()).or_insert(0) += delta;
    }
}

/// Timing and outcome of one generation request.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RequestMetrics {
    pub target_name: String,
    /// Wall-clock time for the whole request.
    pub total_duration: Duration,
    /// Time spent choosing stages (shared by the batch).
    pub schedule_duration: Duration,
    /// Time spent in each completed stage.
    pub stage_durations: BTreeMap<Stage, Duration>,
    pub stages_scheduled: usize,
    pub cache_hit: bool,
    pub fallback_used: bool,
}

impl RequestMetrics {
    pub fn new(target_name: impl Into<String>) -> Self {
        Self {
            target_name: target_name.into(),
            total_duration: Duration::ZERO,
            schedule_duration: Duration::ZERO,
            stage_durations: BTreeMap::new(),
            stages_scheduled: 0,
            cache_hit: false,
            fallback_used: false,
        }
    }

    pub fn record_stage(&mut self, stage: Stage, elapsed: Duration) {
        self.stage_durations.insert(stage, elapsed);
    }

    /// Total time spent inside stages.
    pub fn stage_total(&self) -> Duration {
        self.stage_durations.values().sum()
    }

    /// Returns a human-readable summary suitable for CLI output.
    pub fn summary(&self) -> String {
        let total_ms = self.total_duration.as_secs_f64() * 1000.0;
        if self.cache_hit {
            return format!("Request '{}': cache hit in {total_ms:.2}ms", self.target_name);
        }
        let stages = self
            .stage_durations
            .iter()
            .map(|(s, d)| format!("{s} {:.0}ms", d.as_secs_f64() * 1000.0))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "Request '{}': {total_ms:.2}ms total, {:.2}ms scheduling{}, {}/{} stages ({})",
            self.target_name,
            self.schedule_duration.as_secs_f64() * 1000.0,
            if self.fallback_used { " (fallback)" } else { "" },
            self.stage_durations.len(),
            self.stages_scheduled,
            if stages.is_empty() { "none" } else { &stages },
        )
    }
}
