// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Raw resource probes.
//!
//! A [`ResourceProbe`] produces one unsmoothed reading per call. The
//! [`crate::ResourceMonitor`] owns a probe and layers throttling and
//! window averaging on top, so tests can substitute a scripted probe
//! without touching procfs.

use crate::{CpuTimes, GpuCollector, LoadAverage, MemoryInfo, MonitorError, Resource, ResourceSnapshot};
use std::sync::{Mutex, PoisonError};

/// Source of raw percent-available readings.
pub trait ResourceProbe: Send + Sync {
    /// Human-readable name of this probe.
    fn name(&self) -> &str;

    /// Takes one reading. Undetected resources are left out of the snapshot.
    fn sample(&self) -> Result<ResourceSnapshot, MonitorError>;
}

/// Reads the live system through procfs and, optionally, NVML.
#[derive(Debug)]
pub struct SystemProbe {
    gpu: GpuCollector,
    last_cpu: Mutex<Option<CpuTimes>>,
}

impl SystemProbe {
    /// NVML is initialised once here, not on every sample.
    pub fn new(gpu_detection: bool) -> Self {
        let gpu = if gpu_detection {
            GpuCollector::new()
        } else {
            GpuCollector::disabled()
        };
        Self {
            gpu,
            last_cpu: Mutex::new(None),
        }
    }

    /// CPU availability from tick deltas, falling back to the load average
    /// on the first call (no previous counters to diff against).
    fn cpu_available_pct(&self) -> Result<f64, MonitorError> {
        let current = CpuTimes::read();
        let mut last = self.last_cpu.lock().unwrap_or_else(PoisonError::into_inner);

        if let Ok(now) = current {
            let delta = last.as_ref().and_then(|prev| now.available_pct_since(prev));
            *last = Some(now);
            if let Some(pct) = delta {
                return Ok(pct);
            }
        }

        LoadAverage::read().map(|info| info.available_pct())
    }
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ResourceProbe for SystemProbe {
    fn name(&self) -> &str {
        "system"
    }

    fn sample(&self) -> Result<ResourceSnapshot, MonitorError> {
        let memory = MemoryInfo::read()?;
        let cpu_pct = self.cpu_available_pct()?;

        let mut snap = ResourceSnapshot::new();
        snap.insert(Resource::Cpu, cpu_pct);
        snap.insert(Resource::Memory, memory.available_pct());
        snap.insert(Resource::Swap, memory.swap_available_pct());

        if let Some(gpu) = self.gpu.read() {
            gpu.record(&mut snap);
        }

        Ok(snap)
    }
}

/// Returns the same reading on every call.
///
/// Used for operator overrides (e.g. pinning availability from the CLI)
/// and for deterministic tests.
#[derive(Debug, Clone)]
pub struct FixedProbe {
    reading: ResourceSnapshot,
}

impl FixedProbe {
    pub fn new(reading: ResourceSnapshot) -> Self {
        Self { reading }
    }
}

impl ResourceProbe for FixedProbe {
    fn name(&self) -> &str {
        "fixed"
    }

    fn sample(&self) -> Result<ResourceSnapshot, MonitorError> {
        Ok(self.reading.clone())
    }
}
