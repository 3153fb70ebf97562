// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Best-effort accelerator monitoring through NVML.
//!
//! Detection is strictly optional. A host without NVIDIA drivers, or with
//! devices that refuse to report, yields no [`GpuInfo`] and the caller
//! omits the `gpu`/`vram` keys entirely. Reporting zero instead would tell
//! the scheduler the accelerator is fully utilised.

use crate::{Resource, ResourceSnapshot};
use nvml_wrapper::Nvml;

/// One device's counters as NVML reports them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceReading {
    /// Compute utilisation over the last sample period, percent.
    pub utilisation_pct: u32,
    pub memory_used_bytes: u64,
    pub memory_total_bytes: u64,
}

/// Aggregated accelerator state across all visible devices.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct GpuInfo {
    /// Number of devices that reported.
    pub devices: usize,
    /// Mean compute utilisation across devices, in percent.
    pub utilisation_pct: f64,
    pub memory_total_bytes: u64,
    pub memory_used_bytes: u64,
}

impl GpuInfo {
    /// Aggregates per-device readings. `None` when no device reported.
    pub fn from_devices(readings: &[DeviceReading]) -> Option<Self> {
        if readings.is_empty() {
            return None;
        }
        let util_sum: f64 = readings.iter().map(|r| f64::from(r.utilisation_pct)).sum();
        Some(Self {
            devices: readings.len(),
            utilisation_pct: util_sum / readings.len() as f64,
            memory_total_bytes: readings.iter().map(|r| r.memory_total_bytes).sum(),
            memory_used_bytes: readings.iter().map(|r| r.memory_used_bytes).sum(),
        })
    }

    /// Percentage of compute capacity available.
    pub fn available_pct(&self) -> f64 {
        (100.0 - self.utilisation_pct).clamp(0.0, 100.0)
    }

    /// Percentage of device memory available. `None` when the devices
    /// report no memory at all, so the key is left out rather than read
    /// as "fully used".
    pub fn vram_available_pct(&self) -> Option<f64> {
        if self.memory_total_bytes == 0 {
            return None;
        }
        let free = self.memory_total_bytes.saturating_sub(self.memory_used_bytes);
        Some((free as f64 / self.memory_total_bytes as f64 * 100.0).clamp(0.0, 100.0))
    }

    /// Adds the `gpu` key, and `vram` when device memory is known.
    pub fn record(&self, snap: &mut ResourceSnapshot) {
        snap.insert(Resource::Gpu, self.available_pct());
        if let Some(vram) = self.vram_available_pct() {
            snap.insert(Resource::Vram, vram);
        }
    }
}

/// Holds the NVML handle for the lifetime of a probe.
pub struct GpuCollector {
    /// `None` when NVML could not be initialised (no drivers or no GPU).
    nvml: Option<Nvml>,
}

impl GpuCollector {
    /// Initialises NVML, degrading to a collector that never reports.
    pub fn new() -> Self {
        let nvml = match Nvml::init() {
            Ok(nvml) => {
                tracing::info!("NVML initialised successfully");
                Some(nvml)
            }
            Err(e) => {
                tracing::warn!(error = %e, "NVML unavailable; gpu and vram will not be reported");
                None
            }
        };
        Self { nvml }
    }

    /// A collector that never reports, for hosts where detection is off.
    pub fn disabled() -> Self {
        Self { nvml: None }
    }

    pub fn is_available(&self) -> bool {
        self.nvml.is_some()
    }

    /// Reads every device. Devices that fail to report are skipped.
    pub fn read(&self) -> Option<GpuInfo> {
        let nvml = self.nvml.as_ref()?;
        let count = match nvml.device_count() {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(error = %e, "failed to get GPU device count");
                return None;
            }
        };

        let mut readings = Vec::with_capacity(count as usize);
        for idx in 0..count {
            let device = match nvml.device_by_index(idx) {
                Ok(d) => d,
                Err(e) => {
                    tracing::warn!(gpu_index = idx, error = %e, "skipping GPU");
                    continue;
                }
            };
            let reading = device.utilization_rates().and_then(|util| {
                device.memory_info().map(|mem| DeviceReading {
                    utilisation_pct: util.gpu,
                    memory_used_bytes: mem.used,
                    memory_total_bytes: mem.total,
                })
            });
            match reading {
                Ok(r) => readings.push(r),
                Err(e) => tracing::warn!(gpu_index = idx, error = %e, "skipping GPU"),
            }
        }

        GpuInfo::from_devices(&readings)
    }
}

impl Default for GpuCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for GpuCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuCollector")
            .field("nvml", &self.is_available())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GIB: u64 = 1024 * 1024 * 1024;

    fn device(util: u32, used: u64, total: u64) -> DeviceReading {
        DeviceReading {
            utilisation_pct: util,
            memory_used_bytes: used,
            memory_total_bytes: total,
        }
    }

    #[test]
    fn test_single_device() {
        let info = GpuInfo::from_devices(&[device(35, 2 * GIB, 8 * GIB)]).unwrap();
        assert_eq!(info.devices, 1);
        assert!((info.available_pct() - 65.0).abs() < 1e-9);
        assert!((info.vram_available_pct().unwrap() - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_multi_device_aggregates() {
        let info =
            GpuInfo::from_devices(&[device(20, GIB, 4 * GIB), device(60, 3 * GIB, 4 * GIB)]).unwrap();
        assert_eq!(info.devices, 2);
        assert!((info.utilisation_pct - 40.0).abs() < 1e-9);
        assert!((info.vram_available_pct().unwrap() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_devices_is_none() {
        assert!(GpuInfo::from_devices(&[]).is_none());
    }

    #[test]
    fn test_zero_total_vram_omits_key() {
        let info = GpuInfo::from_devices(&[device(10, 0, 0)]).unwrap();
        assert_eq!(info.vram_available_pct(), None);

        let mut snap = ResourceSnapshot::new();
        info.record(&mut snap);
        assert_eq!(snap.get(Resource::Gpu), Some(90.0));
        assert!(!snap.contains(Resource::Vram));
    }

    #[test]
    fn test_record_inserts_both_keys() {
        let info = GpuInfo::from_devices(&[device(50, GIB, 4 * GIB)]).unwrap();
        let mut snap = ResourceSnapshot::new();
        info.record(&mut snap);
        assert_eq!(snap.get(Resource::Gpu), Some(50.0));
        assert_eq!(snap.get(Resource::Vram), Some(75.0));
    }

    #[test]
    fn test_used_beyond_total_clamps() {
        let info = GpuInfo::from_devices(&[device(100, 5 * GIB, 4 * GIB)]).unwrap();
        assert_eq!(info.available_pct(), 0.0);
        assert_eq!(info.vram_available_pct(), Some(0.0));
    }

    #[test]
    fn test_disabled_collector_reports_nothing() {
        let collector = GpuCollector::disabled();
        assert!(!collector.is_available());
        assert!(collector.read().is_none());
    }
}
